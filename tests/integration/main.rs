//! Integration tests for nodelayer

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const LOCK: &str = r#"{
  "name": "app",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "app", "workspaces": ["packages/*"] },
    "node_modules/@app/ui": { "resolved": "packages/ui", "link": true },
    "node_modules/left-pad": { "version": "1.3.0" },
    "node_modules/jest": { "version": "29.7.0", "dev": true },
    "packages/ui": { "name": "@app/ui", "version": "0.1.0" }
  }
}"#;

    fn nodelayer() -> Command {
        let mut cmd = cargo_bin_cmd!("nodelayer");
        for var in [
            "BP_NPM_VERSION",
            "BP_NODE_PROJECT_PATH",
            "BP_KEEP_NODE_BUILD_CACHE",
            "SERVICE_BINDING_ROOT",
            "NODELAYER_CONFIG",
            "CNB_LAYERS_DIR",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name":"app"}"#).unwrap();
        fs::write(dir.path().join("package-lock.json"), LOCK).unwrap();
        fs::create_dir_all(dir.path().join("packages/ui")).unwrap();
        dir
    }

    #[test]
    fn help_displays() {
        nodelayer()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("npm dependency layers"));
    }

    #[test]
    fn version_displays() {
        nodelayer()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("nodelayer"));
    }

    #[test]
    fn links_lists_workspace_members() {
        let project = project();
        nodelayer()
            .args(["links", "--format", "plain", "--lockfile"])
            .arg(project.path().join("package-lock.json"))
            .assert()
            .success()
            .stdout(predicate::eq("node_modules/@app/ui\n"));
    }

    #[test]
    fn links_json_plans_targets_in_project() {
        let project = project();
        let layer = TempDir::new().unwrap();
        nodelayer()
            .args(["links", "--format", "json", "--lockfile"])
            .arg(project.path().join("package-lock.json"))
            .arg("--layer")
            .arg(layer.path())
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""kind": "path""#))
            .stdout(predicate::str::contains("packages/ui"));

        // planning only
        assert!(!layer.path().join("node_modules").exists());
    }

    #[test]
    fn links_malformed_lockfile_fails() {
        let dir = TempDir::new().unwrap();
        let lockfile = dir.path().join("package-lock.json");
        fs::write(&lockfile, "{ not json").unwrap();
        nodelayer()
            .args(["links", "--lockfile"])
            .arg(&lockfile)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Malformed lockfile"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn check_unsupported_project_fails() {
        let dir = TempDir::new().unwrap();
        nodelayer()
            .args(["check", "--working-dir"])
            .arg(dir.path())
            .arg("--platform")
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported project"));
    }

    #[test]
    fn check_reports_install_for_empty_layers() {
        let project = project();
        let layers = TempDir::new().unwrap();
        nodelayer()
            .args(["check", "--format", "plain", "--working-dir"])
            .arg(project.path())
            .arg("--platform")
            .arg(project.path())
            .arg("--layers")
            .arg(layers.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("build-modules install"))
            .stdout(predicate::str::contains("launch-modules install"));
    }

    #[test]
    fn check_rejects_ambiguous_bindings() {
        let project = project();
        let bindings = TempDir::new().unwrap();
        for name in ["one", "two"] {
            let binding = bindings.path().join(name);
            fs::create_dir_all(&binding).unwrap();
            fs::write(binding.join("type"), "npmrc").unwrap();
        }
        nodelayer()
            .env("SERVICE_BINDING_ROOT", bindings.path())
            .args(["check", "--working-dir"])
            .arg(project.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("bindings of type npmrc"));
    }

    #[test]
    fn setup_symlinks_requires_linked_node_modules() {
        let app = TempDir::new().unwrap();
        fs::create_dir_all(app.path().join("node_modules")).unwrap();
        nodelayer()
            .args(["setup-symlinks", "/layers/launch-modules/bin/setup-symlinks", "--app-dir"])
            .arg(app.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[cfg(unix)]
    fn fake_npm(dir: &Path) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("npm");
        fs::write(
            &script,
            "#!/bin/sh\n\
             echo \"fake npm $*\" >> \"$(dirname \"$0\")/calls.log\"\n\
             mkdir -p node_modules/left-pad node_modules/@app\n\
             case \"$*\" in *--omit=dev*) ;; *) mkdir -p node_modules/jest ;; esac\n\
             ln -sfn ../../packages/ui node_modules/@app/ui\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn build_installs_then_reuses() {
        let project = project();
        let tools = TempDir::new().unwrap();
        let layers = TempDir::new().unwrap();
        let npm = fake_npm(tools.path());
        let config = tools.path().join("config.toml");
        fs::write(
            &config,
            format!("[npm]\nexecutable = \"{}\"\n", npm.display()),
        )
        .unwrap();

        let build = || {
            let mut cmd = nodelayer();
            cmd.arg("--config")
                .arg(&config)
                .args(["build", "--build", "--launch", "--working-dir"])
                .arg(project.path())
                .arg("--layers")
                .arg(layers.path())
                .arg("--platform")
                .arg(tools.path());
            cmd
        };

        build()
            .assert()
            .success()
            .stdout(predicate::str::contains("build-modules        installed"))
            .stdout(predicate::str::contains("launch-modules       installed"));

        let modules = project.path().join("node_modules");
        assert_eq!(
            fs::read_link(&modules).unwrap(),
            layers.path().join("build-modules/node_modules")
        );

        let launch = layers.path().join("launch-modules/node_modules");
        assert!(launch.join("left-pad").is_dir());
        assert!(!launch.join("jest").exists());
        assert_eq!(
            fs::read_link(launch.join("@app/ui")).unwrap(),
            project.path().join("packages/ui")
        );
        assert!(fs::read_to_string(layers.path().join("build-modules.toml"))
            .unwrap()
            .contains("cache_sha"));

        build()
            .assert()
            .success()
            .stdout(predicate::str::contains("build-modules        reused"))
            .stdout(predicate::str::contains("launch-modules       reused"));

        let calls = fs::read_to_string(tools.path().join("calls.log")).unwrap();
        assert_eq!(calls.lines().count(), 1, "npm ran only for the first build");
    }
}
