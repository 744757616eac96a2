//! Layer orchestration
//!
//! Sequences one build: resolve the install strategy, then for the build
//! area and the launch area in turn decide reuse, run or skip, relink
//! workspace symlinks and record environment and metadata. The two areas
//! are processed strictly one after the other because the launch tree is
//! derived from the build tree when both are requested.
//!
//! Metadata is only assigned after the install it describes succeeded,
//! and layers are only persisted by the caller once the whole build
//! returned `Ok`.

use crate::config::{determine_path, Config};
use crate::environment::{Environment, KEEP_NODE_BUILD_CACHE, NODE_PROJECT_PATH, NPM_VERSION};
use crate::error::{NodeLayerError, NodeLayerResult, PhaseExt};
use crate::exec::{Execution, Executor};
use crate::layer::{Layer, LayerEnv, LayerMetadata, Layers};
use crate::lockfile::find_lockfile;
use crate::process::{BuildManager, BuildProcess, NpmCommand, Phase, PruneProcess, RunRequest};
use crate::symlink::{self, replace_with_symlink, NODE_MODULES_CACHE};
use crate::tree::{copy_tree, merge_tree};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Vendored npm cache directory a project may ship
const PROJECT_NPM_CACHE: &str = "npm-cache";

/// Per-build inputs from the host
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub working_dir: PathBuf,
    pub platform_dir: PathBuf,
    /// Produce the build-time tree
    pub build: bool,
    /// Produce the launch-time tree
    pub launch: bool,
    /// Program the launch layer runs before the app starts
    pub setup_symlinks: Option<PathBuf>,
    /// Parent of the shared `node_modules/.cache` replacement
    pub temp_dir: PathBuf,
}

/// Layers produced by a build, ready to be persisted
#[derive(Debug)]
pub struct BuildResult {
    pub layers: Vec<Layer>,
    /// Names of layers whose install process actually ran
    pub executed: Vec<String>,
}

impl BuildResult {
    /// Persist every layer
    pub async fn write(&self) -> NodeLayerResult<()> {
        for layer in &self.layers {
            layer.write().await?;
        }
        Ok(())
    }
}

/// Values shared by both areas within one build
struct Shared<'a> {
    project: &'a Path,
    npmrc: Option<&'a Path>,
    cache_dir: &'a Path,
    npm: &'a NpmCommand,
}

/// The install orchestrator
pub struct Build {
    config: Config,
    env: Environment,
    executor: Arc<dyn Executor>,
    layers: Layers,
}

impl Build {
    pub fn new(config: Config, env: Environment, executor: Arc<dyn Executor>, layers: Layers) -> Self {
        Self {
            config,
            env,
            executor,
            layers,
        }
    }

    /// Run one build
    pub async fn run(&self, ctx: &BuildContext) -> NodeLayerResult<BuildResult> {
        let npmrc = determine_path("npmrc", &ctx.platform_dir, ".npmrc", &self.env)?;

        info!("Resolving installation process");
        let project = project_path(&self.env, &ctx.working_dir)?;
        unlink_project_modules(&project)?;

        let mut npm = NpmCommand::from_config(&self.config.npm);
        if let Some(version) = self.env.lookup(NPM_VERSION) {
            npm.env = self.install_custom_npm(&npm, &project, version).await?;
        }

        let mut cache_layer = self.layers.get(&self.config.layers.cache).await?;
        cache_layer.cache = true;

        let resolution = BuildManager::new(npm.clone(), self.executor.clone()).resolve(&project)?;
        if resolution.cache_detected {
            prewarm_cache(&project, &cache_layer.path);
        }

        let shared = Shared {
            project: &project,
            npmrc: npmrc.as_deref(),
            cache_dir: &cache_layer.path,
            npm: &npm,
        };

        let mut result = BuildResult {
            layers: Vec::new(),
            executed: Vec::new(),
        };

        let mut build_tree = None;
        if ctx.build {
            let (layer, ran) = self.build_area(&shared, resolution.process.as_ref()).await?;
            build_tree = Some(layer.path.clone());
            if ran {
                result.executed.push(layer.name.clone());
            }
            result.layers.push(layer);
        }

        if ctx.launch {
            let (layer, ran) = self
                .launch_area(ctx, &shared, resolution.process.as_ref(), build_tree.as_deref())
                .await?;
            if ran {
                result.executed.push(layer.name.clone());
            }

            // The app resolves modules through this link; the exec.d helper
            // re-points it at the launch layer when the build layer is gone.
            let linked_tree = build_tree.as_deref().unwrap_or(layer.path.as_path());
            replace_with_symlink(
                &linked_tree.join("node_modules"),
                &project.join("node_modules"),
            )
            .phase(&format!("{} link", layer.name))?;

            result.layers.push(layer);
        }

        if cache_layer.is_populated().await? {
            result.layers.push(cache_layer);
        }

        Ok(result)
    }

    /// Install the requested npm into the project and return the PATH that puts it first
    async fn install_custom_npm(
        &self,
        npm: &NpmCommand,
        project: &Path,
        version: &str,
    ) -> NodeLayerResult<Vec<(String, String)>> {
        semver::VersionReq::parse(version).map_err(|e| NodeLayerError::NpmVersionInvalid {
            version: version.to_string(),
            reason: e.to_string(),
        })?;

        info!("Installing custom npm version {}", version);
        let execution = Execution::new(&npm.executable, project)
            .args(["install".to_string(), format!("npm@{version}")])
            .envs(npm.env.iter().cloned());
        self.executor
            .execute(&execution)
            .await
            .phase("npm version update")?;

        let module_bin = project.join("node_modules").join(".bin");
        let local_bin = project.join("node_modules").join(".bin_local");
        fs::create_dir_all(&local_bin)
            .map_err(|e| NodeLayerError::io(format!("creating {}", local_bin.display()), e))?;
        let local_npm = local_bin.join("npm");
        symlink::remove_path(&local_npm)?;
        fs::hard_link(module_bin.join("npm"), &local_npm)
            .map_err(|e| NodeLayerError::io(format!("linking {}", local_npm.display()), e))?;

        let inherited = self.env.lookup("PATH").unwrap_or_default();
        let path = std::env::join_paths(
            std::iter::once(local_bin)
                .chain(std::env::split_paths(inherited))
                .chain(std::iter::once(module_bin)),
        )
        .map_err(|e| NodeLayerError::EnvInvalid {
            name: "PATH".to_string(),
            value: e.to_string(),
        })?;

        Ok(vec![(
            "PATH".to_string(),
            path.to_string_lossy().into_owned(),
        )])
    }

    async fn build_area(
        &self,
        shared: &Shared<'_>,
        process: &dyn BuildProcess,
    ) -> NodeLayerResult<(Layer, bool)> {
        let name = &self.config.layers.build;
        let label = format!("{name} install");
        let mut layer = self.layers.get(name).await?;

        let decision = process
            .should_run(shared.project, &layer.path, &layer.metadata, shared.npmrc)
            .phase(&label)?;

        if decision.run {
            info!("Executing build environment install process");
            layer = layer.reset().await?;

            let started = Instant::now();
            process
                .run(RunRequest {
                    tree_dir: &layer.path,
                    cache_dir: shared.cache_dir,
                    project_dir: shared.project,
                    config_path: shared.npmrc,
                    phase: Phase::Build,
                })
                .await
                .phase(&label)?;

            if let Some(lockfile) = find_lockfile(shared.project, &shared.npm.lockfiles) {
                symlink::resolve(&lockfile, &layer.path).phase(&format!("{name} relink"))?;
            }
            info!("Completed in {}ms", started.elapsed().as_millis());

            layer.metadata = LayerMetadata::installed(decision.fingerprint);

            if let Some(npmrc) = shared.npmrc {
                layer
                    .build_env
                    .default_value("NPM_CONFIG_GLOBALCONFIG", npmrc.display().to_string());
            }
            add_bin_paths(&mut layer.build_env, shared.project);
            layer.build_env.override_value("NODE_ENV", "development");
        } else {
            info!("Reusing cached layer {}", layer.path.display());
            copy_tree(
                &layer.path.join("node_modules"),
                &shared.project.join("node_modules"),
            )
            .phase(&format!("{name} restore"))?;
        }

        layer.build = true;
        layer.cache = true;
        Ok((layer, decision.run))
    }

    async fn launch_area(
        &self,
        ctx: &BuildContext,
        shared: &Shared<'_>,
        process: &dyn BuildProcess,
        build_tree: Option<&Path>,
    ) -> NodeLayerResult<(Layer, bool)> {
        let name = &self.config.layers.launch;
        let mut layer = self.layers.get(name).await?;

        let decision = process
            .should_run(shared.project, &layer.path, &layer.metadata, shared.npmrc)
            .phase(&format!("{name} install"))?;

        if decision.run {
            info!("Executing launch environment install process");
            layer = layer.reset().await?;
            let started = Instant::now();

            let request = RunRequest {
                tree_dir: &layer.path,
                cache_dir: shared.cache_dir,
                project_dir: shared.project,
                config_path: shared.npmrc,
                phase: Phase::Launch,
            };
            let lockfile = find_lockfile(shared.project, &shared.npm.lockfiles);

            match (build_tree, lockfile.as_deref()) {
                (Some(build_path), Some(lockfile)) => {
                    let label = format!("{name} prune");
                    copy_tree(&build_path.join("node_modules"), &layer.path.join("node_modules"))
                        .phase(&label)?;
                    PruneProcess::new(shared.npm.lockfiles.clone())
                        .run(request)
                        .await
                        .phase(&label)?;
                    symlink::copy(lockfile, build_path, &layer.path)
                        .phase(&format!("{name} relink"))?;
                }
                (_, lockfile) => {
                    process.run(request).await.phase(&format!("{name} install"))?;
                    if let Some(lockfile) = lockfile {
                        symlink::resolve(lockfile, &layer.path)
                            .phase(&format!("{name} relink"))?;
                    }
                }
            }

            if !self.env.lookup_bool(KEEP_NODE_BUILD_CACHE)? {
                let modules = layer.path.join("node_modules");
                if modules.is_dir() {
                    replace_with_symlink(
                        &ctx.temp_dir.join(NODE_MODULES_CACHE),
                        &modules.join(".cache"),
                    )?;
                }
            }
            info!("Completed in {}ms", started.elapsed().as_millis());

            layer.metadata = LayerMetadata::installed(decision.fingerprint);

            layer.launch_env.default_value("NPM_CONFIG_LOGLEVEL", "error");
            layer
                .launch_env
                .default_value("NODE_PROJECT_PATH", shared.project.display().to_string());
            add_bin_paths(&mut layer.launch_env, shared.project);

            if let Some(helper) = &ctx.setup_symlinks {
                layer.exec_d.push(helper.clone());
            }
        } else {
            info!("Reusing cached layer {}", layer.path.display());
        }

        layer.launch = true;
        Ok((layer, decision.run))
    }
}

/// The project directory: the working dir, or `BP_NODE_PROJECT_PATH` beneath it
pub fn project_path(env: &Environment, working_dir: &Path) -> NodeLayerResult<PathBuf> {
    let project = match env.lookup(NODE_PROJECT_PATH) {
        Some(relative) => working_dir.join(relative),
        None => working_dir.to_path_buf(),
    };
    if !project.is_dir() {
        return Err(NodeLayerError::PathNotFound(project));
    }
    Ok(project)
}

fn add_bin_paths(env: &mut LayerEnv, project: &Path) {
    let modules = project.join("node_modules");
    let delim = if cfg!(windows) { ";" } else { ":" };
    env.append("PATH", modules.join(".bin").display().to_string(), delim);
    env.prepend("PATH", modules.join(".bin_local").display().to_string(), delim);
}

/// Seed the shared cache from a vendored project cache; failures only warn
///
/// Entries npm already downloaded into the cache are kept.
fn prewarm_cache(project: &Path, cache_dir: &Path) {
    let vendored = project.join(PROJECT_NPM_CACHE);
    if !vendored.is_dir() {
        return;
    }

    debug!("Seeding npm cache from {}", vendored.display());
    if let Err(e) = merge_tree(&vendored, cache_dir) {
        warn!("Could not seed npm cache from {}: {}", vendored.display(), e);
    }
}

/// Drop a `node_modules` link left in the project by a previous build
fn unlink_project_modules(project: &Path) -> NodeLayerResult<()> {
    let modules = project.join("node_modules");
    let is_link = fs::symlink_metadata(&modules)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if is_link {
        debug!("Removing stale link {}", modules.display());
        symlink::remove_path(&modules)?;
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::exec::testing::FakeExecutor;
    use crate::fingerprint::fingerprint;
    use std::os::unix::fs::symlink as unix_symlink;
    use tempfile::TempDir;

    const LOCK: &str = r#"{
  "name": "app",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "app", "workspaces": ["packages/*"] },
    "node_modules/@scope/member": { "resolved": "packages/member", "link": true },
    "node_modules/left-pad": { "version": "1.3.0" },
    "node_modules/jest": { "version": "29.7.0", "dev": true },
    "packages/member": { "name": "@scope/member", "version": "0.1.0" }
  }
}"#;

    struct Fixture {
        dir: TempDir,
        project: PathBuf,
        layers: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let project = dir.path().join("workspace");
            let layers = dir.path().join("layers");
            fs::create_dir_all(project.join("packages/member")).unwrap();
            fs::write(project.join("packages/member/index.js"), "").unwrap();
            fs::write(project.join("package.json"), r#"{"name":"app"}"#).unwrap();
            fs::write(project.join("package-lock.json"), LOCK).unwrap();
            fs::create_dir_all(&layers).unwrap();
            Self {
                dir,
                project,
                layers,
            }
        }

        fn ctx(&self, build: bool, launch: bool) -> BuildContext {
            BuildContext {
                working_dir: self.project.clone(),
                platform_dir: self.dir.path().join("platform"),
                build,
                launch,
                setup_symlinks: Some(PathBuf::from("/cnb/bin/setup-symlinks")),
                temp_dir: self.dir.path().join("tmp"),
            }
        }

        fn build(&self, executor: Arc<FakeExecutor>) -> Build {
            Build::new(
                Config::default(),
                Environment::default(),
                executor,
                Layers::new(&self.layers),
            )
        }
    }

    /// Behaves like `npm ci` for the fixture lockfile
    fn fake_npm() -> Arc<FakeExecutor> {
        Arc::new(FakeExecutor::new(|execution| {
            let nm = execution.dir.join("node_modules");
            let _ = fs::remove_dir_all(&nm);
            fs::create_dir_all(nm.join("left-pad")).unwrap();
            if !execution.args.contains(&"--omit=dev".to_string()) {
                fs::create_dir_all(nm.join("jest")).unwrap();
            }
            fs::create_dir_all(nm.join("@scope")).unwrap();
            unix_symlink("../../packages/member", nm.join("@scope/member")).unwrap();
            Ok(())
        }))
    }

    #[tokio::test]
    async fn fresh_build_records_fingerprint() {
        let fx = Fixture::new();
        let executor = fake_npm();
        let result = fx.build(executor.clone()).run(&fx.ctx(true, false)).await.unwrap();

        assert_eq!(result.executed, vec!["build-modules"]);
        let layer = &result.layers[0];
        assert_eq!(
            layer.metadata.cache_sha(),
            Some(fingerprint(LOCK.as_bytes(), None).as_str())
        );
        assert!(layer.build && layer.cache);
        assert_eq!(executor.calls().len(), 1);

        // workspace link re-anchored to the project checkout
        let link = layer.path.join("node_modules/@scope/member");
        assert_eq!(fs::read_link(&link).unwrap(), fx.project.join("packages/member"));
        assert!(link.join("index.js").is_file());
    }

    #[tokio::test]
    async fn unchanged_rebuild_reuses_layer() {
        let fx = Fixture::new();
        let first = fx.build(fake_npm()).run(&fx.ctx(true, false)).await.unwrap();
        first.write().await.unwrap();
        fs::remove_dir_all(fx.project.join("node_modules")).unwrap();

        let executor = fake_npm();
        let second = fx.build(executor.clone()).run(&fx.ctx(true, false)).await.unwrap();

        assert!(executor.calls().is_empty());
        assert!(second.executed.is_empty());
        assert_eq!(
            second.layers[0].metadata.cache_sha(),
            first.layers[0].metadata.cache_sha()
        );
        // tree restored into the project
        assert!(fx.project.join("node_modules/left-pad").is_dir());
    }

    #[tokio::test]
    async fn lockfile_change_triggers_install() {
        let fx = Fixture::new();
        fx.build(fake_npm())
            .run(&fx.ctx(true, false))
            .await
            .unwrap()
            .write()
            .await
            .unwrap();

        fs::write(fx.project.join("package-lock.json"), LOCK.replace("1.3.0", "1.3.1")).unwrap();
        let executor = fake_npm();
        let result = fx.build(executor.clone()).run(&fx.ctx(true, false)).await.unwrap();
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(result.executed, vec!["build-modules"]);
    }

    #[tokio::test]
    async fn failed_install_leaves_metadata_untouched() {
        let fx = Fixture::new();
        fx.build(fake_npm())
            .run(&fx.ctx(true, false))
            .await
            .unwrap()
            .write()
            .await
            .unwrap();
        let before = Layers::new(&fx.layers).get("build-modules").await.unwrap().metadata;

        fs::write(fx.project.join("package-lock.json"), LOCK.replace("1.3.0", "2.0.0")).unwrap();
        let failing = Arc::new(FakeExecutor::new(|execution| {
            Err(NodeLayerError::CommandExecution {
                command: execution.command_line(),
                code: 1,
                output: String::new(),
            })
        }));
        let err = fx.build(failing).run(&fx.ctx(true, false)).await.unwrap_err();

        assert!(err.to_string().starts_with("build-modules install failed"));
        let after = Layers::new(&fx.layers).get("build-modules").await.unwrap().metadata;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn launch_after_build_prunes_and_copies_links() {
        let fx = Fixture::new();
        let executor = fake_npm();
        let result = fx.build(executor.clone()).run(&fx.ctx(true, true)).await.unwrap();

        assert_eq!(executor.calls().len(), 1, "launch tree is derived, not reinstalled");
        assert_eq!(result.executed, vec!["build-modules", "launch-modules"]);

        let launch = &result.layers[1];
        let nm = launch.path.join("node_modules");
        assert!(nm.join("left-pad").is_dir());
        assert!(!nm.join("jest").exists());
        assert!(nm.join("@scope/member/index.js").is_file());
        assert_eq!(
            fs::read_link(nm.join(".cache")).unwrap(),
            fx.dir.path().join("tmp").join(NODE_MODULES_CACHE)
        );
        assert!(launch.launch);
        assert_eq!(launch.exec_d, vec![PathBuf::from("/cnb/bin/setup-symlinks")]);
        assert_eq!(
            launch.launch_env.get("NPM_CONFIG_LOGLEVEL", crate::layer::EnvOp::Default),
            Some("error")
        );
    }

    #[tokio::test]
    async fn launch_only_installs_production() {
        let fx = Fixture::new();
        let executor = fake_npm();
        let result = fx.build(executor.clone()).run(&fx.ctx(false, true)).await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].args.contains(&"--omit=dev".to_string()));
        let nm = result.layers[0].path.join("node_modules");
        assert!(!nm.join("jest").exists());
        assert!(nm.join("@scope/member").is_dir());
    }

    #[tokio::test]
    async fn custom_npm_version_sets_explicit_path() {
        let fx = Fixture::new();
        let executor = Arc::new(FakeExecutor::new(|execution| {
            if execution.args.first().map(String::as_str) == Some("install") {
                let bin = execution.dir.join("node_modules/.bin");
                fs::create_dir_all(&bin).unwrap();
                fs::write(bin.join("npm"), "#!/bin/sh").unwrap();
            }
            Ok(())
        }));
        let build = Build::new(
            Config::default(),
            Environment::from_pairs([(NPM_VERSION, "10.2.4"), ("PATH", "/usr/bin")]),
            executor.clone(),
            Layers::new(&fx.layers),
        );

        build.run(&fx.ctx(true, false)).await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls[0].command_line(), "npm install npm@10.2.4");
        let path = calls[1].env_var("PATH").unwrap();
        let local_bin = fx.project.join("node_modules/.bin_local");
        assert!(path.starts_with(&local_bin.display().to_string()));
        assert!(path.contains("/usr/bin"));
        assert!(local_bin.join("npm").is_file());
    }

    #[tokio::test]
    async fn invalid_npm_version_is_rejected() {
        let fx = Fixture::new();
        let build = Build::new(
            Config::default(),
            Environment::from_pairs([(NPM_VERSION, "not a version!")]),
            fake_npm(),
            Layers::new(&fx.layers),
        );
        let err = build.run(&fx.ctx(true, false)).await.unwrap_err();
        assert!(matches!(err, NodeLayerError::NpmVersionInvalid { .. }));
    }

    #[tokio::test]
    async fn vendored_cache_is_seeded() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.project.join("npm-cache/_cacache")).unwrap();
        fs::write(fx.project.join("npm-cache/_cacache/index"), "x").unwrap();

        let result = fx.build(fake_npm()).run(&fx.ctx(true, false)).await.unwrap();

        let cache = result.layers.last().unwrap();
        assert_eq!(cache.name, "npm-cache");
        assert!(cache.path.join("_cacache/index").is_file());
    }

    #[tokio::test]
    async fn vendored_cache_merges_with_downloaded_entries() {
        let fx = Fixture::new();
        let cache = fx.layers.join("npm-cache/_cacache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("downloaded"), "npm").unwrap();
        fs::create_dir_all(fx.project.join("npm-cache/_cacache")).unwrap();
        fs::write(fx.project.join("npm-cache/_cacache/vendored"), "x").unwrap();

        fx.build(fake_npm()).run(&fx.ctx(true, false)).await.unwrap();

        assert_eq!(fs::read_to_string(cache.join("downloaded")).unwrap(), "npm");
        assert!(cache.join("vendored").is_file());
    }

    #[tokio::test]
    async fn project_modules_link_into_build_tree() {
        let fx = Fixture::new();
        let result = fx.build(fake_npm()).run(&fx.ctx(true, true)).await.unwrap();

        let modules = fx.project.join("node_modules");
        assert_eq!(
            fs::read_link(&modules).unwrap(),
            result.layers[0].path.join("node_modules")
        );
        assert!(modules.join("jest").is_dir());
    }

    #[tokio::test]
    async fn launch_only_links_project_to_launch_tree() {
        let fx = Fixture::new();
        let result = fx.build(fake_npm()).run(&fx.ctx(false, true)).await.unwrap();

        assert_eq!(
            fs::read_link(fx.project.join("node_modules")).unwrap(),
            result.layers[0].path.join("node_modules")
        );
    }

    #[tokio::test]
    async fn launch_helper_repoints_project_at_launch_tree() {
        let fx = Fixture::new();
        let result = fx.build(fake_npm()).run(&fx.ctx(true, true)).await.unwrap();
        result.write().await.unwrap();
        let build_layer = result.layers[0].path.clone();
        let launch_layer = result.layers[1].path.clone();
        let helper = launch_layer.join("bin/setup-symlinks");
        let tmp = fx.dir.path().join("tmp");

        // build image: the build tree is still present
        assert_eq!(
            symlink::launch::setup_symlinks(&helper, &fx.project, &tmp).unwrap(),
            symlink::launch::SetupOutcome::AlreadyLinked
        );

        // launch image: only the launch layer is exported
        fs::remove_dir_all(&build_layer).unwrap();
        let outcome = symlink::launch::setup_symlinks(&helper, &fx.project, &tmp).unwrap();

        assert!(matches!(outcome, symlink::launch::SetupOutcome::Relinked { .. }));
        let modules = fx.project.join("node_modules");
        assert!(modules.join("left-pad").is_dir());
        assert!(!modules.join("jest").exists());
        assert!(modules.join("@scope/member/index.js").is_file());
    }

    #[tokio::test]
    async fn rebuild_replaces_stale_project_link() {
        let fx = Fixture::new();
        fx.build(fake_npm())
            .run(&fx.ctx(true, true))
            .await
            .unwrap()
            .write()
            .await
            .unwrap();

        let result = fx.build(fake_npm()).run(&fx.ctx(true, false)).await.unwrap();

        assert!(result.executed.is_empty());
        let modules = fx.project.join("node_modules");
        assert!(!fs::symlink_metadata(&modules).unwrap().file_type().is_symlink());
        assert!(modules.join("left-pad").is_dir());
    }

    #[tokio::test]
    async fn project_path_override_must_exist() {
        let fx = Fixture::new();
        let build = Build::new(
            Config::default(),
            Environment::from_pairs([(NODE_PROJECT_PATH, "missing")]),
            fake_npm(),
            Layers::new(&fx.layers),
        );
        let err = build.run(&fx.ctx(true, false)).await.unwrap_err();
        assert!(matches!(err, NodeLayerError::PathNotFound(_)));
    }
}
