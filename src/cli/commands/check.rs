//! Check command - report what a build would do without running npm

use crate::build::project_path;
use crate::cli::args::{CheckArgs, OutputFormat};
use crate::cli::dir_or_current;
use crate::config::{determine_path, Config};
use crate::environment::Environment;
use crate::error::NodeLayerResult;
use crate::exec::ProcessExecutor;
use crate::layer::{LayerMetadata, Layers};
use crate::process::{BuildManager, InstallStrategy, NpmCommand};
use console::style;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct CheckReport {
    project: PathBuf,
    strategy: String,
    lockfile: Option<PathBuf>,
    npmrc: Option<PathBuf>,
    fingerprint: String,
    layers: Vec<LayerStatus>,
}

#[derive(Debug, Serialize)]
struct LayerStatus {
    name: String,
    stored: Option<String>,
    reuse: bool,
}

/// Execute the check command
pub async fn execute(args: CheckArgs, config: &Config) -> NodeLayerResult<()> {
    let env = Environment::from_process();
    let working_dir = dir_or_current(args.working_dir)?;
    let project = project_path(&env, &working_dir)?;
    let npmrc = determine_path("npmrc", &args.platform, ".npmrc", &env)?;

    let npm = NpmCommand::from_config(&config.npm);
    let resolution = BuildManager::new(npm, Arc::new(ProcessExecutor::new())).resolve(&project)?;
    let process = resolution.process;

    let mut statuses = Vec::new();
    let fingerprint = process
        .should_run(&project, &project, &LayerMetadata::default(), npmrc.as_deref())?
        .fingerprint;

    if let Some(root) = args.layers {
        let layers = Layers::new(root);
        for name in [&config.layers.build, &config.layers.launch] {
            let layer = layers.get(name).await?;
            let decision =
                process.should_run(&project, &layer.path, &layer.metadata, npmrc.as_deref())?;
            statuses.push(LayerStatus {
                name: name.clone(),
                stored: layer.metadata.cache_sha,
                reuse: !decision.run,
            });
        }
    }

    let report = CheckReport {
        strategy: resolution.strategy.to_string(),
        lockfile: match resolution.strategy {
            InstallStrategy::CleanInstall { lockfile } => Some(lockfile),
            InstallStrategy::RegularInstall => None,
        },
        project,
        npmrc,
        fingerprint,
        layers: statuses,
    };

    match args.format {
        OutputFormat::Table => print_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => {
            for layer in &report.layers {
                let action = if layer.reuse { "reuse" } else { "install" };
                println!("{} {}", layer.name, action);
            }
        }
    }

    Ok(())
}

/// First 12 characters of a stored fingerprint
fn short_sha(sha: &str) -> String {
    sha.chars().take(12).collect()
}

fn print_table(report: &CheckReport) {
    println!("{}", style("Install plan").cyan().bold());
    println!();
    println!("{:<12} {}", style("Project").bold(), report.project.display());
    println!("{:<12} {}", style("Strategy").bold(), report.strategy);
    if let Some(lockfile) = &report.lockfile {
        println!("{:<12} {}", style("Lockfile").bold(), lockfile.display());
    }
    if let Some(npmrc) = &report.npmrc {
        println!("{:<12} {}", style("npmrc").bold(), npmrc.display());
    }
    println!("{:<12} {}", style("Fingerprint").bold(), report.fingerprint);
    println!();

    println!(
        "{:<20} {:<10} {}",
        style("LAYER").bold(),
        style("ACTION").bold(),
        style("STORED").bold()
    );
    println!("{}", "-".repeat(50));
    for layer in &report.layers {
        let action = if layer.reuse {
            style("reuse").green()
        } else {
            style("install").yellow()
        };
        let stored = layer
            .stored
            .as_deref()
            .map(short_sha)
            .unwrap_or_else(|| "-".to_string());
        println!("{:<20} {:<10} {}", layer.name, action, stored);
    }
}
