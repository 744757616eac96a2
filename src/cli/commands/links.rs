//! Links command - show the workspace link plan for a lockfile

use crate::cli::args::{LinksArgs, OutputFormat};
use crate::config::Config;
use crate::error::{NodeLayerError, NodeLayerResult};
use crate::lockfile::{find_lockfile, Lockfile};
use crate::symlink::{plan_resolve, LinkTarget, PlannedLink};
use console::style;
use std::path::Path;

/// Execute the links command
///
/// Only plans; the filesystem is left untouched.
pub async fn execute(args: LinksArgs, config: &Config) -> NodeLayerResult<()> {
    let lockfile_path = match args.lockfile {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| NodeLayerError::io("getting current directory", e))?;
            find_lockfile(&cwd, &config.npm.lockfiles)
                .ok_or_else(|| NodeLayerError::LockfileNotFound(cwd.join("package-lock.json")))?
        }
    };

    let lockfile = Lockfile::from_file(&lockfile_path)?;
    let project_dir = lockfile_path.parent().unwrap_or_else(|| Path::new("."));
    let layer = args.layer.as_deref().unwrap_or(project_dir);
    let plan = plan_resolve(&lockfile, project_dir, layer);

    match args.format {
        OutputFormat::Table => print_table(&lockfile_path, &plan),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Plain => {
            for planned in &plan {
                println!("{}", planned.key);
            }
        }
    }

    Ok(())
}

fn print_table(lockfile: &Path, plan: &[PlannedLink]) {
    if plan.is_empty() {
        println!("No workspace links in {}", lockfile.display());
        return;
    }

    println!("{:<40} {}", style("LINK").bold(), style("TARGET").bold());
    println!("{}", "-".repeat(60));
    for planned in plan {
        let target = match &planned.target {
            LinkTarget::Path(path) | LinkTarget::SameAs(path) => path.display(),
        };
        println!("{:<40} {}", planned.key, target);
    }
    println!();
    println!("{} link(s)", plan.len());
}
