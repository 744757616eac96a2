//! Install processes
//!
//! Every process answers two questions for a target layer: can the tree
//! already in it be reused ([`BuildProcess::should_run`]), and if not, how
//! to produce it ([`BuildProcess::run`]). The decision is pure; persisting
//! the returned fingerprint is left to the caller, after `run` succeeds.

mod clean_install;
mod prune;
mod regular_install;
mod strategy;

pub use clean_install::CleanInstallProcess;
pub use prune::{prune_tree, PruneProcess, PruneReport};
pub use regular_install::RegularInstallProcess;
pub use strategy::{BuildManager, InstallStrategy, Resolution};

use crate::error::{NodeLayerError, NodeLayerResult};
use crate::exec::{Execution, Executor};
use crate::fingerprint::fingerprint_files;
use crate::layer::LayerMetadata;
use crate::tree::copy_tree;
use async_trait::async_trait;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Which storage area a process is populating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Full tree including dev dependencies
    Build,
    /// Production-only tree
    Launch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Launch => write!(f, "launch"),
        }
    }
}

/// Outcome of a reuse check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDecision {
    pub run: bool,
    /// Fingerprint to store once the run has succeeded
    pub fingerprint: String,
}

/// Inputs to a process run
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    /// Layer receiving `node_modules`
    pub tree_dir: &'a Path,
    /// Shared npm cache directory
    pub cache_dir: &'a Path,
    pub project_dir: &'a Path,
    pub config_path: Option<&'a Path>,
    pub phase: Phase,
}

/// An install (or prune) process
#[async_trait]
pub trait BuildProcess: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Decide whether the tree in `tree_dir` must be rebuilt
    fn should_run(
        &self,
        project_dir: &Path,
        tree_dir: &Path,
        metadata: &LayerMetadata,
        config_path: Option<&Path>,
    ) -> NodeLayerResult<RunDecision>;

    /// Produce `<tree_dir>/node_modules`
    async fn run(&self, request: RunRequest<'_>) -> NodeLayerResult<()>;
}

/// How to invoke npm
#[derive(Debug, Clone)]
pub struct NpmCommand {
    pub executable: String,
    pub unsafe_perm: bool,
    /// Lockfile names, highest precedence first
    pub lockfiles: Vec<String>,
    /// Extra variables for every npm execution, e.g. an adjusted `PATH`
    pub env: Vec<(String, String)>,
}

impl NpmCommand {
    pub fn from_config(config: &crate::config::schema::NpmConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            unsafe_perm: config.unsafe_perm,
            lockfiles: config.lockfiles.clone(),
            env: Vec::new(),
        }
    }

    /// Build an install execution (`npm <subcommand> ...`)
    fn install(&self, subcommand: &str, request: &RunRequest<'_>) -> Execution {
        let mut args = vec![subcommand.to_string()];
        if self.unsafe_perm {
            args.push("--unsafe-perm".to_string());
        }
        args.push("--cache".to_string());
        args.push(request.cache_dir.display().to_string());
        if request.phase == Phase::Launch {
            args.push("--omit=dev".to_string());
        }

        let mut execution = Execution::new(&self.executable, request.project_dir)
            .args(args)
            .envs(self.env.iter().cloned());
        if let Some(config) = request.config_path {
            execution = execution.envs([(
                "NPM_CONFIG_GLOBALCONFIG".to_string(),
                config.display().to_string(),
            )]);
        }
        execution
    }
}

impl Default for NpmCommand {
    fn default() -> Self {
        Self::from_config(&crate::config::schema::NpmConfig::default())
    }
}

/// Decide reuse from a fingerprint input file and the current tree
///
/// Reuse requires a stored fingerprint equal to the new one and a
/// non-empty `<tree_dir>/node_modules`.
pub(crate) fn reuse_decision(
    input: &Path,
    config_path: Option<&Path>,
    tree_dir: &Path,
    metadata: &LayerMetadata,
) -> NodeLayerResult<RunDecision> {
    let fingerprint = fingerprint_files(input, config_path)?;
    let run = match metadata.cache_sha() {
        Some(previous) if previous == fingerprint => !modules_populated(tree_dir)?,
        Some(_) => {
            debug!("Fingerprint changed for {}", tree_dir.display());
            true
        }
        None => true,
    };
    Ok(RunDecision { run, fingerprint })
}

/// Whether `<tree_dir>/node_modules` exists and has entries
pub(crate) fn modules_populated(tree_dir: &Path) -> NodeLayerResult<bool> {
    let modules = tree_dir.join("node_modules");
    match fs::read_dir(&modules) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(NodeLayerError::io(format!("reading {}", modules.display()), e)),
    }
}

/// Run npm in the project, then copy the result into the layer
pub(crate) async fn install_into_tree(
    executor: &Arc<dyn Executor>,
    execution: Execution,
    request: &RunRequest<'_>,
) -> NodeLayerResult<()> {
    executor.execute(&execution).await?;

    let installed = request.project_dir.join("node_modules");
    let dest = request.tree_dir.join("node_modules");
    if installed.exists() {
        copy_tree(&installed, &dest)?;
    } else {
        fs::create_dir_all(&dest)
            .map_err(|e| NodeLayerError::io(format!("creating {}", dest.display()), e))?;
    }
    Ok(())
}

/// Lockfile path for a project, or the error a missing one should produce
pub(crate) fn required_lockfile(project_dir: &Path, names: &[String]) -> NodeLayerResult<PathBuf> {
    crate::lockfile::find_lockfile(project_dir, names).ok_or_else(|| {
        let name = names.last().map(String::as_str).unwrap_or("package-lock.json");
        NodeLayerError::LockfileNotFound(project_dir.join(name))
    })
}
