//! Install strategy selection
//!
//! A project with a lockfile gets an exact `npm ci`; a project with only a
//! `package.json` gets `npm install`. Anything else is not an npm project.

use super::{BuildProcess, CleanInstallProcess, NpmCommand, RegularInstallProcess};
use crate::error::{NodeLayerError, NodeLayerResult};
use crate::exec::Executor;
use crate::lockfile::find_lockfile;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Detected install strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStrategy {
    /// Lockfile present: install exactly what it records
    CleanInstall { lockfile: PathBuf },
    /// Only `package.json`: let npm resolve
    RegularInstall,
}

impl InstallStrategy {
    /// Inspect a project directory
    pub fn detect(project_dir: &Path, lockfiles: &[String]) -> NodeLayerResult<Self> {
        if let Some(lockfile) = find_lockfile(project_dir, lockfiles) {
            return Ok(Self::CleanInstall { lockfile });
        }
        if project_dir.join("package.json").is_file() {
            return Ok(Self::RegularInstall);
        }
        Err(NodeLayerError::UnsupportedProject(project_dir.to_path_buf()))
    }

    /// Whether a lockfile was found
    pub fn has_lockfile(&self) -> bool {
        matches!(self, Self::CleanInstall { .. })
    }
}

impl fmt::Display for InstallStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CleanInstall { .. } => write!(f, "clean install"),
            Self::RegularInstall => write!(f, "regular install"),
        }
    }
}

/// Result of strategy resolution
pub struct Resolution {
    pub strategy: InstallStrategy,
    pub process: Box<dyn BuildProcess>,
    /// Whether the shared npm cache is worth pre-warming
    pub cache_detected: bool,
}

/// Builds the install process for a project
pub struct BuildManager {
    npm: NpmCommand,
    executor: Arc<dyn Executor>,
}

impl BuildManager {
    pub fn new(npm: NpmCommand, executor: Arc<dyn Executor>) -> Self {
        Self { npm, executor }
    }

    /// Choose and construct the install process for `project_dir`
    pub fn resolve(&self, project_dir: &Path) -> NodeLayerResult<Resolution> {
        let strategy = InstallStrategy::detect(project_dir, &self.npm.lockfiles)?;
        info!("Selected {} process", strategy);

        let process: Box<dyn BuildProcess> = match strategy {
            InstallStrategy::CleanInstall { .. } => Box::new(CleanInstallProcess::new(
                self.npm.clone(),
                self.executor.clone(),
            )),
            InstallStrategy::RegularInstall => Box::new(RegularInstallProcess::new(
                self.npm.clone(),
                self.executor.clone(),
            )),
        };

        Ok(Resolution {
            cache_detected: strategy.has_lockfile(),
            strategy,
            process,
        })
    }
}
