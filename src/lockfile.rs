//! npm lockfile parsing
//!
//! Reads `package-lock.json` (lockfile versions 2 and 3) into an ordered
//! map of install paths to package entries. Only the `packages` section is
//! consulted; v1 lockfiles parse to an empty package set.

use crate::error::{NodeLayerError, NodeLayerResult};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lockfile names in the order npm itself gives them precedence
pub const LOCKFILE_NAMES: &[&str] = &["npm-shrinkwrap.json", "package-lock.json"];

/// A single resolved package as recorded in the lockfile
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    #[serde(default)]
    pub version: Option<String>,

    /// Registry URL, or for links the project-relative target directory
    #[serde(default)]
    pub resolved: Option<String>,

    #[serde(default)]
    pub integrity: Option<String>,

    /// True when the dependency is a local symlink (workspace / `link:`)
    #[serde(default)]
    pub link: bool,

    #[serde(default)]
    pub dev: bool,

    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub dev_optional: bool,
}

impl PackageEntry {
    /// Whether this entry belongs to the production dependency subset
    ///
    /// `devOptional` entries are reachable from production through an
    /// optional edge, so they survive a dev-only prune.
    pub fn is_production(&self) -> bool {
        !self.dev
    }
}

/// Parsed lockfile
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub lockfile_version: Option<u32>,

    /// Install path (`node_modules/foo`) to entry, in file order
    #[serde(default)]
    pub packages: IndexMap<String, PackageEntry>,
}

impl Lockfile {
    /// Parse a lockfile from disk
    pub fn from_file(path: &Path) -> NodeLayerResult<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(NodeLayerError::LockfileNotFound(path.to_path_buf()))
            }
            Err(e) => {
                return Err(NodeLayerError::io(
                    format!("reading lockfile {}", path.display()),
                    e,
                ))
            }
        };

        let lockfile = Self::parse(&content).map_err(|e| NodeLayerError::LockfileMalformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(
            "Parsed {} ({} packages)",
            path.display(),
            lockfile.packages.len()
        );
        Ok(lockfile)
    }

    /// Parse a lockfile from a JSON string
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Entries that are local symlinks, skipping the root entry
    pub fn links(&self) -> impl Iterator<Item = (&str, &PackageEntry)> {
        self.installed().filter(|(_, entry)| entry.link)
    }

    /// Entries installed under a `node_modules` directory
    pub fn installed(&self) -> impl Iterator<Item = (&str, &PackageEntry)> {
        self.packages
            .iter()
            .filter(|(key, _)| is_install_path(key))
            .map(|(key, entry)| (key.as_str(), entry))
    }

    /// Install paths that belong to the production subset
    pub fn production_paths(&self) -> impl Iterator<Item = &str> {
        self.installed()
            .filter(|(_, entry)| entry.is_production())
            .map(|(key, _)| key)
    }
}

/// Whether a lockfile key names something inside `node_modules`
fn is_install_path(key: &str) -> bool {
    key.starts_with("node_modules/") || key.contains("/node_modules/")
}

/// Find the lockfile npm would use for a project, if any
pub fn find_lockfile(project_dir: &Path, names: &[String]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| project_dir.join(name))
        .find(|path| path.is_file())
}
