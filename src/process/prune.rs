//! Offline pruning of an installed tree down to production dependencies
//!
//! Walks `<tree>/node_modules` (scoped and nested packages included) and
//! deletes every package whose install path is not in the lockfile's
//! production subset. Nothing is fetched; the lockfile is the only input.

use super::{required_lockfile, reuse_decision, BuildProcess, RunDecision, RunRequest};
use crate::error::{NodeLayerError, NodeLayerResult};
use crate::layer::LayerMetadata;
use crate::lockfile::Lockfile;
use crate::symlink::remove_path;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What a prune removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Install paths of removed packages
    pub removed: Vec<String>,
    /// Dangling `.bin` entries removed
    pub dangling_bins: usize,
}

/// Remove packages outside the production subset from `<tree_dir>/node_modules`
pub fn prune_tree(tree_dir: &Path, lockfile: &Lockfile) -> NodeLayerResult<PruneReport> {
    let keep: HashSet<&str> = lockfile.production_paths().collect();
    let mut pruner = Pruner {
        keep,
        report: PruneReport::default(),
    };
    pruner.walk(&tree_dir.join("node_modules"), "node_modules")?;
    Ok(pruner.report)
}

struct Pruner<'a> {
    keep: HashSet<&'a str>,
    report: PruneReport,
}

impl Pruner<'_> {
    fn walk(&mut self, modules: &Path, prefix: &str) -> NodeLayerResult<()> {
        if !modules.is_dir() {
            return Ok(());
        }

        let mut bins = Vec::new();
        for (name, path) in sorted_entries(modules)? {
            if name == ".bin" {
                bins.push(path);
            } else if name.starts_with('.') || !is_dir_or_link(&path) {
                continue;
            } else if name.starts_with('@') && !is_symlink(&path) {
                for (child, child_path) in sorted_entries(&path)? {
                    self.visit(&format!("{prefix}/{name}/{child}"), &child_path)?;
                }
                remove_if_empty(&path)?;
            } else {
                self.visit(&format!("{prefix}/{name}"), &path)?;
            }
        }

        // after removals so links into removed packages are caught
        for bin in bins {
            self.clean_bin(&bin)?;
        }
        Ok(())
    }

    fn visit(&mut self, key: &str, path: &Path) -> NodeLayerResult<()> {
        if !self.keep.contains(key) {
            debug!("Pruning {}", key);
            remove_path(path)?;
            self.report.removed.push(key.to_string());
            return Ok(());
        }

        if !is_symlink(path) {
            self.walk(&path.join("node_modules"), &format!("{key}/node_modules"))?;
        }
        Ok(())
    }

    fn clean_bin(&mut self, bin: &Path) -> NodeLayerResult<()> {
        for (_, entry) in sorted_entries(bin)? {
            if is_symlink(&entry) && fs::metadata(&entry).is_err() {
                remove_path(&entry)?;
                self.report.dangling_bins += 1;
            }
        }
        Ok(())
    }
}

fn sorted_entries(dir: &Path) -> NodeLayerResult<Vec<(String, PathBuf)>> {
    let read = fs::read_dir(dir)
        .map_err(|e| NodeLayerError::io(format!("reading {}", dir.display()), e))?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| NodeLayerError::io(format!("reading {}", dir.display()), e))?;
        entries.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }
    entries.sort();
    Ok(entries)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn is_dir_or_link(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.is_dir() || m.file_type().is_symlink())
        .unwrap_or(false)
}

fn remove_if_empty(dir: &Path) -> NodeLayerResult<()> {
    let empty = fs::read_dir(dir)
        .map_err(|e| NodeLayerError::io(format!("reading {}", dir.display()), e))?
        .next()
        .is_none();
    if empty {
        fs::remove_dir(dir)
            .map_err(|e| NodeLayerError::io(format!("removing {}", dir.display()), e))?;
    }
    Ok(())
}

/// Prune an installed tree in place for the launch layer
#[derive(Debug, Clone)]
pub struct PruneProcess {
    lockfiles: Vec<String>,
}

impl PruneProcess {
    pub fn new(lockfiles: Vec<String>) -> Self {
        Self { lockfiles }
    }
}

#[async_trait]
impl BuildProcess for PruneProcess {
    fn name(&self) -> &'static str {
        "prune"
    }

    fn should_run(
        &self,
        project_dir: &Path,
        tree_dir: &Path,
        metadata: &LayerMetadata,
        config_path: Option<&Path>,
    ) -> NodeLayerResult<RunDecision> {
        let lockfile = required_lockfile(project_dir, &self.lockfiles)?;
        reuse_decision(&lockfile, config_path, tree_dir, metadata)
    }

    async fn run(&self, request: RunRequest<'_>) -> NodeLayerResult<()> {
        let lockfile_path = required_lockfile(request.project_dir, &self.lockfiles)?;
        let lockfile = Lockfile::from_file(&lockfile_path)?;
        let report = prune_tree(request.tree_dir, &lockfile)?;
        info!(
            "Pruned {} packages from {}",
            report.removed.len(),
            request.tree_dir.display()
        );
        Ok(())
    }
}
