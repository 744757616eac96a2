//! Workspace symlink relocation
//!
//! npm records workspace members and `link:` dependencies as symlinks under
//! `node_modules`, usually relative to the project checkout. Once the tree
//! is copied into a layer with a different absolute path those links
//! dangle. Relinking happens in two phases: [`plan_resolve`] and
//! [`plan_copy`] compute the desired link set from the lockfile without
//! touching the filesystem, then [`apply`] makes the filesystem match.
//!
//! Links are never edited in place. A stale link is removed and created
//! again, after its parent directories exist (scoped packages nest links
//! two levels deep).

pub mod launch;

use crate::error::{NodeLayerError, NodeLayerResult};
use crate::lockfile::Lockfile;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory name under the temp dir that replaces `node_modules/.cache`
pub const NODE_MODULES_CACHE: &str = "node_modules_cache";

/// A link that should exist after relinking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedLink {
    /// Lockfile key, e.g. `node_modules/@scope/member`
    pub key: String,
    /// Where the symlink lives
    pub link: PathBuf,
    /// What it should point at
    pub target: LinkTarget,
}

/// Target of a planned link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum LinkTarget {
    /// A fixed directory, known from the lockfile
    Path(PathBuf),
    /// Whatever the existing link at this path resolves to
    SameAs(PathBuf),
}

/// What happened to a single link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// No link existed; one was created
    Created,
    /// A stale link was removed and recreated
    Replaced,
    /// The link already resolved to a directory
    Unchanged,
    /// The target does not exist; nothing was done
    Skipped,
}

/// Summary of an [`apply`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelinkReport {
    pub created: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl RelinkReport {
    /// Whether the pass changed anything on disk
    pub fn mutated(&self) -> bool {
        self.created + self.replaced > 0
    }

    fn record(&mut self, outcome: LinkOutcome) {
        match outcome {
            LinkOutcome::Created => self.created += 1,
            LinkOutcome::Replaced => self.replaced += 1,
            LinkOutcome::Unchanged => self.unchanged += 1,
            LinkOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Plan links for a tree relocated from `project_dir` into `layer_path`
///
/// Each link entry's `resolved` path is project-relative, so the link at
/// `<layer>/<key>` should point at `<project>/<resolved>`.
pub fn plan_resolve(lockfile: &Lockfile, project_dir: &Path, layer_path: &Path) -> Vec<PlannedLink> {
    lockfile
        .links()
        .filter_map(|(key, entry)| match entry.resolved.as_deref() {
            Some(resolved) => Some(PlannedLink {
                key: key.to_string(),
                link: layer_path.join(key),
                target: LinkTarget::Path(project_dir.join(resolved)),
            }),
            None => {
                debug!("Link entry {} has no resolved path, skipping", key);
                None
            }
        })
        .collect()
}

/// Plan links carried from one layer to another
///
/// The target layer's link points wherever the source layer's link points.
pub fn plan_copy(lockfile: &Lockfile, source_layer: &Path, target_layer: &Path) -> Vec<PlannedLink> {
    lockfile
        .links()
        .map(|(key, _)| PlannedLink {
            key: key.to_string(),
            link: target_layer.join(key),
            target: LinkTarget::SameAs(source_layer.join(key)),
        })
        .collect()
}

/// Make the filesystem match a plan
pub fn apply(plan: &[PlannedLink]) -> NodeLayerResult<RelinkReport> {
    let mut report = RelinkReport::default();
    for planned in plan {
        let outcome = match concrete_target(&planned.target)? {
            Some(target) => ensure_link(&planned.link, &target)?,
            None => LinkOutcome::Skipped,
        };
        if outcome == LinkOutcome::Skipped {
            warn!("Skipping dangling workspace link {}", planned.key);
        } else {
            debug!("{}: {:?}", planned.key, outcome);
        }
        report.record(outcome);
    }
    Ok(report)
}

/// Re-anchor every workspace link in `layer_path` to the project that owns `lockfile_path`
pub fn resolve(lockfile_path: &Path, layer_path: &Path) -> NodeLayerResult<RelinkReport> {
    let lockfile = Lockfile::from_file(lockfile_path)?;
    let project_dir = lockfile_path.parent().unwrap_or_else(|| Path::new("."));
    let report = apply(&plan_resolve(&lockfile, project_dir, layer_path))?;
    info!(
        "Resolved workspace links in {} ({} created, {} replaced, {} skipped)",
        layer_path.display(),
        report.created,
        report.replaced,
        report.skipped
    );
    Ok(report)
}

/// Carry workspace links from `source_layer` into `target_layer`
pub fn copy(lockfile_path: &Path, source_layer: &Path, target_layer: &Path) -> NodeLayerResult<RelinkReport> {
    let lockfile = Lockfile::from_file(lockfile_path)?;
    let report = apply(&plan_copy(&lockfile, source_layer, target_layer))?;
    info!(
        "Copied workspace links {} -> {} ({} created, {} replaced, {} skipped)",
        source_layer.display(),
        target_layer.display(),
        report.created,
        report.replaced,
        report.skipped
    );
    Ok(report)
}

/// Turn a planned target into an existing path, or `None` when it dangles
fn concrete_target(target: &LinkTarget) -> NodeLayerResult<Option<PathBuf>> {
    let path = match target {
        LinkTarget::Path(path) => path.clone(),
        LinkTarget::SameAs(source) => match fs::read_link(source) {
            Ok(dest) => absolutize(source, dest),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidInput => {
                return Err(NodeLayerError::LinkCollision {
                    path: source.clone(),
                })
            }
            Err(e) => {
                return Err(NodeLayerError::io(
                    format!("reading link {}", source.display()),
                    e,
                ))
            }
        },
    };

    Ok(path.exists().then_some(path))
}

/// Resolve a link's destination relative to the directory containing the link
fn absolutize(link: &Path, dest: PathBuf) -> PathBuf {
    if dest.is_absolute() {
        dest
    } else {
        link.parent().unwrap_or_else(|| Path::new("/")).join(dest)
    }
}

/// Ensure `link` is a symlink that resolves to a directory, creating it to `target` if needed
fn ensure_link(link: &Path, target: &Path) -> NodeLayerResult<LinkOutcome> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::metadata(link).map(|m| m.is_dir()).unwrap_or(false) {
                return Ok(LinkOutcome::Unchanged);
            }
            fs::remove_file(link)
                .map_err(|e| NodeLayerError::io(format!("removing stale link {}", link.display()), e))?;
            create_symlink(target, link)?;
            Ok(LinkOutcome::Replaced)
        }
        Ok(_) => Err(NodeLayerError::LinkCollision {
            path: link.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            create_symlink(target, link)?;
            Ok(LinkOutcome::Created)
        }
        Err(e) => Err(NodeLayerError::io(format!("inspecting {}", link.display()), e)),
    }
}

/// Remove whatever is at `link` and put a symlink to `target` there
pub fn replace_with_symlink(target: &Path, link: &Path) -> NodeLayerResult<()> {
    remove_path(link)?;
    create_symlink(target, link)
}

/// Remove a file, symlink or directory tree; missing paths are fine
pub(crate) fn remove_path(path: &Path) -> NodeLayerResult<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(|e| NodeLayerError::io(format!("removing {}", path.display()), e))
}

fn create_symlink(target: &Path, link: &Path) -> NodeLayerResult<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| NodeLayerError::io(format!("creating {}", parent.display()), e))?;
    }

    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let result = std::os::windows::fs::symlink_dir(target, link);

    result.map_err(|e| {
        NodeLayerError::io(
            format!("linking {} -> {}", link.display(), target.display()),
            e,
        )
    })
}
