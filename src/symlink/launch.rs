//! Launch-time repair of `node_modules`
//!
//! The launch image keeps `<app>/node_modules` as a symlink into the build
//! environment. When the app starts somewhere that path no longer exists,
//! this helper points it (and every workspace member link) back into the
//! launch layer. It runs from the layer's `bin/` directory, so the layer
//! path is the executable's grand-parent.

use super::{absolutize, replace_with_symlink, NODE_MODULES_CACHE};
use crate::error::{NodeLayerError, NodeLayerResult};
use crate::lockfile::{find_lockfile, Lockfile, LOCKFILE_NAMES};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What the helper did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// `node_modules` already resolved; nothing was touched
    AlreadyLinked,
    /// Links were rewritten into the layer
    Relinked { workspace_links: usize },
}

/// Repair `<app_dir>/node_modules` so it resolves into the layer owning `executable_path`
///
/// `cache_root` is where the `node_modules/.cache` replacement directory is
/// created, normally the system temp dir.
pub fn setup_symlinks(
    executable_path: &Path,
    app_dir: &Path,
    cache_root: &Path,
) -> NodeLayerResult<SetupOutcome> {
    let layer_path = layer_of(executable_path)?;

    let modules = app_dir.join("node_modules");
    let link_path = fs::read_link(&modules)
        .map(|dest| absolutize(&modules, dest))
        .map_err(|e| NodeLayerError::io(format!("reading link {}", modules.display()), e))?;

    if link_path.is_dir() {
        debug!("{} resolves to {}", modules.display(), link_path.display());
        return Ok(SetupOutcome::AlreadyLinked);
    }

    let workspace_links = relink_workspace_members(app_dir, &layer_path)?;

    replace_with_symlink(&layer_path.join("node_modules"), &link_path)?;

    let cache_dir = cache_root.join(NODE_MODULES_CACHE);
    fs::create_dir_all(&cache_dir)
        .map_err(|e| NodeLayerError::io(format!("creating {}", cache_dir.display()), e))?;

    info!(
        "Linked {} into {}",
        modules.display(),
        layer_path.display()
    );
    Ok(SetupOutcome::Relinked { workspace_links })
}

fn layer_of(executable_path: &Path) -> NodeLayerResult<PathBuf> {
    executable_path
        .parent()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| NodeLayerError::PathNotFound(executable_path.to_path_buf()))
}

/// Point each workspace member's build-time link location at its copy in the layer
fn relink_workspace_members(app_dir: &Path, layer_path: &Path) -> NodeLayerResult<usize> {
    let names: Vec<String> = LOCKFILE_NAMES.iter().map(|n| n.to_string()).collect();
    let Some(lockfile_path) = find_lockfile(app_dir, &names) else {
        debug!("No lockfile in {}, no workspace links to relink", app_dir.display());
        return Ok(0);
    };
    let lockfile = Lockfile::from_file(&lockfile_path)?;
    let mut count = 0;

    for (key, entry) in lockfile.links() {
        let Some(resolved) = entry.resolved.as_deref() else {
            continue;
        };
        let member = app_dir.join(resolved);
        let link_path = match fs::read_link(&member) {
            Ok(dest) => absolutize(&member, dest),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidInput) => {
                debug!("{} is not a relocated link, leaving {}", member.display(), key);
                continue;
            }
            Err(e) => {
                return Err(NodeLayerError::io(
                    format!("reading link {}", member.display()),
                    e,
                ))
            }
        };

        replace_with_symlink(&layer_path.join(resolved), &link_path)?;
        count += 1;
    }

    Ok(count)
}
