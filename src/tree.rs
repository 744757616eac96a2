//! Copying installed trees between storage areas

use crate::error::{NodeLayerError, NodeLayerResult};
use crate::symlink::remove_path;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Copy `src` to `dst`, replacing anything already at `dst`
///
/// Symlinks are copied as symlinks with their destination unchanged, so
/// workspace links still need relinking afterwards.
pub fn copy_tree(src: &Path, dst: &Path) -> NodeLayerResult<()> {
    remove_path(dst)?;
    copy_entries(src, dst, false)?;
    debug!("Copied {} to {}", src.display(), dst.display());
    Ok(())
}

/// Copy `src` into `dst`, keeping everything already at `dst`
///
/// Entries present on both sides are left as they are in `dst`. Returns
/// the number of files and links added.
pub fn merge_tree(src: &Path, dst: &Path) -> NodeLayerResult<usize> {
    let added = copy_entries(src, dst, true)?;
    debug!("Merged {} new entries from {} into {}", added, src.display(), dst.display());
    Ok(added)
}

fn copy_entries(src: &Path, dst: &Path, keep_existing: bool) -> NodeLayerResult<usize> {
    let mut added = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            NodeLayerError::io(
                format!("walking {}", path.display()),
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| NodeLayerError::PathNotFound(entry.path().to_path_buf()))?;
        let dest = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dest)
                .map_err(|e| NodeLayerError::io(format!("creating {}", dest.display()), e))?;
            continue;
        }
        if keep_existing && fs::symlink_metadata(&dest).is_ok() {
            continue;
        }

        if file_type.is_symlink() {
            let target = fs::read_link(entry.path()).map_err(|e| {
                NodeLayerError::io(format!("reading link {}", entry.path().display()), e)
            })?;
            copy_link(&target, &dest)?;
        } else {
            fs::copy(entry.path(), &dest).map_err(|e| {
                NodeLayerError::io(
                    format!("copying {} to {}", entry.path().display(), dest.display()),
                    e,
                )
            })?;
        }
        added += 1;
    }
    Ok(added)
}

#[cfg(unix)]
fn copy_link(target: &Path, dest: &Path) -> NodeLayerResult<()> {
    std::os::unix::fs::symlink(target, dest)
        .map_err(|e| NodeLayerError::io(format!("linking {}", dest.display()), e))
}

#[cfg(windows)]
fn copy_link(target: &Path, dest: &Path) -> NodeLayerResult<()> {
    std::os::windows::fs::symlink_dir(target, dest)
        .map_err(|e| NodeLayerError::io(format!("linking {}", dest.display()), e))
}
