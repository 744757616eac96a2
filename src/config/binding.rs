//! Service binding lookup for user-supplied configuration files
//!
//! A binding is a directory under `<platform>/bindings` (or
//! `$SERVICE_BINDING_ROOT`) containing a `type` file and one file per
//! entry. An `npmrc` binding carries a `.npmrc` entry.

use crate::environment::{Environment, SERVICE_BINDING_ROOT};
use crate::error::{NodeLayerError, NodeLayerResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve the path of a bound configuration file
///
/// Returns `None` when no binding of `kind` exists or the binding lacks
/// `filename`. More than one binding of the same kind is ambiguous.
pub fn determine_path(
    kind: &str,
    platform_dir: &Path,
    filename: &str,
    env: &Environment,
) -> NodeLayerResult<Option<PathBuf>> {
    let root = match env.lookup(SERVICE_BINDING_ROOT) {
        Some(root) => PathBuf::from(root),
        None => platform_dir.join("bindings"),
    };

    let entries = match fs::read_dir(&root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(NodeLayerError::io(
                format!("reading bindings in {}", root.display()),
                e,
            ))
        }
    };

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| NodeLayerError::io("reading binding entry", e))?;
        let binding = entry.path();
        let binding_type = match fs::read_to_string(binding.join("type")) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(NodeLayerError::io(
                    format!("reading binding type in {}", binding.display()),
                    e,
                ))
            }
        };
        if binding_type.trim().eq_ignore_ascii_case(kind) {
            matches.push(binding);
        }
    }

    match matches.as_slice() {
        [] => Ok(None),
        [binding] => {
            let path = binding.join(filename);
            if path.is_file() {
                debug!("Using {} binding: {}", kind, path.display());
                Ok(Some(path))
            } else {
                Ok(None)
            }
        }
        _ => Err(NodeLayerError::ConfigInvalid {
            path: root,
            reason: format!("found {} bindings of type {}, expected at most 1", matches.len(), kind),
        }),
    }
}
