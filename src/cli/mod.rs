//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};

use crate::error::{NodeLayerError, NodeLayerResult};
use std::path::PathBuf;

/// An explicit directory, or the current one
pub(crate) fn dir_or_current(dir: Option<PathBuf>) -> NodeLayerResult<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir()
            .map_err(|e| NodeLayerError::io("getting current directory", e)),
    }
}
