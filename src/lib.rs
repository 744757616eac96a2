//! nodelayer - npm dependency layers for container builds
//!
//! Installs a Node.js project's dependencies into build-time and
//! launch-time layers, reusing previous installs when the lockfile and
//! npm configuration are unchanged and keeping workspace symlinks valid
//! as trees move between directories.

pub mod build;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod exec;
pub mod fingerprint;
pub mod layer;
pub mod lockfile;
pub mod process;
pub mod symlink;
pub mod tree;

pub use error::{NodeLayerError, NodeLayerResult};
