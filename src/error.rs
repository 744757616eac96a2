//! Error types for nodelayer
//!
//! All modules use `NodeLayerResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nodelayer operations
pub type NodeLayerResult<T> = Result<T, NodeLayerError>;

/// All errors that can occur in nodelayer
#[derive(Error, Debug)]
pub enum NodeLayerError {
    // Input errors
    #[error("Lockfile not found: {0}")]
    LockfileNotFound(PathBuf),

    #[error("Malformed lockfile {path}: {reason}")]
    LockfileMalformed { path: PathBuf, reason: String },

    #[error("Unsupported project layout at {0}: no package.json or lockfile found")]
    UnsupportedProject(PathBuf),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid value for {name}: {value:?}")]
    EnvInvalid { name: String, value: String },

    #[error("Invalid npm version requirement {version:?}: {reason}")]
    NpmVersionInvalid { version: String, reason: String },

    // Filesystem errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Cannot create link at {path}: path is occupied by a regular file or directory")]
    LinkCollision { path: PathBuf },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command exited with code {code}: {command}\n{output}")]
    CommandExecution {
        command: String,
        code: i32,
        output: String,
    },

    #[error("{phase} failed: {source}")]
    Phase {
        phase: String,
        #[source]
        source: Box<NodeLayerError>,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl NodeLayerError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Tag an error with the phase it occurred in
    pub fn in_phase(self, phase: impl Into<String>) -> Self {
        Self::Phase {
            phase: phase.into(),
            source: Box::new(self),
        }
    }

    /// Strip phase wrappers and return the underlying error
    pub fn root(&self) -> &Self {
        match self {
            Self::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::LockfileMalformed { .. } => {
                Some("Regenerate the lockfile with: npm install --package-lock-only")
            }
            Self::UnsupportedProject(_) => {
                Some("Set BP_NODE_PROJECT_PATH to the directory containing package.json")
            }
            Self::LinkCollision { .. } => {
                Some("Remove the conflicting path or declare the workspace member in package.json")
            }
            Self::NpmVersionInvalid { .. } => Some("Use a semver version such as 10.2.4 or ^10"),
            _ => None,
        }
    }
}

/// Attach a phase label to the error side of a result
pub trait PhaseExt<T> {
    fn phase(self, phase: &str) -> NodeLayerResult<T>;
}

impl<T> PhaseExt<T> for NodeLayerResult<T> {
    fn phase(self, phase: &str) -> NodeLayerResult<T> {
        self.map_err(|e| e.in_phase(phase))
    }
}
