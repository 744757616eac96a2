//! Build-time environment lookup
//!
//! An explicit snapshot of environment variables. The orchestrator reads
//! toggles from here instead of the live process environment, so tests can
//! construct one from literal pairs.

use crate::error::{NodeLayerError, NodeLayerResult};
use std::collections::HashMap;

/// Install a specific npm version before installing dependencies
pub const NPM_VERSION: &str = "BP_NPM_VERSION";
/// Project directory relative to the working directory
pub const NODE_PROJECT_PATH: &str = "BP_NODE_PROJECT_PATH";
/// Keep `node_modules/.cache` inside the launch layer
pub const KEEP_NODE_BUILD_CACHE: &str = "BP_KEEP_NODE_BUILD_CACHE";
/// Root directory for service bindings
pub const SERVICE_BINDING_ROOT: &str = "SERVICE_BINDING_ROOT";

/// Snapshot of environment variables
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build an environment from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a variable
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Look up a boolean toggle; unset means false
    pub fn lookup_bool(&self, name: &str) -> NodeLayerResult<bool> {
        match self.lookup(name) {
            None => Ok(false),
            Some(value) => parse_bool(value).ok_or_else(|| NodeLayerError::EnvInvalid {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
