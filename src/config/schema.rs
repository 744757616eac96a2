//! Configuration schema for nodelayer
//!
//! Configuration is stored at `~/.config/nodelayer/config.toml`

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// npm invocation settings
    pub npm: NpmConfig,

    /// Storage area names
    pub layers: LayersConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// npm settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NpmConfig {
    /// npm executable name or path
    pub executable: String,

    /// Pass `--unsafe-perm` to install commands
    pub unsafe_perm: bool,

    /// Lockfile names, highest precedence first
    pub lockfiles: Vec<String>,
}

impl Default for NpmConfig {
    fn default() -> Self {
        Self {
            executable: "npm".to_string(),
            unsafe_perm: true,
            lockfiles: crate::lockfile::LOCKFILE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Layer names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayersConfig {
    /// Shared npm cache directory
    pub cache: String,

    /// Full dependency tree used at build time
    pub build: String,

    /// Pruned production tree used at launch
    pub launch: String,
}

impl Default for LayersConfig {
    fn default() -> Self {
        Self {
            cache: "npm-cache".to_string(),
            build: "build-modules".to_string(),
            launch: "launch-modules".to_string(),
        }
    }
}
