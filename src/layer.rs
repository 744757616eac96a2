//! Storage areas ("layers")
//!
//! Each layer is a directory `<layers>/<name>` plus a sidecar
//! `<layers>/<name>.toml` holding its types and metadata. Environment
//! contributions are written as one file per variable under
//! `env.build/` and `env.launch/`, named `NAME.<op>`.

use crate::error::{NodeLayerError, NodeLayerResult};
use crate::symlink::replace_with_symlink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Allocates layers under a root directory
#[derive(Debug, Clone)]
pub struct Layers {
    root: PathBuf,
}

impl Layers {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get a layer, loading any metadata left by a previous build
    pub async fn get(&self, name: &str) -> NodeLayerResult<Layer> {
        let path = self.root.join(name);
        let toml_path = self.root.join(format!("{name}.toml"));

        let stored = match fs::read_to_string(&toml_path).await {
            Ok(content) => toml::from_str::<LayerToml>(&content).map_err(|e| {
                NodeLayerError::ConfigInvalid {
                    path: toml_path.clone(),
                    reason: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => LayerToml::default(),
            Err(e) => {
                return Err(NodeLayerError::io(
                    format!("reading {}", toml_path.display()),
                    e,
                ))
            }
        };

        fs::create_dir_all(&path)
            .await
            .map_err(|e| NodeLayerError::io(format!("creating layer {}", path.display()), e))?;

        Ok(Layer {
            name: name.to_string(),
            path,
            metadata: stored.metadata,
            build: stored.types.build,
            launch: stored.types.launch,
            cache: stored.types.cache,
            build_env: LayerEnv::default(),
            launch_env: LayerEnv::default(),
            exec_d: Vec::new(),
        })
    }
}

/// Metadata persisted alongside a layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMetadata {
    /// Fingerprint of the inputs the installed tree was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_sha: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
}

impl LayerMetadata {
    /// Metadata describing a successful install
    pub fn installed(sha: impl Into<String>) -> Self {
        Self {
            cache_sha: Some(sha.into()),
            built_at: Some(Utc::now()),
        }
    }

    pub fn cache_sha(&self) -> Option<&str> {
        self.cache_sha.as_deref()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LayerToml {
    #[serde(default)]
    types: LayerTypes,
    #[serde(default)]
    metadata: LayerMetadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LayerTypes {
    #[serde(default)]
    build: bool,
    #[serde(default)]
    launch: bool,
    #[serde(default)]
    cache: bool,
}

/// A host-managed directory holding part of the installed tree
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub path: PathBuf,
    pub metadata: LayerMetadata,
    pub build: bool,
    pub launch: bool,
    pub cache: bool,
    pub build_env: LayerEnv,
    pub launch_env: LayerEnv,
    /// Programs run before the app starts
    pub exec_d: Vec<PathBuf>,
}

impl Layer {
    /// Empty the layer directory and forget previous metadata
    pub async fn reset(mut self) -> NodeLayerResult<Self> {
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(NodeLayerError::io(
                    format!("resetting layer {}", self.path.display()),
                    e,
                ))
            }
        }
        fs::create_dir_all(&self.path).await.map_err(|e| {
            NodeLayerError::io(format!("creating layer {}", self.path.display()), e)
        })?;

        debug!("Reset layer {}", self.name);
        self.metadata = LayerMetadata::default();
        self.build_env = LayerEnv::default();
        self.launch_env = LayerEnv::default();
        self.exec_d.clear();
        Ok(self)
    }

    /// Whether the layer directory holds anything
    pub async fn is_populated(&self) -> NodeLayerResult<bool> {
        dir_has_entries(&self.path).await
    }

    /// Persist types, metadata, environment and exec.d programs
    pub async fn write(&self) -> NodeLayerResult<()> {
        let toml_path = self
            .path
            .parent()
            .map(|root| root.join(format!("{}.toml", self.name)))
            .ok_or_else(|| NodeLayerError::PathNotFound(self.path.clone()))?;

        let stored = LayerToml {
            types: LayerTypes {
                build: self.build,
                launch: self.launch,
                cache: self.cache,
            },
            metadata: self.metadata.clone(),
        };
        fs::write(&toml_path, toml::to_string_pretty(&stored)?)
            .await
            .map_err(|e| NodeLayerError::io(format!("writing {}", toml_path.display()), e))?;

        self.build_env.write_to(&self.path.join("env.build")).await?;
        self.launch_env.write_to(&self.path.join("env.launch")).await?;

        for (index, program) in self.exec_d.iter().enumerate() {
            let name = program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "exec".to_string());
            let link = self.path.join("exec.d").join(format!("{index}-{name}"));
            replace_with_symlink(program, &link)?;
        }

        debug!("Wrote layer {}", self.name);
        Ok(())
    }
}

pub(crate) async fn dir_has_entries(path: &Path) -> NodeLayerResult<bool> {
    match fs::read_dir(path).await {
        Ok(mut entries) => Ok(entries
            .next_entry()
            .await
            .map_err(|e| NodeLayerError::io(format!("reading {}", path.display()), e))?
            .is_some()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(NodeLayerError::io(format!("reading {}", path.display()), e)),
    }
}

/// How a layer modifies a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvOp {
    /// Set unless already set
    Default,
    /// Always set
    Override,
    Append,
    Prepend,
}

impl EnvOp {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Override => "override",
            Self::Append => "append",
            Self::Prepend => "prepend",
        }
    }
}

/// A single environment modification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub name: String,
    pub op: EnvOp,
    pub value: String,
    pub delim: Option<String>,
}

/// Environment contributions of a layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerEnv {
    entries: Vec<EnvEntry>,
}

impl LayerEnv {
    pub fn default_value(&mut self, name: &str, value: impl Into<String>) {
        self.push(name, EnvOp::Default, value.into(), None);
    }

    pub fn override_value(&mut self, name: &str, value: impl Into<String>) {
        self.push(name, EnvOp::Override, value.into(), None);
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>, delim: &str) {
        self.push(name, EnvOp::Append, value.into(), Some(delim.to_string()));
    }

    pub fn prepend(&mut self, name: &str, value: impl Into<String>, delim: &str) {
        self.push(name, EnvOp::Prepend, value.into(), Some(delim.to_string()));
    }

    /// Find the entry for a variable and operation
    pub fn get(&self, name: &str, op: EnvOp) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.name == name && e.op == op)
            .map(|e| e.value.as_str())
    }

    fn push(&mut self, name: &str, op: EnvOp, value: String, delim: Option<String>) {
        self.entries.retain(|e| !(e.name == name && e.op == op));
        self.entries.push(EnvEntry {
            name: name.to_string(),
            op,
            value,
            delim,
        });
    }

    async fn write_to(&self, dir: &Path) -> NodeLayerResult<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(dir)
            .await
            .map_err(|e| NodeLayerError::io(format!("creating {}", dir.display()), e))?;

        for entry in &self.entries {
            let file = dir.join(format!("{}.{}", entry.name, entry.op.suffix()));
            fs::write(&file, &entry.value)
                .await
                .map_err(|e| NodeLayerError::io(format!("writing {}", file.display()), e))?;
            if let Some(delim) = &entry.delim {
                let file = dir.join(format!("{}.delim", entry.name));
                fs::write(&file, delim)
                    .await
                    .map_err(|e| NodeLayerError::io(format!("writing {}", file.display()), e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn get_creates_empty_layer() {
        let root = TempDir::new().unwrap();
        let layer = Layers::new(root.path()).get("build-modules").await.unwrap();

        assert!(layer.path.is_dir());
        assert_eq!(layer.metadata.cache_sha(), None);
        assert!(!layer.is_populated().await.unwrap());
    }

    #[tokio::test]
    async fn write_then_get_roundtrips_metadata() {
        let root = TempDir::new().unwrap();
        let layers = Layers::new(root.path());
        let mut layer = layers.get("build-modules").await.unwrap();
        layer.metadata = LayerMetadata::installed("abc123");
        layer.build = true;
        layer.cache = true;
        layer.write().await.unwrap();

        let reloaded = layers.get("build-modules").await.unwrap();
        assert_eq!(reloaded.metadata.cache_sha(), Some("abc123"));
        assert!(reloaded.metadata.built_at.is_some());
        assert!(reloaded.build && reloaded.cache && !reloaded.launch);
    }

    #[tokio::test]
    async fn reset_clears_contents_and_metadata() {
        let root = TempDir::new().unwrap();
        let mut layer = Layers::new(root.path()).get("l").await.unwrap();
        layer.metadata = LayerMetadata::installed("sha");
        std::fs::write(layer.path.join("stale"), "x").unwrap();

        let layer = layer.reset().await.unwrap();
        assert!(!layer.path.join("stale").exists());
        assert!(layer.path.is_dir());
        assert_eq!(layer.metadata, LayerMetadata::default());
    }

    #[tokio::test]
    async fn env_files_are_written() {
        let root = TempDir::new().unwrap();
        let mut layer = Layers::new(root.path()).get("l").await.unwrap();
        layer.build_env.override_value("NODE_ENV", "development");
        layer.build_env.append("PATH", "/app/node_modules/.bin", ":");
        layer.launch_env.default_value("NPM_CONFIG_LOGLEVEL", "error");
        layer.write().await.unwrap();

        let env_build = layer.path.join("env.build");
        assert_eq!(
            std::fs::read_to_string(env_build.join("NODE_ENV.override")).unwrap(),
            "development"
        );
        assert_eq!(std::fs::read_to_string(env_build.join("PATH.delim")).unwrap(), ":");
        assert!(layer.path.join("env.launch/NPM_CONFIG_LOGLEVEL.default").is_file());
    }

    #[test]
    fn env_push_replaces_same_op() {
        let mut env = LayerEnv::default();
        env.default_value("A", "1");
        env.default_value("A", "2");
        env.override_value("A", "3");
        assert_eq!(env.get("A", EnvOp::Default), Some("2"));
        assert_eq!(env.get("A", EnvOp::Override), Some("3"));
        assert_eq!(env.get("A", EnvOp::Append), None);
    }

    #[tokio::test]
    async fn malformed_layer_toml_errors() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("l.toml"), "[metadata\n").unwrap();
        let result = Layers::new(root.path()).get("l").await;
        assert!(matches!(result, Err(NodeLayerError::ConfigInvalid { .. })));
    }
}
