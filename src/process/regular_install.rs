//! `npm install`: resolve from `package.json` when there is no lockfile
//!
//! Without a lockfile the resolved versions can drift between builds, so
//! the tree is never reused. The fingerprint still covers `package.json`
//! and the config so layer metadata describes what was installed.

use super::{install_into_tree, BuildProcess, NpmCommand, RunDecision, RunRequest};
use crate::error::NodeLayerResult;
use crate::exec::Executor;
use crate::fingerprint::fingerprint_files;
use crate::layer::LayerMetadata;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub struct RegularInstallProcess {
    npm: NpmCommand,
    executor: Arc<dyn Executor>,
}

impl RegularInstallProcess {
    pub fn new(npm: NpmCommand, executor: Arc<dyn Executor>) -> Self {
        Self { npm, executor }
    }
}

#[async_trait]
impl BuildProcess for RegularInstallProcess {
    fn name(&self) -> &'static str {
        "npm install"
    }

    fn should_run(
        &self,
        project_dir: &Path,
        _tree_dir: &Path,
        _metadata: &LayerMetadata,
        config_path: Option<&Path>,
    ) -> NodeLayerResult<RunDecision> {
        let fingerprint = fingerprint_files(&project_dir.join("package.json"), config_path)?;
        Ok(RunDecision {
            run: true,
            fingerprint,
        })
    }

    async fn run(&self, request: RunRequest<'_>) -> NodeLayerResult<()> {
        let execution = self.npm.install("install", &request);
        install_into_tree(&self.executor, execution, &request).await
    }
}
