//! `npm ci`: exact install from the lockfile

use super::{
    install_into_tree, required_lockfile, reuse_decision, BuildProcess, NpmCommand, RunDecision,
    RunRequest,
};
use crate::error::NodeLayerResult;
use crate::exec::Executor;
use crate::layer::LayerMetadata;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub struct CleanInstallProcess {
    npm: NpmCommand,
    executor: Arc<dyn Executor>,
}

impl CleanInstallProcess {
    pub fn new(npm: NpmCommand, executor: Arc<dyn Executor>) -> Self {
        Self { npm, executor }
    }
}

#[async_trait]
impl BuildProcess for CleanInstallProcess {
    fn name(&self) -> &'static str {
        "npm ci"
    }

    fn should_run(
        &self,
        project_dir: &Path,
        tree_dir: &Path,
        metadata: &LayerMetadata,
        config_path: Option<&Path>,
    ) -> NodeLayerResult<RunDecision> {
        let lockfile = required_lockfile(project_dir, &self.npm.lockfiles)?;
        reuse_decision(&lockfile, config_path, tree_dir, metadata)
    }

    async fn run(&self, request: RunRequest<'_>) -> NodeLayerResult<()> {
        let execution = self.npm.install("ci", &request);
        install_into_tree(&self.executor, execution, &request).await
    }
}
