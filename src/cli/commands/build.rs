//! Build command - install dependencies into layers

use crate::build::{Build, BuildContext};
use crate::cli::args::BuildArgs;
use crate::cli::dir_or_current;
use crate::config::Config;
use crate::environment::Environment;
use crate::error::NodeLayerResult;
use crate::exec::ProcessExecutor;
use crate::layer::Layers;
use console::style;
use std::sync::Arc;
use tracing::debug;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> NodeLayerResult<()> {
    let working_dir = dir_or_current(args.working_dir)?;

    // Neither flag given: produce both trees
    let (build, launch) = match (args.build, args.launch) {
        (false, false) => (true, true),
        flags => flags,
    };

    let ctx = BuildContext {
        working_dir,
        platform_dir: args.platform,
        build,
        launch,
        setup_symlinks: args.setup_symlinks,
        temp_dir: std::env::temp_dir(),
    };
    debug!("Build context: {:?}", ctx);

    let orchestrator = Build::new(
        config.clone(),
        Environment::from_process(),
        Arc::new(ProcessExecutor::new()),
        Layers::new(&args.layers),
    );

    let result = orchestrator.run(&ctx).await?;
    result.write().await?;

    for layer in &result.layers {
        let action = if result.executed.contains(&layer.name) {
            style("installed").green()
        } else if layer.cache && !layer.build && !layer.launch {
            style("cached").dim()
        } else {
            style("reused").cyan()
        };
        println!("{:<20} {}", layer.name, action);
    }

    Ok(())
}
