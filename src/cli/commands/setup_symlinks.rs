//! Setup-symlinks command - launch-time node_modules repair

use crate::cli::args::SetupSymlinksArgs;
use crate::error::NodeLayerResult;
use crate::symlink::launch::{setup_symlinks, SetupOutcome};
use tracing::info;

/// Execute the setup-symlinks command
pub async fn execute(args: SetupSymlinksArgs) -> NodeLayerResult<()> {
    match setup_symlinks(&args.executable, &args.app_dir, &args.tmp_dir)? {
        SetupOutcome::AlreadyLinked => info!("node_modules already linked"),
        SetupOutcome::Relinked { workspace_links } => {
            info!("Relinked node_modules and {} workspace links", workspace_links)
        }
    }
    Ok(())
}
