//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// nodelayer - npm dependency layers for container builds
///
/// Installs node_modules into reusable build and launch layers, skipping
/// the install when the lockfile and npm config are unchanged.
#[derive(Parser, Debug)]
#[command(name = "nodelayer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NODELAYER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install dependencies into build and/or launch layers
    Build(BuildArgs),

    /// Report the install strategy and which layers would be reused
    Check(CheckArgs),

    /// Show where workspace links would point after relocation
    Links(LinksArgs),

    /// Repair node_modules links at launch (exec.d helper)
    SetupSymlinks(SetupSymlinksArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Application working directory (defaults to current directory)
    #[arg(short, long)]
    pub working_dir: Option<PathBuf>,

    /// Directory holding the layers
    #[arg(short, long, env = "CNB_LAYERS_DIR")]
    pub layers: PathBuf,

    /// Platform directory (bindings live under <platform>/bindings)
    #[arg(short, long, env = "CNB_PLATFORM_DIR", default_value = "/platform")]
    pub platform: PathBuf,

    /// Produce the build-time tree
    #[arg(long)]
    pub build: bool,

    /// Produce the launch-time tree
    #[arg(long)]
    pub launch: bool,

    /// Program linked into the launch layer's exec.d
    #[arg(long)]
    pub setup_symlinks: Option<PathBuf>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Application working directory (defaults to current directory)
    #[arg(short, long)]
    pub working_dir: Option<PathBuf>,

    /// Directory holding the layers
    #[arg(short, long, env = "CNB_LAYERS_DIR")]
    pub layers: Option<PathBuf>,

    /// Platform directory (bindings live under <platform>/bindings)
    #[arg(short, long, env = "CNB_PLATFORM_DIR", default_value = "/platform")]
    pub platform: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the links command
#[derive(Parser, Debug)]
pub struct LinksArgs {
    /// Lockfile to read (defaults to the project's lockfile)
    #[arg(long)]
    pub lockfile: Option<PathBuf>,

    /// Layer directory the links would be placed in (defaults to the project)
    #[arg(long)]
    pub layer: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the setup-symlinks command
#[derive(Parser, Debug)]
pub struct SetupSymlinksArgs {
    /// Path of the helper inside the launch layer (usually argv[0])
    pub executable: PathBuf,

    /// Application directory
    #[arg(long, env = "NODELAYER_APP_DIR", default_value = "/workspace")]
    pub app_dir: PathBuf,

    /// Directory for the shared node_modules cache
    #[arg(long, env = "TMPDIR", default_value = "/tmp")]
    pub tmp_dir: PathBuf,
}

/// Output format for reporting commands
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
