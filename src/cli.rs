use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppKind;

/// Top-level CLI entry point for the user application manager.
#[derive(Parser, Debug)]
#[command(
    name = "userapps",
    about = "Keep declared repositories, files, and release archives up to date",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Application registry (TOML); defaults to $USERAPPS_CONFIG or ~/.config/userapps/apps.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Update state file; defaults to $USERAPPS_STATE or ~/.local/state/userapps/update-data.json
    #[arg(long, global = true, value_name = "PATH")]
    pub state: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch or update the selected applications
    Manage(ManageOpts),
    /// List configured application ids
    Ids,
    /// Print a shell completion script
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
    /// Print version information
    Version,
}

/// Options for the `manage` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct ManageOpts {
    /// Only process this application id (repeatable)
    #[arg(short = 'i', long = "id", value_name = "ID")]
    pub ids: Vec<String>,

    /// Only process applications of this type (repeatable; ignored with --id)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub types: Vec<AppKind>,

    /// Fetch even when not due or already up to date
    #[arg(short, long)]
    pub force_update: bool,
}
