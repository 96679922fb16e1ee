use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mod Synchronization Tool
///
/// Keep a local mod installation in line with the file set a server declares
#[derive(Parser, Debug)]
#[command(name = "modsync")]
#[command(about, long_about = None, version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Installation root (default: current directory)
    #[arg(long, global = true, value_name = "PATH", default_value = ".")]
    pub root: PathBuf,

    /// Use specific config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show sync state and, with --server, what a sync would change
    Status {
        /// Server mirror directory to compare against
        #[arg(long, value_name = "DIR")]
        server: Option<PathBuf>,
    },

    /// Download changes from the server and apply them
    Sync {
        /// Server mirror directory
        #[arg(long, value_name = "DIR")]
        server: PathBuf,

        /// Apply without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Finish or discard an update that did not complete
    Recover {
        /// Throw the unfinished update away instead of finishing it
        #[arg(long)]
        discard: bool,
    },

    /// Show active configuration
    Config,
}
