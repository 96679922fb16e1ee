mod cli;
mod commands;
mod interactive;
mod logging;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose).context("Failed to initialize logging")?;

    let config_path = cli.config.as_deref();

    match &cli.command {
        Commands::Status { server } => {
            commands::Status::execute(&cli.root, config_path, server.as_deref())
                .await
                .context("Failed to execute status command")?;
        }
        Commands::Sync { server, yes } => {
            commands::Synchronize::execute(&cli.root, config_path, server, *yes)
                .await
                .context("Failed to execute sync command")?;
        }
        Commands::Recover { discard } => {
            commands::Recover::execute(&cli.root, *discard)
                .context("Failed to execute recover command")?;
        }
        Commands::Config => {
            commands::Config::execute(&cli.root, config_path)
                .context("Failed to execute config command")?;
        }
    }

    Ok(())
}
