//! RemNote bridge command-line interface.

pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};

/// RemNote MCP bridge - relays MCP tool calls to the RemNote plugin
#[derive(Parser)]
#[command(name = "remnote-bridge")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(flatten)]
    pub serve: commands::serve::ServeArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check a running bridge through its MCP endpoint
    StatusCheck(commands::status_check::StatusCheckArgs),

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments. Without a subcommand the bridge is served.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        None => commands::serve::run(cli.serve).await,
        Some(Commands::StatusCheck(args)) => commands::status_check::run(args).await,
        Some(Commands::Version) => {
            println!("remnote-bridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
