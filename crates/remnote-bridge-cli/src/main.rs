//! RemNote bridge CLI entry point.

use clap::Parser;
use remnote_bridge_cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging is installed per command, once configuration is known.
    let cli = Cli::parse();

    run(cli).await
}
