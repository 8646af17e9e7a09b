//! CLI entry point for a replicated key-value node.

use clap::Parser;
use cli::{server, CliConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::logging::init();
    let config = CliConfig::parse();
    server::run(config).await
}
