//! testsmith CLI: smart-contract unit-test generation.
//!
//! Two workflows: `query` answers a prompt file against a persisted index
//! of a contracts directory; `pdf` turns a contract PDF into a test file.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
