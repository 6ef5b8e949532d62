//! classement CLI: sync league standings and fixtures into the document store.
//!
//! Reads paginated federation endpoints, normalizes the rows, and writes
//! them to an allow-listed project.

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
