//! reindex CLI: zero-downtime search re-indexing.
//!
//! Rebuilds every configured index into a fresh generation and swaps the
//! public aliases over only when the whole build succeeded.

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
