//! ContentKit CLI: inspect the merged article collection.
//!
//! Loads the static registry and the optional libSQL store, then lists,
//! shows and relates articles or prints capability-filtered fragments.

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
