//! Terminalplex CLI: conversational web search with cited answers.
//!
//! Each question is rewritten into a search query, answered from the pages
//! it finds, and streamed back with numbered citations.

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
