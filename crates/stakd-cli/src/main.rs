//! Stakd CLI
//!
//! Lists, fetches and watches Stakd CRM collections from the terminal.

#![forbid(unsafe_code)]

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stakd=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "starting");
    commands::run(cli).await
}
