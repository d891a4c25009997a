#![warn(missing_docs)]
//! fstore filesystem gateway smoke tool

use anyhow::Result;
use clap::Parser;
use fstore_dfs::cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("fstore-dfs starting...");

    Cli::parse().run()
}
