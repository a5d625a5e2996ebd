//! # Fuel Link
//!
//! Entry point: picks a node role from the command line and runs its shell.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use fuellink::cli::{Cli, Cmd};
use fuellink::config::Config;
use fuellink::node;

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics to stderr; the ground shell owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    info!("fuellink v{} starting", env!("CARGO_PKG_VERSION"));

    match &cli.cmd {
        Cmd::Controller(opts) => node::controller::run(opts, &config).await,
        Cmd::Air(opts) => node::air::run(opts, &config).await,
        Cmd::Ground(opts) => node::ground::run(opts, &config).await,
    }
}
