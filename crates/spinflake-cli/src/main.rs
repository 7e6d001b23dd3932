#![doc = include_str!("../README.md")]

mod commands;
mod config;
mod telemetry;

use clap::Parser;
use config::{CliArgs, CliConfig};
use telemetry::init_tracing;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    init_tracing()?;

    // Keep library code that consults the process-wide layout in agreement
    // with the flags.
    if let Err(existing) = config.layout.install() {
        tracing::warn!(?existing, "process-wide layout was already resolved");
    }

    if cfg!(debug_assertions) {
        tracing::debug!("running with config: {:#?}", config);
    }

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    commands::run(&config, &mut out)
}
