//! Diagnostics for the CLI.
//!
//! Events from the `spinflake` library (layout resolution, generator
//! construction, clock regression) and from this binary go to stderr so that
//! stdout carries nothing but ids. Filtering follows `RUST_LOG`, defaulting to
//! `warn`.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
