// CLI entry point for the pairchat relay.
//
// Usage:
//   pairchat-relay [OPTIONS]
//     --port <PORT>                   Listen port (env PORT, default 3000)
//     --bind <ADDR>                   Bind address (env PAIRCHAT_BIND, default 0.0.0.0)
//     --disconnect-notice <MODE>      partner | broadcast
//     --survivor <POLICY>             requeue | drop
//     --json-logs                     JSON log lines
//
// Log verbosity follows RUST_LOG (default `pairchat_relay=info`).
//
// The process runs until killed. SIGINT/SIGTERM end it immediately; the
// relay keeps no state worth flushing.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pairchat_relay::{RelayConfig, start_relay};

fn main() -> anyhow::Result<()> {
    let config = RelayConfig::parse();
    init_tracing(config.json_logs);

    tracing::info!("pairchat relay v{} starting", env!("CARGO_PKG_VERSION"));
    config.log_config();

    let (handle, addr) = start_relay(config).context("failed to start relay")?;
    tracing::info!("accepting clients on {addr}");

    handle.wait();
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pairchat_relay=info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
