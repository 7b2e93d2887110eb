//! relay-probe sidecar
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!   relay client  │                 relay-probe                   │
//!  ───────────────┼─▶ relay listener ─▶ interceptor ─┬─▶ forwarder ┼──▶ downstream
//!                 │                                  │             │
//!                 │                     probe echo ◀─┘             │
//!                 │                         │                      │
//!                 │                 correlation table              │
//!                 │                         ▲                      │
//!   relay channel │                         │                      │
//!  ◀──────────────┼── probe emitter ◀── health cycle driver ──▶ status file
//!                 │                                                │
//!                 │   management listener: /metrics /livez         │
//!                 │                        /healthz /status        │
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use relay_probe::config::{self, SidecarConfig};
use relay_probe::lifecycle::{signals, Shutdown, Sidecar};
use relay_probe::observability::logging;

#[derive(Parser)]
#[command(name = "relay-probe")]
#[command(about = "Health-checking relay sidecar", long_about = None)]
struct Cli {
    /// TOML config file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => config::parse_config_file(path)?,
        None => SidecarConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relay-probe starting");

    let config = config::finalize(config, |name| std::env::var(name).ok())?;

    tracing::info!(
        relay_address = %config.relay.bind_address,
        management_address = %config.management.bind_address,
        downstream = %config.downstream.url,
        channel = %config.probe.channel_url,
        interval_secs = config.probe.interval_secs,
        timeout_secs = config.probe.timeout_secs,
        "Configuration loaded"
    );
    if config.probe.enabled && config.probe.timeout_secs > config.probe.interval_secs {
        tracing::warn!(
            timeout_secs = config.probe.timeout_secs,
            interval_secs = config.probe.interval_secs,
            "Probe timeout exceeds the health check interval"
        );
    }

    let relay_listener = TcpListener::bind(&config.relay.bind_address).await?;
    let management_listener = TcpListener::bind(&config.management.bind_address).await?;

    let sidecar = Sidecar::build(config)?;
    let shutdown = Shutdown::new();
    let handle = sidecar.spawn(relay_listener, management_listener, &shutdown);

    let signal = signals::wait_for_termination().await;
    tracing::info!(signal = %signal, "Received termination signal, shutting down");
    shutdown.trigger();
    handle.wait().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
