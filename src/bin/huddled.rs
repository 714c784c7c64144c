//! huddle daemon - Presence server
//!
//! Accepts WebSocket connections, negotiates a unique name (and, from the
//! first participant, the session's user limit), and broadcasts join/leave
//! events with live participant counts.
//!
//! # Usage
//!
//! ```bash
//! # Start on the first free port at or above 8081
//! huddled
//!
//! # Custom host/port and a faster presence tick
//! huddled --host 0.0.0.0 --port 9000 --tick-ms 250
//!
//! # Configure through the environment
//! HUDDLE_PORT=9000 huddled
//!
//! # Enable debug logging
//! RUST_LOG=huddled=debug huddled
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use huddled::config::ServerConfig;
use huddled::registry::spawn_registry;
use huddled::server::PresenceServer;

/// huddle daemon - real-time presence server
#[derive(Parser, Debug)]
#[command(name = "huddled", version, about)]
struct Args {
    /// Interface to listen on [env: HUDDLE_HOST] [default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,

    /// First port to try; the next free port is used if taken [env: HUDDLE_PORT] [default: 8081]
    #[arg(short, long)]
    port: Option<u16>,

    /// Milliseconds between presence broadcasts [default: 1000]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServerConfig::from_env().with_overrides(
        args.host,
        args.port,
        args.tick_ms.map(Duration::from_millis),
    );

    run_server(config)
}

/// Runs the server (async entry point).
#[tokio::main]
async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("huddled=info".parse()?)
                .add_directive("huddle_core=info".parse()?)
                .add_directive("huddle_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "huddle daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the participant registry and its reconciliation ticker
    let registry = spawn_registry(config.tick_interval);
    info!(
        tick_ms = config.tick_interval.as_millis() as u64,
        "Participant registry started"
    );

    let server = PresenceServer::bind(&config, registry, cancel_token)
        .await
        .with_context(|| format!("Failed to bind a port on {} from {}", config.host, config.port))?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("huddle daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
