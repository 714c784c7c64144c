//! WebSocket server for the huddle daemon.
//!
//! The server:
//! - Listens on a TCP socket and upgrades each connection to a WebSocket
//! - Spawns a ConnectionHandler and an outbox writer per participant
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ PresenceServer  │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept() + WebSocket upgrade
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │ (per participant│     │                 │
//! └───────┬─────────┘     └────────┬────────┘
//!         │ outbox                 │ broadcast into outboxes
//!         ▼                        ▼
//! ┌─────────────────────────────────────────┐
//! │       writer task (per participant)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{spawn_writer, ConnectionError, ConnectionHandler, OUTBOX_BUFFER};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::port::{bind_free_port, PortError};
use crate::registry::RegistryHandle;

/// WebSocket server for presence sessions.
pub struct PresenceServer {
    /// Bound listener
    listener: TcpListener,

    /// Handle to the participant registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for log correlation
    connection_counter: AtomicU64,
}

impl PresenceServer {
    /// Creates a server around an already bound listener.
    pub fn new(
        listener: TcpListener,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            listener,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        }
    }

    /// Binds the first free port at or above `config.port` on `config.host`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if no port could be bound.
    pub async fn bind(
        config: &ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = bind_free_port(&config.host, config.port).await?;
        Ok(Self::new(listener, registry, cancel_token))
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = self.local_addr()?;
        info!(address = %addr, "Presence server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!("Server stopped accepting connections");
        Ok(())
    }

    /// Upgrades a new TCP connection and spawns its handler task.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, connection_number: u64) {
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let websocket = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!(
                        connection = connection_number,
                        peer = %peer,
                        error = %e,
                        "WebSocket upgrade failed"
                    );
                    return;
                }
            };

            debug!(connection = connection_number, peer = %peer, "WebSocket established");

            let (sink, reader) = websocket.split();
            let (outbox, outbox_rx) = mpsc::channel(OUTBOX_BUFFER);
            spawn_writer(sink, outbox_rx, connection_number);

            let handler = ConnectionHandler::new(reader, outbox, registry, connection_number);
            handler.run().await;
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind listener: {0}")]
    Bind(#[from] PortError),

    #[error("Failed to read listener address: {0}")]
    LocalAddr(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind(PortError::Exhausted {
            host: "127.0.0.1".to_string(),
            start: 65000,
        });
        assert!(err.to_string().contains("127.0.0.1"));
        assert!(err.to_string().contains("65000"));

        let err = ServerError::LocalAddr("not bound".to_string());
        assert!(err.to_string().contains("not bound"));
    }
}
