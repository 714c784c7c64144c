//! Connection handler for individual participant connections.
//!
//! Each WebSocket connection gets its own `ConnectionHandler` that walks the
//! session handshake:
//!
//! ```text
//! entry gate ──▶ AWAITING_NAME ──▶ AWAITING_LIMIT ──▶ ACTIVE ──▶ CLOSED
//!     │              (retry)      (first participant,            ▲
//!     │                             retry)                       │
//!     └──────────────── session full ────────────────────────────┘
//! ```
//!
//! Outbound payloads never go to the socket directly. They are queued on the
//! participant's outbox, which a writer task drains into the WebSocket sink;
//! the registry broadcasts into the same outbox, so ordering per participant
//! is preserved.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use huddle_core::RegistryError as DomainError;
use huddle_protocol::{parse_ulimit, parse_uname, ServerMessage};

use crate::registry::{Membership, Outbox, RegistryError, RegistryHandle};

/// Per-participant outbox capacity
pub const OUTBOX_BUFFER: usize = 64;

/// Connection handler for a single participant.
pub struct ConnectionHandler<R> {
    /// Inbound half of the WebSocket
    reader: R,

    /// Queue drained by this connection's writer task
    outbox: Outbox,

    /// Handle to the participant registry
    registry: RegistryHandle,

    /// Sequence number of this connection, for logging
    connection_number: u64,
}

impl<R> ConnectionHandler<R>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Inbound half of the WebSocket
    /// * `outbox` - Sender side of this connection's outbox
    /// * `registry` - Handle to the participant registry
    /// * `connection_number` - Unique number for this connection
    pub fn new(reader: R, outbox: Outbox, registry: RegistryHandle, connection_number: u64) -> Self {
        Self {
            reader,
            outbox,
            registry,
            connection_number,
        }
    }

    /// Runs the connection through the handshake and active phase.
    ///
    /// Returns the participant's name if it was registered. By the time this
    /// returns the participant has been removed from the registry.
    pub async fn run(mut self) -> Option<String> {
        debug!(connection = self.connection_number, "New connection");

        if let Err(e) = self.registry.admit().await {
            info!(
                connection = self.connection_number,
                error = %e,
                "Connection refused at entry gate"
            );
            if matches!(e, RegistryError::Rejected(DomainError::CapacityReached { .. })) {
                let _ = self.send(ServerMessage::limit_reached()).await;
            }
            return None;
        }

        let membership = match self.negotiate_name().await {
            Ok(membership) => membership,
            Err(e) => {
                debug!(
                    connection = self.connection_number,
                    error = %e,
                    "Name negotiation ended"
                );
                return None;
            }
        };

        let name = membership.name().to_string();
        info!(
            connection = self.connection_number,
            participant = %name,
            count = membership.count_at_join(),
            "Participant joined"
        );

        if membership.limit().is_none() {
            if let Err(e) = self.negotiate_limit().await {
                debug!(
                    participant = %name,
                    error = %e,
                    "Limit negotiation ended"
                );
                membership.leave().await;
                return Some(name);
            }
        }

        self.wait_closed().await;
        info!(participant = %name, "Participant disconnected");

        membership.leave().await;
        Some(name)
    }

    /// Prompts for a name until a free one is claimed.
    async fn negotiate_name(&mut self) -> Result<Membership, ConnectionError> {
        loop {
            self.send(ServerMessage::uname_request()).await?;
            let text = self.next_text().await?;

            let name = match parse_uname(&text) {
                Ok(name) => name,
                Err(e) => {
                    debug!(connection = self.connection_number, error = %e, "Malformed name reply");
                    self.send(ServerMessage::error(format!("invalid uname reply: {e}")))
                        .await?;
                    continue;
                }
            };

            match self.registry.join(name, self.outbox.clone()).await {
                Ok(membership) => return Ok(membership),
                Err(RegistryError::Rejected(DomainError::DuplicateName { name })) => {
                    debug!(
                        connection = self.connection_number,
                        participant = %name,
                        "Requested name already in use"
                    );
                    self.send(ServerMessage::name_taken()).await?;
                }
                Err(e @ RegistryError::Rejected(DomainError::CapacityReached { .. })) => {
                    self.send(ServerMessage::limit_reached()).await?;
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Prompts the first participant for the session limit until a valid one is set.
    async fn negotiate_limit(&mut self) -> Result<(), ConnectionError> {
        loop {
            self.send(ServerMessage::ulimit_request()).await?;
            let text = self.next_text().await?;

            let value = match parse_ulimit(&text) {
                Ok(value) => value,
                Err(e) => {
                    debug!(connection = self.connection_number, error = %e, "Malformed limit reply");
                    self.send(ServerMessage::invalid_limit()).await?;
                    continue;
                }
            };

            match self.registry.set_limit(value).await {
                Ok(limit) => {
                    debug!(connection = self.connection_number, limit = limit.get(), "Limit accepted");
                    return Ok(());
                }
                Err(RegistryError::Rejected(DomainError::InvalidLimit { .. })) => {
                    self.send(ServerMessage::invalid_limit()).await?;
                }
                Err(RegistryError::Rejected(DomainError::LimitBelowOccupancy { count, .. })) => {
                    self.send(ServerMessage::error(format!(
                        "ulimit must be at least the current user count ({count})"
                    )))
                    .await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Discards inbound frames until the peer goes away.
    async fn wait_closed(&mut self) {
        loop {
            match self.next_text().await {
                Ok(text) => {
                    debug!(
                        connection = self.connection_number,
                        bytes = text.len(),
                        "Ignoring payload outside handshake"
                    );
                }
                Err(e) => {
                    debug!(connection = self.connection_number, reason = %e, "Channel closed");
                    return;
                }
            }
        }
    }

    /// Reads the next text payload, skipping control frames.
    ///
    /// Binary frames are read as (lossy) UTF-8 so a client that sends JSON
    /// in a binary frame is still understood.
    async fn next_text(&mut self) -> Result<String, ConnectionError> {
        loop {
            match self.reader.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(String::from_utf8_lossy(&bytes).into_owned());
                }
                Some(Ok(Message::Close(_))) | None => return Err(ConnectionError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ConnectionError::Transport(e.to_string())),
            }
        }
    }

    /// Queues a message for this participant.
    async fn send(&self, msg: ServerMessage) -> Result<(), ConnectionError> {
        self.outbox
            .send(msg)
            .await
            .map_err(|_| ConnectionError::Closed)
    }
}

/// Spawns the task that drains a participant's outbox into the WebSocket.
///
/// The task ends once every outbox sender is gone (the handler has returned
/// and the registry has dropped the participant) or the socket fails, and
/// closes the socket on the way out.
pub fn spawn_writer<W>(
    mut sink: W,
    mut outbox: mpsc::Receiver<ServerMessage>,
    connection_number: u64,
) -> JoinHandle<()>
where
    W: Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = outbox.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!(connection = connection_number, error = %e, "Failed to serialize message");
                    continue;
                }
            };

            if let Err(e) = sink.send(Message::text(json)).await {
                debug!(
                    connection = connection_number,
                    error = %e,
                    "Failed to write to participant"
                );
                return;
            }
        }

        if let Err(e) = sink.close().await {
            debug!(connection = connection_number, error = %e, "Close handshake failed");
        }
    })
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
