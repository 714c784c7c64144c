//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor. A successful join hands back a [`Membership`] guard
//! that removes the participant when it is released or dropped.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use huddle_core::{OccupancyLimit, PresenceChange};

use super::commands::{Joined, RegistryCommand, RegistryError, RegistryStatus};
use super::Outbox;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Checks whether a new connection may enter the session.
    ///
    /// # Errors
    ///
    /// - `CapacityReached` if a limit is set and the session is full
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn admit(&self) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Admit { respond_to: tx })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Registers a participant under `name`.
    ///
    /// The returned guard keeps the participant registered until it is
    /// released with [`Membership::leave`] or dropped.
    ///
    /// # Errors
    ///
    /// - `DuplicateName` if the name is already present
    /// - `CapacityReached` if the session is full
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn join(&self, name: String, outbox: Outbox) -> Result<Membership, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Join {
                name: name.clone(),
                outbox,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        let joined = rx.await.map_err(|_| RegistryError::ChannelClosed)??;

        Ok(Membership {
            name,
            joined,
            sender: Some(self.sender.clone()),
        })
    }

    /// Validates and sets the session's user limit.
    ///
    /// # Errors
    ///
    /// - `InvalidLimit` if `value` is below 2
    /// - `LimitBelowOccupancy` if more participants are already present
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn set_limit(&self, value: i64) -> Result<OccupancyLimit, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::SetLimit {
                value,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Runs one reconciliation step and returns the change it broadcast.
    ///
    /// Returns `None` if occupancy is unchanged or the actor is gone.
    pub async fn reconcile(&self) -> Option<PresenceChange> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Reconcile {
                respond_to: Some(tx),
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Returns a snapshot of the registry state.
    ///
    /// Returns `None` if communication with the actor fails.
    pub async fn status(&self) -> Option<RegistryStatus> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::GetStatus { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

// ============================================================================
// Membership
// ============================================================================

/// A registered participant.
///
/// Dropping the guard removes the participant from the registry, so cleanup
/// runs on every exit path of a connection task, including cancellation.
#[derive(Debug)]
pub struct Membership {
    name: String,
    joined: Joined,
    sender: Option<mpsc::Sender<RegistryCommand>>,
}

impl Membership {
    /// The participant's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The session limit at the time of joining.
    pub fn limit(&self) -> Option<OccupancyLimit> {
        self.joined.limit
    }

    /// Occupancy right after this participant joined.
    pub fn count_at_join(&self) -> usize {
        self.joined.count
    }

    /// Removes the participant and waits until the registry has applied it.
    pub async fn leave(mut self) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        let (tx, rx) = oneshot::channel();
        let cmd = RegistryCommand::Leave {
            name: std::mem::take(&mut self.name),
            respond_to: Some(tx),
        };

        if sender.send(cmd).await.is_ok() {
            let _ = rx.await;
        }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        let cmd = RegistryCommand::Leave {
            name: std::mem::take(&mut self.name),
            respond_to: None,
        };

        match sender.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                // Queue is busy: finish the removal from a task
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(async move {
                        let _ = sender.send(cmd).await;
                    });
                }
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Registry closed before participant removal");
            }
        }
    }
}
