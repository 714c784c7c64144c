//! Registry actor commands, errors, and status snapshots.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RegistryStatus`: Point-in-time view of the registry

use huddle_core::{OccupancyLimit, PresenceChange};
use thiserror::Error;
use tokio::sync::oneshot;

use super::Outbox;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command carries a oneshot channel for the response, except the
/// fire-and-forget ones used by cleanup paths and the reconciliation ticker.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Entry gate for a new connection.
    ///
    /// # Errors
    /// - `CapacityReached` if a limit is set and occupancy is at or above it
    Admit {
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Claim a name and register the participant's outbox under it.
    ///
    /// # Errors
    /// - `DuplicateName` if the name is already present
    /// - `CapacityReached` if the session filled up during negotiation
    Join {
        /// Requested display name
        name: String,
        /// Outbound channel for this participant
        outbox: Outbox,
        respond_to: oneshot::Sender<Result<Joined, RegistryError>>,
    },

    /// Validate and set the session's occupancy limit.
    ///
    /// # Errors
    /// - `InvalidLimit` if the value is below 2
    /// - `LimitBelowOccupancy` if more participants are already present
    SetLimit {
        /// Requested limit as sent by the client
        value: i64,
        respond_to: oneshot::Sender<Result<OccupancyLimit, RegistryError>>,
    },

    /// Remove a participant. Removing an absent name is a no-op.
    Leave {
        name: String,
        /// Notified once the removal has been applied, if present
        respond_to: Option<oneshot::Sender<()>>,
    },

    /// Diff occupancy against the last tick and broadcast any change.
    Reconcile {
        respond_to: Option<oneshot::Sender<Option<PresenceChange>>>,
    },

    /// Read a snapshot of the registry state.
    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },
}

/// Result of a successful [`RegistryCommand::Join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    /// Session limit at the time of joining (None for the first participant)
    pub limit: Option<OccupancyLimit>,
    /// Occupancy including the new participant
    pub count: usize,
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStatus {
    pub count: usize,
    pub observed_count: usize,
    pub limit: Option<OccupancyLimit>,
    pub most_recent_joiner: Option<String>,
    pub most_recent_leaver: Option<String>,
    /// Member names, sorted
    pub members: Vec<String>,
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur when talking to the registry actor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry refused the operation.
    #[error(transparent)]
    Rejected(#[from] huddle_core::RegistryError),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::from(huddle_core::RegistryError::CapacityReached { limit: 2 });
        assert_eq!(err.to_string(), "user limit of 2 has been reached");

        let err = RegistryError::ChannelClosed;
        assert_eq!(err.to_string(), "response channel closed");
    }

    #[tokio::test]
    async fn test_command_channel_closed_error() {
        let (tx, rx) = oneshot::channel::<Result<(), RegistryError>>();

        drop(tx);

        assert!(rx.await.is_err());
    }
}
