//! Registry actor - owns the participant registry and processes commands.
//!
//! The RegistryActor is the single owner of presence state in the system.
//! Every registry operation runs inside its command loop, so operations are
//! serialized without a lock and never span network I/O.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Outbox send failures are logged but don't panic

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use huddle_core::{OccupancyLimit, PresenceChange, Registry, RegistryError as DomainError};
use huddle_protocol::ServerMessage;

use super::commands::{Joined, RegistryCommand, RegistryStatus};
use super::Outbox;

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all presence state.
///
/// Implements the actor pattern: receives commands via mpsc channel and
/// processes them sequentially. Broadcasts are pushed straight into each
/// participant's outbox with `try_send`, so a slow or dead participant
/// never stalls the actor or the other recipients.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Participants keyed by name, each holding its outbox
    registry: Registry<Outbox>,
}

impl RegistryActor {
    /// Creates a new registry actor with an empty registry.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            registry: Registry::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            participants = self.registry.count(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Admit { respond_to } => {
                let result = self.handle_admit().map_err(Into::into);
                // Ignore send error - caller may have gone away
                let _ = respond_to.send(result);
            }
            RegistryCommand::Join {
                name,
                outbox,
                respond_to,
            } => {
                let result = self.handle_join(name, outbox).map_err(Into::into);
                let _ = respond_to.send(result);
            }
            RegistryCommand::SetLimit { value, respond_to } => {
                let result = self.handle_set_limit(value).map_err(Into::into);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Leave { name, respond_to } => {
                self.handle_leave(&name);
                if let Some(tx) = respond_to {
                    let _ = tx.send(());
                }
            }
            RegistryCommand::Reconcile { respond_to } => {
                let change = self.handle_reconcile();
                if let Some(tx) = respond_to {
                    let _ = tx.send(change);
                }
            }
            RegistryCommand::GetStatus { respond_to } => {
                let _ = respond_to.send(self.status());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Rejects new connections once the session is full.
    fn handle_admit(&self) -> Result<(), DomainError> {
        match self.registry.limit() {
            Some(limit) if self.registry.is_full() => {
                info!(
                    limit = limit.get(),
                    current = self.registry.count(),
                    "Session is full, rejecting connection"
                );
                Err(DomainError::CapacityReached { limit: limit.get() })
            }
            _ => Ok(()),
        }
    }

    /// Registers a participant under a free name.
    ///
    /// The presence check and the insert happen in the same actor turn.
    fn handle_join(&mut self, name: String, outbox: Outbox) -> Result<Joined, DomainError> {
        if let Some(limit) = self.registry.limit() {
            if self.registry.is_full() {
                info!(
                    participant = %name,
                    limit = limit.get(),
                    "Session filled up during name negotiation"
                );
                return Err(DomainError::CapacityReached { limit: limit.get() });
            }
        }

        if self.registry.has(&name) {
            debug!(participant = %name, "Name already in use");
            return Err(DomainError::DuplicateName { name });
        }

        self.registry.add(&name, outbox, false)?;

        let count = self.registry.count();
        info!(
            participant = %name,
            total_participants = count,
            "Participant registered"
        );

        Ok(Joined {
            limit: self.registry.limit(),
            count,
        })
    }

    /// Validates and applies the session's occupancy limit.
    fn handle_set_limit(&mut self, value: i64) -> Result<OccupancyLimit, DomainError> {
        let limit = OccupancyLimit::new(value)?;

        let count = self.registry.count();
        if limit.get() < count {
            return Err(DomainError::LimitBelowOccupancy {
                limit: limit.get(),
                count,
            });
        }

        if let Some(previous) = self.registry.limit() {
            warn!(
                previous = previous.get(),
                limit = limit.get(),
                "Overwriting user limit"
            );
        }

        self.registry.set_limit(limit);
        info!(limit = limit.get(), "User limit set");

        Ok(limit)
    }

    /// Removes a participant if present.
    fn handle_leave(&mut self, name: &str) {
        match self.registry.remove(name, false) {
            Ok(Some(member)) => {
                let stayed = Utc::now().signed_duration_since(member.joined_at);
                info!(
                    participant = %name,
                    stayed_secs = stayed.num_seconds(),
                    remaining_participants = self.registry.count(),
                    "Participant removed"
                );
            }
            Ok(None) => {
                debug!(participant = %name, "Participant already removed");
            }
            Err(e) => {
                warn!(participant = %name, error = %e, "Failed to remove participant");
            }
        }
    }

    /// Diffs occupancy and broadcasts the change to every participant.
    fn handle_reconcile(&mut self) -> Option<PresenceChange> {
        let change = self.registry.reconcile()?;
        let message = ServerMessage::from(change.clone());

        let mut delivered = 0usize;
        for (name, outbox) in self.registry.handles() {
            match outbox.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(participant = %name, "Outbox full, dropping presence event");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(participant = %name, "Outbox closed, participant is leaving");
                }
            }
        }

        info!(
            change = %change,
            recipients = delivered,
            "Presence change broadcast"
        );

        Some(change)
    }

    fn status(&self) -> RegistryStatus {
        let mut members: Vec<String> = self
            .registry
            .handles()
            .map(|(name, _)| name.to_string())
            .collect();
        members.sort();

        RegistryStatus {
            count: self.registry.count(),
            observed_count: self.registry.observed_count(),
            limit: self.registry.limit(),
            most_recent_joiner: self.registry.most_recent_joiner().map(str::to_string),
            most_recent_leaver: self.registry.most_recent_leaver().map(str::to_string),
            members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryError;
    use tokio::sync::oneshot;

    fn create_actor() -> RegistryActor {
        let (_cmd_tx, cmd_rx) = mpsc::channel(16);
        RegistryActor::new(cmd_rx)
    }

    fn outbox() -> (Outbox, mpsc::Receiver<ServerMessage>) {
        mpsc::channel(8)
    }

    fn join(actor: &mut RegistryActor, name: &str, outbox: Outbox) -> Result<Joined, RegistryError> {
        let (tx, mut rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Join {
            name: name.to_string(),
            outbox,
            respond_to: tx,
        });
        rx.try_recv().unwrap()
    }

    fn set_limit(actor: &mut RegistryActor, value: i64) -> Result<OccupancyLimit, RegistryError> {
        let (tx, mut rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::SetLimit {
            value,
            respond_to: tx,
        });
        rx.try_recv().unwrap()
    }

    fn admit(actor: &mut RegistryActor) -> Result<(), RegistryError> {
        let (tx, mut rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Admit { respond_to: tx });
        rx.try_recv().unwrap()
    }

    #[tokio::test]
    async fn test_join_reports_unset_limit() {
        let mut actor = create_actor();
        let (tx, _rx) = outbox();

        let joined = join(&mut actor, "alice", tx).unwrap();

        assert_eq!(joined.count, 1);
        assert!(joined.limit.is_none());
        assert_eq!(actor.status().members, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn test_join_duplicate_rejected() {
        let mut actor = create_actor();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();

        join(&mut actor, "alice", tx1).unwrap();
        let result = join(&mut actor, "alice", tx2);

        assert!(matches!(
            result,
            Err(RegistryError::Rejected(DomainError::DuplicateName { .. }))
        ));
        assert_eq!(actor.status().count, 1);
    }

    #[tokio::test]
    async fn test_admit_gate() {
        let mut actor = create_actor();
        assert!(admit(&mut actor).is_ok());

        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();
        join(&mut actor, "alice", tx1).unwrap();
        set_limit(&mut actor, 2).unwrap();
        assert!(admit(&mut actor).is_ok());

        join(&mut actor, "bob", tx2).unwrap();
        assert_eq!(
            admit(&mut actor),
            Err(RegistryError::Rejected(DomainError::CapacityReached { limit: 2 }))
        );
    }

    #[tokio::test]
    async fn test_join_rejected_when_full() {
        let mut actor = create_actor();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();
        let (tx3, _rx3) = outbox();

        join(&mut actor, "alice", tx1).unwrap();
        set_limit(&mut actor, 2).unwrap();
        join(&mut actor, "bob", tx2).unwrap();

        let result = join(&mut actor, "carol", tx3);
        assert_eq!(
            result,
            Err(RegistryError::Rejected(DomainError::CapacityReached { limit: 2 }))
        );
        assert_eq!(actor.status().count, 2);
    }

    #[tokio::test]
    async fn test_set_limit_validation() {
        let mut actor = create_actor();

        assert!(matches!(
            set_limit(&mut actor, 1),
            Err(RegistryError::Rejected(DomainError::InvalidLimit { value: 1, .. }))
        ));
        assert!(actor.status().limit.is_none());

        let mut receivers = Vec::new();
        for name in ["alice", "bob", "carol"] {
            let (tx, rx) = outbox();
            receivers.push(rx);
            join(&mut actor, name, tx).unwrap();
        }
        assert_eq!(
            set_limit(&mut actor, 2),
            Err(RegistryError::Rejected(DomainError::LimitBelowOccupancy {
                limit: 2,
                count: 3
            }))
        );

        let limit = set_limit(&mut actor, 3).unwrap();
        assert_eq!(limit.get(), 3);
        assert_eq!(actor.status().limit, Some(limit));
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let mut actor = create_actor();
        let (tx, _rx) = outbox();
        join(&mut actor, "alice", tx).unwrap();

        let (done_tx, mut done_rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Leave {
            name: "alice".to_string(),
            respond_to: Some(done_tx),
        });
        assert!(done_rx.try_recv().is_ok());

        actor.handle_command(RegistryCommand::Leave {
            name: "alice".to_string(),
            respond_to: None,
        });

        let status = actor.status();
        assert_eq!(status.count, 0);
        assert_eq!(status.most_recent_leaver.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_reconcile_broadcasts_to_all_members() {
        let mut actor = create_actor();
        let (tx1, mut rx1) = outbox();
        let (tx2, mut rx2) = outbox();
        join(&mut actor, "alice", tx1).unwrap();
        join(&mut actor, "bob", tx2).unwrap();

        let change = actor.handle_reconcile();

        assert_eq!(
            change,
            Some(PresenceChange::Joined {
                count: 2,
                name: "bob".to_string()
            })
        );
        assert_eq!(rx1.try_recv().unwrap(), ServerMessage::user_join(2, "bob"));
        assert_eq!(rx2.try_recv().unwrap(), ServerMessage::user_join(2, "bob"));

        // Nothing changed since the last tick
        assert!(actor.handle_reconcile().is_none());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconcile_survives_dead_and_full_outboxes() {
        let mut actor = create_actor();
        let (dead_tx, dead_rx) = outbox();
        let (full_tx, _full_rx) = mpsc::channel(1);
        let (live_tx, mut live_rx) = outbox();

        join(&mut actor, "dead", dead_tx).unwrap();
        join(&mut actor, "full", full_tx.clone()).unwrap();
        join(&mut actor, "live", live_tx).unwrap();
        drop(dead_rx);
        full_tx.try_send(ServerMessage::uname_request()).unwrap();

        let change = actor.handle_reconcile();

        assert_eq!(change.map(|c| c.count()), Some(3));
        assert_eq!(live_rx.try_recv().unwrap(), ServerMessage::user_join(3, "live"));
    }

    #[tokio::test]
    async fn test_reconcile_reports_leave() {
        let mut actor = create_actor();
        let (tx1, _rx1) = outbox();
        let (tx2, mut rx2) = outbox();
        join(&mut actor, "alice", tx1).unwrap();
        join(&mut actor, "bob", tx2).unwrap();
        actor.handle_reconcile();
        let _ = rx2.try_recv();

        actor.handle_leave("alice");
        let change = actor.handle_reconcile();

        assert_eq!(
            change,
            Some(PresenceChange::Left {
                count: 1,
                name: "alice".to_string()
            })
        );
        assert_eq!(rx2.try_recv().unwrap(), ServerMessage::user_leave(1, "alice"));
    }
}
