//! Participant registry using Actor pattern.
//!
//! The registry is the central state manager for everyone currently in the
//! session. It receives commands via a tokio mpsc channel and owns the only
//! copy of the presence state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Connection task │────▶│  RegistryActor  │────▶│ Participant     │
//! └─────────────────┘     └─────────────────┘     │ outboxes        │
//!         │                       ▲               └─────────────────┘
//!         │   RegistryCommand     │ Reconcile             │
//!         │   (mpsc channel)      │ (every tick)          │ user_join /
//!         ▼                       │                       ▼ user_leave
//!    Admit/Join/SetLimit   ┌──────┴──────┐          All participants
//!    Leave                 │ ticker task │
//!                          └─────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::debug;

use huddle_protocol::ServerMessage;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{Joined, RegistryCommand, RegistryError, RegistryStatus};
pub use handle::{Membership, RegistryHandle};

/// Outbound channel handle stored in the registry for each participant.
pub type Outbox = mpsc::Sender<ServerMessage>;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// How often occupancy is reconciled and broadcast by default
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates the command channel
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Spawns the reconciliation ticker
/// 4. Returns a RegistryHandle for client use
///
/// # Example
///
/// ```no_run
/// use huddled::registry::{spawn_registry, DEFAULT_TICK_INTERVAL};
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry(DEFAULT_TICK_INTERVAL);
///
///     let status = handle.status().await;
/// }
/// ```
pub fn spawn_registry(tick_interval: Duration) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    let handle = RegistryHandle::new(cmd_tx.clone());

    spawn_reconcile_task(cmd_tx, tick_interval);

    handle
}

/// Spawn a background task that triggers reconciliation once per tick.
fn spawn_reconcile_task(sender: mpsc::Sender<RegistryCommand>, tick_interval: Duration) {
    tokio::spawn(async move {
        // interval() rejects a zero period
        let mut ticker = interval(tick_interval.max(MIN_TICK_INTERVAL));

        loop {
            ticker.tick().await;

            // Fire-and-forget: the actor broadcasts any change itself
            if sender
                .send(RegistryCommand::Reconcile { respond_to: None })
                .await
                .is_err()
            {
                debug!("Reconcile task stopping: registry channel closed");
                break;
            }
        }
    });
}
