//! huddle core - Shared types for presence tracking
//!
//! This crate provides the participant registry and the domain types
//! shared between the wire protocol and the daemon (huddled).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod limit;
pub mod presence;
pub mod registry;

// Re-exports for convenience
pub use error::{RegistryError, RegistryResult};
pub use limit::OccupancyLimit;
pub use presence::PresenceChange;
pub use registry::{Member, Registry};
