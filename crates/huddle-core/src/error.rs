//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Name is already taken by a connected participant
    #[error("username {name} already in use")]
    DuplicateName { name: String },

    /// No participant with this name is registered
    #[error("no user named {name}")]
    NotFound { name: String },

    /// Occupancy limit value rejected
    #[error("invalid user limit {value}: {reason}")]
    InvalidLimit { value: i64, reason: String },

    /// Requested limit is below the number of participants already present
    #[error("user limit {limit} is below current occupancy of {count}")]
    LimitBelowOccupancy { limit: usize, count: usize },

    /// Session is already at its occupancy limit
    #[error("user limit of {limit} has been reached")]
    CapacityReached { limit: usize },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
