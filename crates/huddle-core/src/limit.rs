//! Occupancy limit for a session.

use std::fmt;

use crate::error::{RegistryError, RegistryResult};

/// Maximum number of participants allowed in a session at once.
///
/// A session of one participant is meaningless, so the smallest
/// accepted limit is [`OccupancyLimit::MIN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OccupancyLimit(usize);

impl OccupancyLimit {
    /// Smallest limit a session can be configured with.
    pub const MIN: usize = 2;

    /// Validates and wraps a requested limit.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidLimit` when `value` is below [`Self::MIN`].
    pub fn new(value: i64) -> RegistryResult<Self> {
        let as_usize = usize::try_from(value).map_err(|_| RegistryError::InvalidLimit {
            value,
            reason: "must be a positive integer".to_string(),
        })?;

        if as_usize < Self::MIN {
            return Err(RegistryError::InvalidLimit {
                value,
                reason: format!("must be at least {}", Self::MIN),
            });
        }

        Ok(Self(as_usize))
    }

    /// Returns the limit as a participant count.
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for OccupancyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for OccupancyLimit {
    type Error = RegistryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
