//! Membership changes detected between two reconciliation ticks.

use std::fmt;

/// A change in occupancy since the last observed count.
///
/// Only the most recent joiner or leaver is reported, even when several
/// participants arrived or left within the same tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// Occupancy grew.
    Joined {
        /// Total number of participants after the change
        count: usize,
        /// Most recently joined participant
        name: String,
    },

    /// Occupancy shrank.
    Left {
        /// Total number of participants after the change
        count: usize,
        /// Most recently departed participant
        name: String,
    },
}

impl PresenceChange {
    /// Returns the participant count carried by the change.
    pub fn count(&self) -> usize {
        match self {
            Self::Joined { count, .. } | Self::Left { count, .. } => *count,
        }
    }

    /// Returns the participant name carried by the change.
    pub fn name(&self) -> &str {
        match self {
            Self::Joined { name, .. } | Self::Left { name, .. } => name,
        }
    }
}

impl fmt::Display for PresenceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined { count, name } => write!(f, "{name} joined ({count} present)"),
            Self::Left { count, name } => write!(f, "{name} left ({count} present)"),
        }
    }
}
