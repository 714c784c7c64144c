//! Participant registry - the pure data structure behind presence tracking.
//!
//! The registry maps participant names to an opaque outbound channel handle
//! and keeps the derived state needed to detect membership changes:
//! the session's occupancy limit, the count observed at the last
//! reconciliation, and the most recent joiner and leaver.
//!
//! It performs no I/O and no locking. Callers that share it across tasks
//! must serialize access (the daemon does so by owning it inside an actor).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{RegistryError, RegistryResult};
use crate::limit::OccupancyLimit;
use crate::presence::PresenceChange;

/// A registered participant.
#[derive(Debug, Clone)]
pub struct Member<H> {
    /// Outbound channel handle for this participant
    pub handle: H,

    /// When the participant was added
    pub joined_at: DateTime<Utc>,
}

/// In-memory registry of connected participants keyed by name.
#[derive(Debug)]
pub struct Registry<H> {
    members: HashMap<String, Member<H>>,
    occupancy_limit: Option<OccupancyLimit>,
    last_observed_count: usize,
    most_recent_joiner: Option<String>,
    most_recent_leaver: Option<String>,
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Registry<H> {
    /// Creates an empty registry with no limit set.
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
            occupancy_limit: None,
            last_observed_count: 0,
            most_recent_joiner: None,
            most_recent_leaver: None,
        }
    }

    /// Returns the current number of members.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Returns true if `name` is registered.
    pub fn has(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Adds a participant, recording it as the most recent joiner.
    ///
    /// An existing entry for `name` is overwritten unless `require_unique`
    /// is set, in which case the registry is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateName` if `require_unique` is true
    /// and `name` is already registered.
    pub fn add(&mut self, name: &str, handle: H, require_unique: bool) -> RegistryResult<()> {
        if require_unique && self.has(name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
            });
        }

        self.members.insert(
            name.to_string(),
            Member {
                handle,
                joined_at: Utc::now(),
            },
        );
        self.most_recent_joiner = Some(name.to_string());
        Ok(())
    }

    /// Removes a participant, recording it as the most recent leaver.
    ///
    /// Returns the removed member, or `None` when `name` was absent and
    /// `raise_if_missing` is false.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` if `name` is absent and
    /// `raise_if_missing` is true.
    pub fn remove(&mut self, name: &str, raise_if_missing: bool) -> RegistryResult<Option<Member<H>>> {
        match self.members.remove(name) {
            Some(member) => {
                self.most_recent_leaver = Some(name.to_string());
                Ok(Some(member))
            }
            None if raise_if_missing => Err(RegistryError::NotFound {
                name: name.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Sets the occupancy limit. Does not check it against current occupancy.
    pub fn set_limit(&mut self, limit: OccupancyLimit) {
        self.occupancy_limit = Some(limit);
    }

    /// Returns the occupancy limit, if one has been set.
    pub fn limit(&self) -> Option<OccupancyLimit> {
        self.occupancy_limit
    }

    /// Returns true once a limit is set and occupancy has reached it.
    pub fn is_full(&self) -> bool {
        self.occupancy_limit
            .is_some_and(|limit| self.count() >= limit.get())
    }

    /// Captures the current count for comparison at the next reconciliation.
    pub fn snapshot_count(&mut self) {
        self.last_observed_count = self.count();
    }

    /// Returns the count captured by the last [`snapshot_count`](Self::snapshot_count).
    pub fn observed_count(&self) -> usize {
        self.last_observed_count
    }

    /// Name of the last participant successfully added.
    pub fn most_recent_joiner(&self) -> Option<&str> {
        self.most_recent_joiner.as_deref()
    }

    /// Name of the last participant successfully removed.
    pub fn most_recent_leaver(&self) -> Option<&str> {
        self.most_recent_leaver.as_deref()
    }

    /// Iterates over every member's name and outbound handle.
    pub fn handles(&self) -> impl Iterator<Item = (&str, &H)> {
        self.members
            .iter()
            .map(|(name, member)| (name.as_str(), &member.handle))
    }

    /// Diffs occupancy against the last observed count and re-snapshots.
    ///
    /// Returns the change to broadcast, or `None` if occupancy is unchanged.
    pub fn reconcile(&mut self) -> Option<PresenceChange> {
        let observed = self.observed_count();
        let count = self.count();

        let change = if count > observed {
            self.most_recent_joiner
                .clone()
                .map(|name| PresenceChange::Joined { count, name })
        } else if count < observed {
            self.most_recent_leaver
                .clone()
                .map(|name| PresenceChange::Left { count, name })
        } else {
            None
        };

        self.snapshot_count();
        change
    }
}
