//! Protocol message types for presence negotiation and broadcasts.

use huddle_core::PresenceChange;
use serde::{Deserialize, Serialize};

/// Error text sent when a requested name is already connected.
pub const NAME_TAKEN: &str = "username already used";

/// Error text sent when a requested user limit is not an integer of at least 2.
pub const INVALID_LIMIT: &str = "ulimit must be an integer greater than 1";

/// Error text sent when a session is full.
pub const LIMIT_REACHED: &str = "user limit has been reached";

/// Events sent from the server to participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PresenceEvent {
    /// Ask the client for its display name
    UnameRequest,

    /// Ask the first client for the session's user limit
    UlimitRequest,

    /// A participant joined
    UserJoin {
        /// Participants present after the join
        count: usize,
        /// Most recently joined participant
        uname: String,
    },

    /// A participant left
    UserLeave {
        /// Participants present after the departure
        count: usize,
        /// Most recently departed participant
        uname: String,
    },
}

impl From<PresenceChange> for PresenceEvent {
    fn from(change: PresenceChange) -> Self {
        match change {
            PresenceChange::Joined { count, name } => Self::UserJoin { count, uname: name },
            PresenceChange::Left { count, name } => Self::UserLeave { count, uname: name },
        }
    }
}

/// Any payload the server sends to a participant.
///
/// Errors carry no `event` field on the wire: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Request or presence broadcast
    Event(PresenceEvent),

    /// Error notification
    Error {
        /// Human-readable error message
        error: String,
    },
}

impl ServerMessage {
    /// Creates a name request.
    pub fn uname_request() -> Self {
        Self::Event(PresenceEvent::UnameRequest)
    }

    /// Creates a user limit request.
    pub fn ulimit_request() -> Self {
        Self::Event(PresenceEvent::UlimitRequest)
    }

    /// Creates a join broadcast.
    pub fn user_join(count: usize, uname: impl Into<String>) -> Self {
        Self::Event(PresenceEvent::UserJoin {
            count,
            uname: uname.into(),
        })
    }

    /// Creates a leave broadcast.
    pub fn user_leave(count: usize, uname: impl Into<String>) -> Self {
        Self::Event(PresenceEvent::UserLeave {
            count,
            uname: uname.into(),
        })
    }

    /// Creates an error notification.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Creates the duplicate-name error.
    pub fn name_taken() -> Self {
        Self::error(NAME_TAKEN)
    }

    /// Creates the invalid-limit error.
    pub fn invalid_limit() -> Self {
        Self::error(INVALID_LIMIT)
    }

    /// Creates the session-full error.
    pub fn limit_reached() -> Self {
        Self::error(LIMIT_REACHED)
    }

    /// Returns the error text if this is an error notification.
    pub fn as_error(&self) -> Option<&str> {
        match self {
            Self::Error { error } => Some(error),
            Self::Event(_) => None,
        }
    }
}

impl From<PresenceChange> for ServerMessage {
    fn from(change: PresenceChange) -> Self {
        Self::Event(change.into())
    }
}

/// Reply to a `uname_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnameReply {
    pub uname: String,
}

impl UnameReply {
    pub fn new(uname: impl Into<String>) -> Self {
        Self {
            uname: uname.into(),
        }
    }
}

/// Reply to a `ulimit_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UlimitReply {
    pub ulimit: i64,
}

impl UlimitReply {
    pub fn new(ulimit: i64) -> Self {
        Self { ulimit }
    }
}
