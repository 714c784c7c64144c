//! huddle protocol - Wire format for the presence server
//!
//! Every payload is a single JSON object in a WebSocket text frame.
//! This crate provides the server-to-client messages and parsing of
//! client replies to name and user-limit requests.

pub mod message;
pub mod parse;

pub use message::{
    PresenceEvent, ServerMessage, UlimitReply, UnameReply, INVALID_LIMIT, LIMIT_REACHED,
    NAME_TAKEN,
};
pub use parse::{parse_ulimit, parse_uname, ParseError};
