//! huddle daemon - Presence registry and broadcast server
//!
//! This crate provides the core infrastructure for the huddle daemon:
//! - `registry` - Registry actor that owns presence state and reconciles it every tick
//! - `server` - WebSocket server and the per-connection session handshake
//! - `port` - Free-port discovery for the listening socket
//! - `config` - Server settings from defaults, environment, and flags
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      huddled daemon                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ PresenceServer  │────▶│     RegistryActor           │   │
//! │  │  (WebSocket)    │     │  (presence state owner)     │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ user_join /       │
//! │           ▼                             ▼ user_leave        │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│────▶│   participant outboxes      │   │
//! │  │ (per participant│     │   (writer task each)        │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod port;
pub mod registry;
pub mod server;
