//! Free-port discovery for the listening socket.
//!
//! Starting from a preferred port, each port is tried in turn until one
//! binds. The bound listener itself is returned so nothing else can take
//! the port between probing and serving.

use std::io;

use tokio::net::TcpListener;
use tracing::{debug, info};

/// Errors from port discovery.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Failed to bind {host}:{port}: {error}")]
    Bind {
        host: String,
        port: u16,
        error: String,
    },

    #[error("No free port on {host} at or above {start}")]
    Exhausted { host: String, start: u16 },
}

/// Binds the first free port on `host` at or above `start`.
///
/// Only "address in use" moves on to the next port; any other bind failure
/// (bad host, permission denied) is returned immediately.
///
/// # Errors
///
/// - `PortError::Bind` on a bind failure other than "address in use"
/// - `PortError::Exhausted` if every port up to 65535 is taken
pub async fn bind_free_port(host: &str, start: u16) -> Result<TcpListener, PortError> {
    let mut port = start;

    loop {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                if port != start {
                    info!(requested = start, port, "Requested port in use, using next free port");
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                debug!(port, "Port in use");
            }
            Err(e) => {
                return Err(PortError::Bind {
                    host: host.to_string(),
                    port,
                    error: e.to_string(),
                });
            }
        }

        port = port.checked_add(1).ok_or_else(|| PortError::Exhausted {
            host: host.to_string(),
            start,
        })?;
    }
}
