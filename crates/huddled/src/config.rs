//! Server configuration.
//!
//! Values come from, in order of precedence: command-line flags, the
//! `HUDDLE_HOST` / `HUDDLE_PORT` environment variables, then defaults.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::registry::DEFAULT_TICK_INTERVAL;

/// Default listening host (loopback)
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default first port to probe
pub const DEFAULT_PORT: u16 = 8081;

/// Environment variable overriding the listening host
pub const HOST_ENV: &str = "HUDDLE_HOST";

/// Environment variable overriding the first port to probe
pub const PORT_ENV: &str = "HUDDLE_PORT";

/// Settings for a presence server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to listen on
    pub host: String,

    /// First port to try; higher ports are probed if it is taken
    pub port: u16,

    /// Interval between presence reconciliations
    pub tick_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Builds a config from the process environment over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup over the defaults.
    ///
    /// An unparsable port is logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.trim().is_empty()) {
            config.host = host;
        }

        if let Some(raw) = lookup(PORT_ENV) {
            match raw.trim().parse::<u16>() {
                Ok(port) => config.port = port,
                Err(e) => warn!(variable = PORT_ENV, value = %raw, error = %e, "Ignoring invalid port"),
            }
        }

        config
    }

    /// Applies command-line overrides.
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        tick_interval: Option<Duration>,
    ) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(tick) = tick_interval {
            self.tick_interval = tick;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8081);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            (HOST_ENV, "0.0.0.0"),
            (PORT_ENV, "9000"),
        ]));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_invalid_env_port_ignored() {
        let config = ServerConfig::from_lookup(lookup_from(&[(PORT_ENV, "eighty")]));
        assert_eq!(config.port, DEFAULT_PORT);

        let config = ServerConfig::from_lookup(lookup_from(&[(PORT_ENV, "70000")]));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = ServerConfig::from_lookup(lookup_from(&[(PORT_ENV, "9000")])).with_overrides(
            Some("localhost".to_string()),
            Some(9100),
            Some(Duration::from_millis(250)),
        );
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9100);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_overrides_keep_values() {
        let config = ServerConfig::default().with_overrides(None, None, None);
        assert_eq!(config, ServerConfig::default());
    }
}
