//! Host configuration and port resolution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable consulted when no port override is given.
pub const PORT_ENV: &str = "port";

/// CloudEvents protocol options used in event mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventOptions {
    /// Path events are accepted on.
    pub path: String,
    /// Origin returned from the webhook validation handshake.
    pub allowed_origin: String,
    /// Requests per minute advertised in the handshake; `None` means any.
    pub allowed_rate: Option<u32>,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            allowed_origin: "*".to_string(),
            allowed_rate: None,
        }
    }
}

impl EventOptions {
    /// Set the event path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the webhook allowed origin.
    pub fn allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }

    /// Set the webhook allowed rate.
    pub fn allowed_rate(mut self, rate: u32) -> Self {
        self.allowed_rate = Some(rate);
        self
    }
}

/// Configuration for the function host.
///
/// Everything is fixed before the host starts; nothing is reloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host address to bind to.
    pub host: String,
    /// Explicit port. `0` defers to the environment.
    pub port: u16,
    /// Environment variable holding the fallback port.
    pub port_env: String,
    /// Time allowed for reading request headers and body.
    pub read_timeout: Duration,
    /// Time allowed for producing a response.
    pub write_timeout: Duration,
    /// Maximum size of the request head in bytes.
    pub max_header_bytes: usize,
    /// Maximum buffered request body in bytes.
    pub max_body_bytes: usize,
    /// Grace period for in-flight requests on shutdown.
    pub shutdown_grace: Duration,
    /// Event mode protocol options.
    pub event: EventOptions,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            port_env: PORT_ENV.to_string(),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            max_header_bytes: 1 << 20,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            shutdown_grace: Duration::from_secs(5),
            event: EventOptions::default(),
        }
    }
}

impl HostConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port override.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the environment variable holding the fallback port.
    pub fn port_env(mut self, name: impl Into<String>) -> Self {
        self.port_env = name.into();
        self
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the maximum buffered request body.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Set the shutdown grace period.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the event mode options.
    pub fn event(mut self, options: EventOptions) -> Self {
        self.event = options;
        self
    }

    /// Resolve the listening port from the override or the environment.
    pub fn resolve_port(&self) -> u16 {
        let from_env = std::env::var(&self.port_env).ok();
        resolve_port(self.port, from_env.as_deref())
    }

    /// Get the bind address for a resolved port.
    pub fn bind_addr(&self, port: u16) -> String {
        format!("{}:{}", self.host, port)
    }
}

/// Pick the listening port.
///
/// A positive override wins. Otherwise the environment value is parsed; a
/// missing or unparsable value yields `0` without an error, leaving the bind
/// step to deal with it.
pub fn resolve_port(port_override: u16, env_value: Option<&str>) -> u16 {
    if port_override != 0 {
        return port_override;
    }
    env_value
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        assert_eq!(resolve_port(8080, Some("9090")), 8080);
    }

    #[test]
    fn test_env_fallback() {
        assert_eq!(resolve_port(0, Some("9090")), 9090);
    }

    #[test]
    fn test_missing_env_is_zero() {
        assert_eq!(resolve_port(0, None), 0);
    }

    #[test]
    fn test_unparsable_env_is_zero() {
        for value in ["", "http", "-1", "65536", " 80"] {
            assert_eq!(resolve_port(0, Some(value)), 0, "value {:?}", value);
        }
    }

    #[test]
    fn test_resolve_port_reads_environment() {
        let config = HostConfig::new().port_env("LESSGO_TEST_PORT_ENV");
        std::env::set_var("LESSGO_TEST_PORT_ENV", "7070");
        assert_eq!(config.resolve_port(), 7070);
        assert_eq!(config.clone().port(8080).resolve_port(), 8080);
        std::env::remove_var("LESSGO_TEST_PORT_ENV");
        assert_eq!(config.resolve_port(), 0);
    }

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.write_timeout, Duration::from_secs(60));
        assert_eq!(config.max_header_bytes, 1 << 20);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.bind_addr(8080), "0.0.0.0:8080");
    }
}
