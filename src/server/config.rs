//! Server configuration

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::hub::HubConfig;

/// Default bind address for the HTTP surface
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, 8080));

/// Default limit on an ingestion request body
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Default time a viewer session may stay silent, pongs included
pub const DEFAULT_VIEWER_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

pub const ENV_BIND_ADDR: &str = "TELEMETRY_BIND_ADDR";
pub const ENV_MAILBOX_CAPACITY: &str = "TELEMETRY_MAILBOX_CAPACITY";
pub const ENV_COMMAND_QUEUE_CAPACITY: &str = "TELEMETRY_COMMAND_QUEUE_CAPACITY";
pub const ENV_MAX_BODY_BYTES: &str = "TELEMETRY_MAX_BODY_BYTES";
pub const ENV_VIEWER_IDLE_SECS: &str = "TELEMETRY_VIEWER_IDLE_SECS";

/// Configuration values that could not be applied
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cannot parse {key}={value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Server configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Fan-out hub settings
    pub hub: HubConfig,

    /// Maximum accepted ingestion body size
    pub max_body_bytes: usize,

    /// Viewer sessions with no inbound traffic for this long are closed
    pub viewer_idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            hub: HubConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            viewer_idle_timeout: DEFAULT_VIEWER_IDLE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Defaults overlaid with `TELEMETRY_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`; absent keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parse_var(&lookup, ENV_BIND_ADDR)? {
            config.bind_addr = addr;
        }
        if let Some(capacity) = parse_nonzero(&lookup, ENV_MAILBOX_CAPACITY)? {
            config.hub.mailbox_capacity = capacity;
        }
        if let Some(capacity) = parse_nonzero(&lookup, ENV_COMMAND_QUEUE_CAPACITY)? {
            config.hub.command_queue_capacity = capacity;
        }
        if let Some(limit) = parse_nonzero(&lookup, ENV_MAX_BODY_BYTES)? {
            config.max_body_bytes = limit;
        }
        if let Some(secs) = parse_nonzero(&lookup, ENV_VIEWER_IDLE_SECS)? {
            config.viewer_idle_timeout = Duration::from_secs(secs as u64);
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the hub configuration
    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }

    /// Set the ingestion body limit (minimum 1)
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit.max(1);
        self
    }

    /// Set the viewer idle timeout (minimum 1 second)
    pub fn viewer_idle_timeout(mut self, timeout: Duration) -> Self {
        self.viewer_idle_timeout = timeout.max(Duration::from_secs(1));
        self
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_nonzero<F>(lookup: &F, key: &'static str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_var::<F, usize>(lookup, key)? {
        Some(0) => Err(ConfigError::Zero(key)),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.viewer_idle_timeout, DEFAULT_VIEWER_IDLE_TIMEOUT);
        assert_eq!(config.hub, HubConfig::default());
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .hub(HubConfig::default().mailbox_capacity(8))
            .max_body_bytes(1024)
            .viewer_idle_timeout(Duration::from_secs(30));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.hub.mailbox_capacity, 8);
        assert_eq!(config.max_body_bytes, 1024);
        assert_eq!(config.viewer_idle_timeout, Duration::from_secs(30));

        let clamped = ServerConfig::default().viewer_idle_timeout(Duration::ZERO);
        assert_eq!(clamped.viewer_idle_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_lookup_absent_keeps_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ENV_BIND_ADDR, "127.0.0.1:7000"),
            (ENV_MAILBOX_CAPACITY, "32"),
            (ENV_COMMAND_QUEUE_CAPACITY, " 64 "),
            (ENV_MAX_BODY_BYTES, "2048"),
            (ENV_VIEWER_IDLE_SECS, "15"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.hub.mailbox_capacity, 32);
        assert_eq!(config.hub.command_queue_capacity, 64);
        assert_eq!(config.max_body_bytes, 2048);
        assert_eq!(config.viewer_idle_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = ServerConfig::from_lookup(lookup(&[(ENV_BIND_ADDR, "not-an-addr")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: ENV_BIND_ADDR,
                value: "not-an-addr".into()
            }
        );

        let err = ServerConfig::from_lookup(lookup(&[(ENV_MAILBOX_CAPACITY, "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_lookup_rejects_zero_capacity() {
        let err =
            ServerConfig::from_lookup(lookup(&[(ENV_MAILBOX_CAPACITY, "0")])).unwrap_err();

        assert_eq!(err, ConfigError::Zero(ENV_MAILBOX_CAPACITY));
    }
}
