//! Server configuration.

use std::time::Duration;

/// Environment variable holding the listen address.
pub const ENV_BIND: &str = "NOUGHTS_BIND";
/// Environment variable holding the HTTP listen address. An empty value
/// turns the HTTP surface off.
pub const ENV_HTTP_BIND: &str = "NOUGHTS_HTTP_BIND";
/// Environment variable holding the connection idle timeout, in seconds.
/// `0` disables the timeout.
pub const ENV_IDLE_TIMEOUT_SECS: &str = "NOUGHTS_IDLE_TIMEOUT_SECS";
/// Environment variable holding the session time-to-live, in seconds.
/// `0` disables expiry.
pub const ENV_SESSION_TTL_SECS: &str = "NOUGHTS_SESSION_TTL_SECS";
/// Environment variable holding the expiry sweep interval, in seconds.
pub const ENV_SWEEP_INTERVAL_SECS: &str = "NOUGHTS_SWEEP_INTERVAL_SECS";

/// A configuration value that couldn't be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is not a whole number of seconds")]
    NotSeconds {
        key: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

/// Settings for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Address the HTTP listener binds to. `None` serves no HTTP.
    pub http_bind_addr: Option<String>,

    /// How long a connection may stay silent before it is treated as
    /// disconnected. `None` waits forever.
    pub connection_idle_timeout: Option<Duration>,

    /// Sessions idle for longer than this are deleted. `None` keeps
    /// sessions until they're deleted explicitly.
    pub session_ttl: Option<Duration>,

    /// How often the expiry sweep runs when `session_ttl` is set.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            http_bind_addr: Some("127.0.0.1:8081".to_string()),
            connection_idle_timeout: Some(Duration::from_secs(300)),
            session_ttl: None,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from `NOUGHTS_*` environment variables,
    /// falling back to [`Default`] for any that are unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_BIND) {
            config.bind_addr = addr;
        }
        if let Some(addr) = lookup(ENV_HTTP_BIND) {
            let addr = addr.trim();
            config.http_bind_addr = (!addr.is_empty()).then(|| addr.to_string());
        }
        if let Some(secs) = seconds(&lookup, ENV_IDLE_TIMEOUT_SECS)? {
            config.connection_idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = seconds(&lookup, ENV_SESSION_TTL_SECS)? {
            config.session_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = seconds(&lookup, ENV_SWEEP_INTERVAL_SECS)? {
            if secs == 0 {
                return Err(ConfigError::Zero {
                    key: ENV_SWEEP_INTERVAL_SECS,
                });
            }
            config.sweep_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|source| ConfigError::NotSeconds { key, value, source })
}
