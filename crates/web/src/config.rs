//! Server configuration.
//!
//! Loaded from JSON; every field is optional and falls back to the device
//! defaults (port 80, five connections, two hour idle timeout, panel and
//! REST enabled, no token).

use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read config: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("malformed config: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "ServerConfig::default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "ServerConfig::default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub access: AccessPolicy,
}

/// Switches consulted while matching pages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessPolicy {
    #[serde(default = "AccessPolicy::enabled")]
    pub panel_enabled: bool,
    #[serde(default = "AccessPolicy::enabled")]
    pub rest_enabled: bool,
    /// Required `Token` header of REST pages, when set and non-empty.
    #[serde(default)]
    pub token: Option<String>,
    /// The device's own address, checked against `Referer`.
    #[serde(default)]
    pub local_ip: Option<Ipv4Addr>,
}

impl ServerConfig {
    fn default_listen() -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], 80))
    }

    fn default_max_connections() -> usize {
        5
    }

    fn default_idle_timeout_secs() -> u64 {
        7200
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads `path`, or returns the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
            max_connections: Self::default_max_connections(),
            idle_timeout_secs: Self::default_idle_timeout_secs(),
            access: AccessPolicy::default(),
        }
    }
}

impl AccessPolicy {
    fn enabled() -> bool {
        true
    }

    /// The configured token, ignoring an empty one.
    pub fn rest_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.is_empty())
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self { panel_enabled: true, rest_enabled: true, token: None, local_ip: None }
    }
}
