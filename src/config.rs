// src/config.rs

//! Client configuration: defaults, TOML loading, environment overrides, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9876;

pub const ENV_HOST: &str = "XEONDB_HOST";
pub const ENV_PORT: &str = "XEONDB_PORT";
pub const ENV_USERNAME: &str = "XEONDB_USERNAME";
pub const ENV_PASSWORD: &str = "XEONDB_PASSWORD";

/// Connection settings for a [`Client`](crate::Client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Credentials are only sent when at least one of them is non-blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Bound on the TCP dial. There is no per-request timeout.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Default log filter for the command-line tool, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            connect_timeout: default_connect_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Creates a config for `host:port` with every other setting at its default.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Reads and validates a TOML config file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: ClientConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from the defaults overlaid with the `XEONDB_*`
    /// environment variables. An unparseable port is ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
            config.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            match port.trim().parse::<u16>() {
                Ok(port) if port != 0 => config.port = port,
                _ => warn!("Ignoring invalid {ENV_PORT} value '{port}'."),
            }
        }
        config.username = lookup(ENV_USERNAME);
        config.password = lookup(ENV_PASSWORD);
        config
    }

    /// Validates the settings for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.connect_timeout.is_zero() {
            return Err(anyhow!("connect_timeout cannot be 0"));
        }
        Ok(())
    }

    /// Replaces a blank host or a zero port with the defaults.
    pub fn normalized(mut self) -> Self {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            self.port = default_port();
        }
        if self.connect_timeout.is_zero() {
            self.connect_timeout = default_connect_timeout();
        }
        self
    }

    /// True if a username or password with non-whitespace content is set.
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.username) || present(&self.password)
    }

    /// The `host:port` string used to dial.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
