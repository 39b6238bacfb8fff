//! Application configuration loaded from an optional TOML file

use range_dl::TransferConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upstream drive API used to resolve file identifiers
pub const DEFAULT_API_BASE: &str = "https://www.linkbox.to/api";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub origin: OriginConfig,
    pub proxy: ProxyConfig,
    pub rate_limit: RateLimitConfig,
    pub transfer: TransferConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    pub api_base: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Timeouts for the relay endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Bound on resolving an identifier to an origin URL
    pub metadata_timeout_secs: u64,
    /// Bound on the relayed request, connect through end of body
    pub relay_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: 30,
            relay_timeout_secs: 240,
        }
    }
}

impl ProxyConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }
}

/// Fixed-window limit per client IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 1000,
            window_secs: 60 * 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Settings for the `get` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the proxy used when the chunked download fails
    pub proxy_base: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy_base: "http://127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or use defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transfer
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.proxy.metadata_timeout_secs == 0 || self.proxy.relay_timeout_secs == 0 {
            return Err(ConfigError::Invalid("proxy timeouts must be > 0".into()));
        }
        if self.rate_limit.limit == 0 || self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.limit and rate_limit.window_secs must be > 0".into(),
            ));
        }
        if self.origin.api_base.trim().is_empty() {
            return Err(ConfigError::Invalid("origin.api_base is empty".into()));
        }
        Ok(())
    }
}
