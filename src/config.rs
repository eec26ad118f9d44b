//! Configuration handling for the route generator

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// File name looked up in the current directory
pub const LOCAL_CONFIG_FILE: &str = "vpn-route-gen.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub route: RouteConfig,
    pub dns: DnsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Gateway token written into every route directive
    pub gateway: String,
    /// Prefix length of the subnet route emitted for resolved addresses
    pub resolved_prefix: u8,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            gateway: "vpn_gateway".to_string(),
            resolved_prefix: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Name servers to query; empty means the system resolver configuration
    pub servers: Vec<IpAddr>,
    pub timeout_secs: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            timeout_secs: 5,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load config from the first location that exists
    ///
    /// An explicit path must exist. Otherwise `./vpn-route-gen.toml` is tried,
    /// then `<config dir>/vpn-route-gen/config.toml`, then defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!("Loading config from {}", path.display());
            return Self::load(path);
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                info!("Using config {}", candidate.display());
                return Self::load(&candidate);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("vpn-route-gen").join("config.toml"));
        }
        paths
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.route.resolved_prefix > 32 {
            return Err(ConfigError::Invalid(format!(
                "resolved_prefix must be at most 32, got {}",
                self.route.resolved_prefix
            )));
        }
        let gateway = &self.route.gateway;
        if gateway.is_empty() || gateway.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "gateway must be a single non-empty token, got {:?}",
                gateway
            )));
        }
        Ok(())
    }
}
