// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tradechat_router::{ConfigError, RouterConfig};

/// WebSocket server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// WebSocket server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent WebSocket connections
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Per-connection outbound queue depth
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Routing settings
    #[serde(default)]
    pub router: RouterConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9090
}

fn default_max_clients() -> usize {
    100
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_stats_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_clients: default_max_clients(),
            outbound_buffer: default_outbound_buffer(),
            stats_interval_secs: default_stats_interval(),
            log_level: default_log_level(),
            router: RouterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Socket address string to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid("max_clients cannot be 0".into()));
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid("outbound_buffer cannot be 0".into()));
        }
        self.router.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:9090");
        assert_eq!(config.max_clients, 100);
        assert_eq!(config.outbound_buffer, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
port = 8080
stats_interval_secs = 0

[router]
name = "desk"
delivery_timeout_ms = 250
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.stats_interval_secs, 0);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.router.name, "desk");
        assert_eq!(config.router.delivery_timeout_ms, 250);
    }

    #[test]
    fn test_from_file_rejects_zero_buffer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "outbound_buffer = 0").unwrap();

        let err = ServerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_file_rejects_bad_router() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[router]\ndelivery_timeout_ms = 0").unwrap();

        assert!(ServerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_roundtrip_pretty() {
        let config = ServerConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
