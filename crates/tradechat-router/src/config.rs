// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Router configuration.
//!
//! Supports both programmatic and file-based configuration.

use crate::delivery::DEFAULT_DELIVERY_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Router name (for identification in logs).
    #[serde(default = "default_router_name")]
    pub name: String,

    /// Per-recipient delivery bound (milliseconds).
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

fn default_router_name() -> String {
    "tradechat".to_string()
}

fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT.as_millis() as u64
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: default_router_name(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the delivery bound.
    pub fn delivery_timeout_ms(mut self, millis: u64) -> Self {
        self.delivery_timeout_ms = millis;
        self
    }

    /// Delivery bound as a Duration.
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("Router name cannot be empty".into()));
        }
        if self.delivery_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "delivery_timeout_ms cannot be 0".into(),
            ));
        }
        Ok(())
    }
}
