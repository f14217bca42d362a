//! Typed settings read from the merged config tree.
//!
//! ```yaml
//! server:
//!   bind_addr: "127.0.0.1:9292"
//! search:
//!   page_size: 25
//! transfer:
//!   require_active_order: true
//! client:
//!   api_root: "http://localhost:9292"
//! ```
//!
//! Every key is optional. Environment overrides are applied by the binaries
//! through [`LabSettings::apply_env`], never read from here directly.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9292";
pub const DEFAULT_API_ROOT: &str = "http://localhost:9292";

/// Comma-separated YAML layer paths.
pub const ENV_CONFIG_PATHS: &str = "LOM_CONFIG";
pub const ENV_DAEMON_ADDR: &str = "LOM_DAEMON_ADDR";
pub const ENV_API_ROOT: &str = "LOM_API_ROOT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub page_size: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { page_size: 25 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Source and target must each be an item of an `in_progress` order.
    pub require_active_order: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            require_active_order: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_root: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabSettings {
    pub server: ServerSettings,
    pub search: SearchSettings,
    pub transfer: TransferSettings,
    pub client: ClientSettings,
}

impl LabSettings {
    /// Read settings from a merged config tree, filling defaults.
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let settings: LabSettings =
            serde_json::from_value(config.clone()).context("config does not match LabSettings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.page_size == 0 {
            bail!("CONFIG_INVALID search.page_size must be >= 1");
        }
        self.bind_addr()?;
        if self.client.api_root.trim().is_empty() {
            bail!("CONFIG_INVALID client.api_root must not be empty");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .with_context(|| format!("CONFIG_INVALID server.bind_addr '{}'", self.server.bind_addr))
    }

    /// Apply `LOM_DAEMON_ADDR` / `LOM_API_ROOT` from `lookup`.
    ///
    /// `lookup` is `std::env::var(..).ok()` in the binaries and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(ENV_DAEMON_ADDR).filter(|s| !s.trim().is_empty()) {
            self.server.bind_addr = addr.trim().to_string();
        }
        if let Some(root) = lookup(ENV_API_ROOT).filter(|s| !s.trim().is_empty()) {
            self.client.api_root = root.trim().to_string();
        }
        self.validate()
    }
}

/// Split a `LOM_CONFIG` value into layer paths, skipping blanks.
pub fn config_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
