//! Client configuration.
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! environment overrides. CLI flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stakd_core::{Error, Result};

/// Environment variable selecting the REST base URL.
pub const API_URL_ENV: &str = "STAKD_API_URL";

/// Base URL used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

const CONFIG_DIR: &str = "stakd";
const CONFIG_FILE: &str = "config.toml";

/// Transport and sync timing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// REST base URL; request paths are appended to it.
    pub api_url: String,
    /// Organization scope for lists and change feeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
    /// How often a polling change feed asks for new events.
    pub poll_interval_ms: u64,
    /// Trailing debounce window for change-event invalidation.
    pub debounce_ms: u64,
    /// Cached data younger than this is not refetched on mount.
    pub stale_after_ms: u64,
    /// Periodic refetch interval for the unread notification count.
    pub unread_refresh_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            org_id: None,
            request_timeout_ms: 30_000,
            poll_interval_ms: 2_000,
            debounce_ms: 200,
            stale_after_ms: 0,
            unread_refresh_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Loads defaults, then `path` (or the default path if it exists), then env.
    ///
    /// An explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    /// Parses a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Parses TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Serializes to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Applies `STAKD_API_URL` if set and non-empty.
    pub fn apply_env(&mut self) {
        self.apply_api_url_override(std::env::var(API_URL_ENV).ok());
    }

    fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            tracing::debug!(api_url = %url, "api url overridden from environment");
            self.api_url = url;
        }
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Change-feed poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Freshness window for mounted views.
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    /// Unread-count refresh interval.
    pub fn unread_refresh(&self) -> Duration {
        Duration::from_millis(self.unread_refresh_ms)
    }
}

/// `<config dir>/stakd/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
