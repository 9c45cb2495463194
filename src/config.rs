//! Configuration loading and persistence.
//!
//! Reads and writes the companion client configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;

/// File name inside the configuration directory.
pub const CONFIG_FILE: &str = "config.json";

/// Configuration for the companion client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Default host to connect to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Delay in milliseconds before reconnecting after a close.
    pub reconnect_delay_ms: u64,
    /// Delay in milliseconds between a reactive change and its re-render.
    pub frame_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            reconnect_delay_ms: 5000,
            frame_interval_ms: 16,
        }
    }
}

impl ClientConfig {
    /// Returns the configuration directory path.
    ///
    /// `COMPANION_CONFIG_DIR` overrides the platform config directory
    /// (Linux: `~/.config/companion`).
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("COMPANION_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("companion"))
    }

    /// Path of the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing or unreadable file falls back to defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                log::warn!("[Config] Ignoring {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Reads a specific file. No environment overrides are applied.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `COMPANION_*` overrides from `lookup`. Unparsable numbers are
    /// ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("COMPANION_URL") {
            self.url = Some(url);
        }

        if let Some(delay) = lookup("COMPANION_RECONNECT_DELAY_MS") {
            if let Ok(delay) = delay.parse::<u64>() {
                self.reconnect_delay_ms = delay;
            }
        }

        if let Some(interval) = lookup("COMPANION_FRAME_INTERVAL_MS") {
            if let Ok(interval) = interval.parse::<u64>() {
                self.frame_interval_ms = interval;
            }
        }
    }

    /// Persists the current configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Persists the current configuration to `path`, creating parent
    /// directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reconnect delay as a [`Duration`].
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Frame interval as a [`Duration`].
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.url, None);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(5000));
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = ClientConfig::default();
        config.apply_overrides(lookup(&[
            ("COMPANION_URL", "ws://localhost:9000"),
            ("COMPANION_RECONNECT_DELAY_MS", "250"),
            ("COMPANION_FRAME_INTERVAL_MS", "33"),
        ]));
        assert_eq!(config.url.as_deref(), Some("ws://localhost:9000"));
        assert_eq!(config.reconnect_delay_ms, 250);
        assert_eq!(config.frame_interval_ms, 33);
    }

    #[test]
    fn test_unparsable_numbers_ignored() {
        let mut config = ClientConfig::default();
        config.apply_overrides(lookup(&[("COMPANION_RECONNECT_DELAY_MS", "soon")]));
        assert_eq!(config.reconnect_delay_ms, 5000);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"url":"ws://h"}"#).unwrap();
        assert_eq!(config.url.as_deref(), Some("ws://h"));
        assert_eq!(config.reconnect_delay_ms, 5000);
    }

    #[test]
    fn test_serialization_omits_missing_url() {
        let json = serde_json::to_string(&ClientConfig::default()).unwrap();
        assert!(!json.contains("url"));
    }
}
