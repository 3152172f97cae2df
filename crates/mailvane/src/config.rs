//! Application configuration.
//!
//! Stored as JSON under the platform config directory. A missing file
//! is created with defaults so the user has something to edit.

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Persistent configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity used to namespace caches and cursors. Usually the
    /// account's email address.
    pub user_id: String,
    /// Pub/Sub topic the provider publishes notifications to.
    pub topic_name: String,
    /// SSE endpoint that fans those notifications out to clients.
    /// Empty disables the live channel; the engine then polls.
    pub updates_url: String,
    /// Override for the provider API base URL. `None` means production.
    pub api_base_url: Option<String>,
    /// Path of the sqlite database holding caches and cursors.
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            topic_name: String::new(),
            updates_url: String::new(),
            api_base_url: None,
            database_path: None,
        }
    }
}

impl Config {
    /// Loads the config file, writing a default one if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory is unavailable or the
    /// file cannot be read, parsed, or created.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            let config = Self::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(&path, serde_json::to_string_pretty(&config)?)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote default config");
            return Ok(config);
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Where the config file lives.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform config directory is unknown.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let base = dirs::config_dir().context("no config directory on this platform")?;
        Ok(base.join("mailvane").join("config.json"))
    }

    /// Path of the sqlite database, defaulting next to the config.
    ///
    /// # Errors
    ///
    /// Returns an error if no location can be determined.
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let base = dirs::data_dir().context("no data directory on this platform")?;
        Ok(base.join("mailvane").join("mailvane.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"user_id":"me@example.com"}"#)
            .unwrap_or_else(|_| unreachable!("fixture is valid"));
        assert_eq!(config.user_id, "me@example.com");
        assert!(config.updates_url.is_empty());
        assert!(config.api_base_url.is_none());
    }
}
