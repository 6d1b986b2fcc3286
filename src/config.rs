//! Configuration for the kakeibo CLI, stored as a small JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::LedgerSettings;
use crate::domain::{Category, MONTHLY_BUDGET, Yen};
use crate::storage::DEFAULT_COLLECTION;

pub const APP_NAME: &str = "kakeibo";
pub const CONFIG_VERSION: u8 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "kakeibo.json";
pub const DEFAULT_DATABASE_FILE: &str = "kakeibo.db";

/// Representation of the configuration file.
///
/// Every key is optional; a missing key takes its default. A relative `database`
/// path is resolved against the directory holding the config file.
///
/// ```json
/// {
///   "app_name": "kakeibo",
///   "config_version": 1,
///   "database": "kakeibo.db",
///   "collection": "kakeibo",
///   "monthly_budget": 90000,
///   "default_category": "food",
///   "poll_interval_ms": 1000
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Application name, should always be "kakeibo"
    pub app_name: String,

    /// Configuration file version
    pub config_version: u8,

    /// Path to the SQLite database file
    pub database: PathBuf,

    /// Collection holding the expense entries
    pub collection: String,

    /// Monthly budget in yen
    pub monthly_budget: Yen,

    /// Category preselected in the add form
    pub default_category: Category,

    /// How often live views check for changes made by other sessions
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            database: PathBuf::from(DEFAULT_DATABASE_FILE),
            collection: DEFAULT_COLLECTION.to_string(),
            monthly_budget: MONTHLY_BUDGET,
            default_category: Category::default(),
            poll_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Loads a Config from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or names another app
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.poll_interval_ms > 0,
            "Invalid poll_interval_ms in config file: must be greater than zero"
        );

        if config.database.is_relative() {
            if let Some(dir) = path.parent() {
                config.database = dir.join(&config.database);
            }
        }

        Ok(config)
    }

    /// Loads the config at `path`, or the defaults when no such file exists.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let exists = tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("Unable to check for config file at {}", path.display()))?;
        if exists {
            Self::load(path).await
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Saves the Config to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        tokio::fs::write(path, data)
            .await
            .with_context(|| format!("Unable to write config file {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            collection: self.collection.clone(),
            monthly_budget: self.monthly_budget,
            default_category: self.default_category,
        }
    }
}
