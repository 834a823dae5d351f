//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend location, request timeout, refresh and debounce timings.
//!
//! Configuration is stored at `~/.config/dairydesk/config.json`. Missing
//! fields fall back to their defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "dairydesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Interval between background stock refreshes.
const DEFAULT_QUANTITY_REFRESH_SECS: u64 = 30;

/// Quiet period after the last search keystroke before the list is filtered.
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

/// Environment variable overriding the backend URL
pub const API_URL_ENV: &str = "DAIRYDESK_API_URL";

/// Environment variable holding the bearer token
pub const TOKEN_ENV: &str = "DAIRYDESK_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub quantity_refresh_secs: u64,
    pub search_debounce_ms: u64,
    pub log_to_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            quantity_refresh_secs: DEFAULT_QUANTITY_REFRESH_SECS,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            log_to_file: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted cart and log files.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn quantity_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.quantity_refresh_secs.max(1))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}
