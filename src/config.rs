//! Configuration module for Framez

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::BackendError;
use crate::paths;
use crate::theme::Theme;

/// Environment variable overriding `backend_url`
pub const ENV_BACKEND_URL: &str = "FRAMEZ_BACKEND_URL";
/// Environment variable overriding `anon_key`
pub const ENV_ANON_KEY: &str = "FRAMEZ_ANON_KEY";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Project URL of the hosted backend (e.g. https://xyz.supabase.co)
    #[serde(default)]
    pub backend_url: String,

    /// Public anonymous API key
    #[serde(default)]
    pub anon_key: String,

    /// Storage bucket that holds post images
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,

    /// Subscribe to realtime changes on the posts table
    #[serde(default = "default_realtime")]
    pub realtime: bool,

    /// Selected theme
    #[serde(default)]
    pub theme: Theme,

    /// Number of posts printed by `framez feed`
    #[serde(default = "default_feed_limit")]
    pub feed_limit: usize,
}

fn default_storage_bucket() -> String {
    "post-images".to_string()
}

fn default_realtime() -> bool {
    true
}

fn default_feed_limit() -> usize {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            anon_key: String::new(),
            storage_bucket: default_storage_bucket(),
            realtime: default_realtime(),
            theme: Theme::default(),
            feed_limit: default_feed_limit(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        paths::config_path()
    }

    /// Load config from the default path (or defaults), then apply env overrides
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Override backend settings from the environment
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        if let Some(key) = lookup(ENV_ANON_KEY).filter(|v| !v.trim().is_empty()) {
            self.anon_key = key.trim().to_string();
        }
    }

    /// Fail unless the backend URL and key are set
    pub fn ensure_backend(&self) -> Result<()> {
        if self.backend_url.trim().is_empty() || self.anon_key.trim().is_empty() {
            let path = Self::default_path()
                .map_or_else(|_| "config.toml".to_string(), |p| p.display().to_string());
            return Err(BackendError::NotConfigured(path).into());
        }
        Ok(())
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}
