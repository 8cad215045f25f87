//! Common paths for Framez data storage
//!
//! All Framez data is stored under ~/.config/framez/ on all platforms:
//! - config.toml - User configuration
//! - credentials.enc - Encrypted session store

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Get the Framez data directory (~/.config/framez/)
pub fn framez_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let dir = home.join(".config").join("framez");
    fs::create_dir_all(&dir).context("Failed to create framez directory")?;
    Ok(dir)
}

/// Get the config file path (~/.config/framez/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(framez_dir()?.join("config.toml"))
}

/// Get the credentials file path (~/.config/framez/credentials.enc)
pub fn credentials_path() -> Result<PathBuf> {
    Ok(framez_dir()?.join("credentials.enc"))
}
