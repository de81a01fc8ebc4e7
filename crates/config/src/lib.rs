//! Per-user settings directory for conservator
//!
//! The directory (`~/.config/conservator/` on Linux) holds the music-service
//! API credentials (`api-credentials.json`) when they are not baked in at
//! build time or supplied through the environment. Snapshots are never
//! written here; they go to the output directory chosen on the command line.
//!
//! Call [`init`] at startup so users have a place to drop their credentials.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Directory name under the platform config dir
const APP_DIR: &str = "conservator";

/// Create the settings directory if missing and return its path
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// The settings directory, if the platform has a config dir at all
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Load a JSON settings file (such as the API credentials) by name
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load a JSON settings file from an explicit path (`--credentials`)
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a config file exists in the config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}
