//! Configuration loading for the remote API
//!
//! Supports loading credentials from (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file in the Conservator config directory
//! 3. Runtime environment variables (fallback)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Credentials filename in the Conservator config directory
const CREDENTIALS_FILE: &str = "api-credentials.json";

const ENV_API_URL: &str = "CONSERVATOR_API_URL";
const ENV_ACCESS_TOKEN: &str = "CONSERVATOR_ACCESS_TOKEN";

/// Endpoint and token for the remote music-service API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCredentials {
    pub base_url: String,
    pub access_token: String,
}

impl ApiCredentials {
    /// Create credentials, validating the endpoint URL
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let creds = Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials (for production builds)
    /// 2. JSON file (~/.config/conservator/api-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: ApiCredentials = config::load_json(CREDENTIALS_FILE)?;
            creds.validate()?;
            return Ok(creds);
        }

        Self::from_env()
    }

    /// Load credentials embedded at compile time via environment variables.
    /// Build with: CONSERVATOR_API_URL=xxx CONSERVATOR_ACCESS_TOKEN=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let base_url = option_env!("CONSERVATOR_API_URL")?;
        let access_token = option_env!("CONSERVATOR_ACCESS_TOKEN")?;

        if base_url.is_empty() || access_token.is_empty() {
            return None;
        }

        Self::new(base_url, access_token).ok()
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: ApiCredentials = config::load_json_file(path)?;
        creds.validate()?;
        Ok(creds)
    }

    /// Parse credentials from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: ApiCredentials =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        creds.validate()?;
        Ok(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(ENV_API_URL)
            .with_context(|| format!("{} environment variable not set", ENV_API_URL))?;
        let access_token = std::env::var(ENV_ACCESS_TOKEN)
            .with_context(|| format!("{} environment variable not set", ENV_ACCESS_TOKEN))?;

        Self::new(base_url, access_token)
    }

    /// Get the default credentials file path (~/.config/conservator/api-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }

    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid API URL: {}", self.base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("API URL must be http or https: {}", self.base_url);
        }
        Ok(())
    }
}
