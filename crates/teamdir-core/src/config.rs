//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the session storage backend and the last
//! used username.
//!
//! Configuration is stored at `~/.config/teamdir/config.json`. The
//! `TEAMDIR_API_URL` environment variable overrides the configured URL.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::api::ApiClient;
use crate::auth::{Session, TokenStore};
use crate::storage::{FileStore, KeyValueStore, KeyringStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "teamdir";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides `api_url`
pub const API_URL_ENV: &str = "TEAMDIR_API_URL";

/// Where session tokens and the user record are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    #[serde(default)]
    pub storage: StorageBackend,
    pub request_timeout_secs: Option<u64>,
    pub last_username: Option<String>,
    /// Identity endpoint for servers whose tokens carry no `user_id` claim
    pub current_user_path: Option<String>,
    /// Directory for rolling log files; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            debug!(?path, "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Base URL of the directory service, environment first
    pub fn api_url(&self) -> Result<String> {
        Self::resolve_api_url(std::env::var(API_URL_ENV).ok(), self.api_url.as_deref())
    }

    fn resolve_api_url(from_env: Option<String>, configured: Option<&str>) -> Result<String> {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .map(|url| url.trim().to_string())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No API URL configured. Set {} or api_url in the config file",
                    API_URL_ENV
                )
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn open_storage(&self) -> Result<Arc<dyn KeyValueStore>> {
        let storage: Arc<dyn KeyValueStore> = match self.storage {
            StorageBackend::File => Arc::new(FileStore::in_dir(&self.data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStore::default()),
        };
        Ok(storage)
    }

    /// Build a session wired to the configured server and storage
    pub fn session(&self) -> Result<Session> {
        let tokens = TokenStore::new(self.open_storage()?);
        let mut api = ApiClient::with_timeout(&self.api_url()?, tokens, self.request_timeout())?;
        if let Some(ref path) = self.current_user_path {
            api = api.with_current_user_fallback(path);
        }
        Ok(Session::new(api))
    }
}
