use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::SyncOptions;

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "LEADSYNC_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Backend root, e.g. http://127.0.0.1:8000
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_base_url() -> String {
  "http://127.0.0.1:8000".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Delay between refetches of a lead that is still being analyzed
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  /// How long a fetched value counts as fresh for new subscribers
  #[serde(default)]
  pub stale_time_secs: u64,
  /// Cap on consecutive polls per key (unbounded if unset)
  #[serde(default)]
  pub max_polls: Option<u32>,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: default_poll_interval_ms(),
      stale_time_secs: 0,
      max_polls: None,
    }
  }
}

fn default_poll_interval_ms() -> u64 {
  5000
}

impl SyncConfig {
  pub fn options(&self) -> SyncOptions {
    SyncOptions {
      poll_interval: Duration::from_millis(self.poll_interval_ms),
      stale_time: Duration::from_secs(self.stale_time_secs),
      max_polls: self.max_polls,
    }
  }
}

impl Config {
  /// Load configuration from file, then apply the environment override.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./leadsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/leadsync/config.yaml
  ///
  /// Built-in defaults are used when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => {
        tracing::debug!(path = %p.display(), "loading config");
        Self::load_from_path(&p)?
      }
      None => Self::default(),
    };

    config.override_api_url(std::env::var(API_URL_ENV).ok());
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("leadsync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("leadsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Replace the base URL when `url` is set and non-blank.
  pub fn override_api_url(&mut self, url: Option<String>) {
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
      self.api.base_url = url.trim().to_string();
    }
  }
}
