use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.vk.com/method";
const DEFAULT_API_VERSION: &str = "5.199";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  /// Quiet period before pending changes are written
  #[serde(default = "default_autosave_debounce_ms")]
  pub autosave_debounce_ms: u64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api: ApiConfig::default(),
      storage: StorageConfig::default(),
      autosave_debounce_ms: default_autosave_debounce_ms(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
  #[serde(default = "default_api_version")]
  pub version: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      version: default_api_version(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite database file (defaults to $XDG_DATA_HOME/xg/storage.db)
  pub path: Option<PathBuf>,
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_api_version() -> String {
  DEFAULT_API_VERSION.to_string()
}

fn default_autosave_debounce_ms() -> u64 {
  500
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./xg.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/xg/config.yaml
  ///
  /// Without a config file every setting has its default.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("xg.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("xg").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a YAML null, not an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  pub fn autosave_debounce(&self) -> Duration {
    Duration::from_millis(self.autosave_debounce_ms)
  }

  /// Database file, falling back to the data directory.
  pub fn storage_path(&self) -> Result<PathBuf> {
    match &self.storage.path {
      Some(path) => Ok(path.clone()),
      None => crate::storage::SqliteStore::default_path(),
    }
  }

  /// Get the VK access token from environment variables.
  ///
  /// Checks XG_VK_TOKEN first, then VK_ACCESS_TOKEN as fallback.
  pub fn get_access_token() -> Result<String> {
    std::env::var("XG_VK_TOKEN")
      .or_else(|_| std::env::var("VK_ACCESS_TOKEN"))
      .map_err(|_| {
        eyre!("VK access token not found. Set XG_VK_TOKEN or VK_ACCESS_TOKEN environment variable.")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_empty_file_gives_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api.url, DEFAULT_API_URL);
    assert_eq!(config.api.version, DEFAULT_API_VERSION);
    assert_eq!(config.autosave_debounce(), Duration::from_millis(500));
    assert!(config.storage.path.is_none());
  }

  #[test]
  fn test_partial_file_keeps_other_defaults() {
    let config = Config::parse(
      "api:\n  version: \"5.131\"\nstorage:\n  path: /tmp/xg.db\nautosave_debounce_ms: 50\n",
    )
    .unwrap();

    assert_eq!(config.api.url, DEFAULT_API_URL);
    assert_eq!(config.api.version, "5.131");
    assert_eq!(config.storage_path().unwrap(), PathBuf::from("/tmp/xg.db"));
    assert_eq!(config.autosave_debounce_ms, 50);
  }

  #[test]
  fn test_load_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "api:\n  url: http://localhost:8080/method").unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.api.url, "http://localhost:8080/method");
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    assert!(Config::load(Some(Path::new("/nonexistent/xg.yaml"))).is_err());
  }

  #[test]
  fn test_malformed_file_is_an_error() {
    assert!(Config::parse("api: [1, 2").is_err());
  }
}
