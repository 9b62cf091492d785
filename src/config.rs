use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::constants;
use crate::youtube::clamp_max_results;

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "MEOWFEED_API_KEY";

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "meowfeed")
}

#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Eq)]
pub struct Config {
  pub api_key: Option<String>,
  pub channel_id: Option<String>,
  pub max_results: Option<u32>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = project_dirs() {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file)
        && let Ok(config) = toml::from_str(&content)
      {
        return config;
      }
    }
    Self::default()
  }

  pub fn save(&self) -> Result<PathBuf> {
    let proj_dirs = project_dirs().ok_or_else(|| anyhow!("No home directory to store preferences in"))?;
    let config_dir = proj_dirs.config_dir();
    std::fs::create_dir_all(config_dir).with_context(|| format!("Failed to create {}", config_dir.display()))?;
    let config_file = config_dir.join("prefs.toml");
    let content = toml::to_string(self).context("Failed to serialize preferences")?;
    std::fs::write(&config_file, content).with_context(|| format!("Failed to write {}", config_file.display()))?;
    Ok(config_file)
  }

  /// The environment wins over the file; blank values count as unset.
  pub fn api_key(&self) -> Option<String> {
    resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
  }

  pub fn channel_id(&self) -> String {
    self
      .channel_id
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .unwrap_or(constants().default_channel_id.as_str())
      .to_string()
  }

  pub fn max_results(&self) -> u32 {
    clamp_max_results(self.max_results.unwrap_or(constants().default_max_results))
  }
}

fn resolve_api_key(env: Option<String>, file: Option<&str>) -> Option<String> {
  let clean = |s: &str| Some(s.trim()).filter(|k| !k.is_empty()).map(str::to_string);
  env.as_deref().and_then(clean).or_else(|| file.and_then(clean))
}

/// On-disk locations for the cache, the seen-id store and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
  data_dir: PathBuf,
}

impl AppPaths {
  pub fn resolve(data_dir_override: Option<PathBuf>) -> Result<Self> {
    let data_dir = match data_dir_override {
      Some(dir) => dir,
      None => project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("No data directory available; pass --data-dir"))?,
    };
    Ok(Self { data_dir })
  }

  pub fn cache_file(&self) -> PathBuf {
    self.data_dir.join("cache.json")
  }

  pub fn seen_file(&self) -> PathBuf {
    self.data_dir.join("seen.toml")
  }

  pub fn log_dir(&self) -> PathBuf {
    self.data_dir.join("logs")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn env_key_overrides_file() {
    assert_eq!(resolve_api_key(Some("env".into()), Some("file")), Some("env".to_string()));
    assert_eq!(resolve_api_key(None, Some(" file ")), Some("file".to_string()));
    assert_eq!(resolve_api_key(Some("  ".into()), Some("file")), Some("file".to_string()));
    assert_eq!(resolve_api_key(None, None), None);
  }

  #[test]
  fn prefs_parse_from_toml() {
    let config: Config = toml::from_str("api_key = \"k\"\nchannel_id = \"UC1\"\nmax_results = 200\n").unwrap();
    assert_eq!(config.channel_id(), "UC1");
    assert_eq!(config.max_results(), 50);
  }

  #[test]
  fn defaults_fill_gaps() {
    let config = Config { channel_id: Some("   ".into()), ..Config::default() };
    assert_eq!(config.channel_id(), constants().default_channel_id);
    assert_eq!(config.max_results(), constants().default_max_results);
  }

  #[test]
  fn paths_live_under_data_dir() {
    let paths = AppPaths::resolve(Some(PathBuf::from("/tmp/meow"))).unwrap();
    assert_eq!(paths.cache_file(), PathBuf::from("/tmp/meow/cache.json"));
    assert_eq!(paths.seen_file(), PathBuf::from("/tmp/meow/seen.toml"));
    assert_eq!(paths.log_dir(), PathBuf::from("/tmp/meow/logs"));
  }
}
