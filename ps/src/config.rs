//! Configuration for promptstore

use eyre::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::repository::StoreRepository;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding prompts.json, versions/ and imports/
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Keep at most this many snapshots after each save (unset keeps all)
    #[serde(rename = "snapshot-retention")]
    pub snapshot_retention: Option<usize>,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("promptstore")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_retention: None,
        }
    }
}

impl Config {
    /// Load config with fallback chain
    ///
    /// Explicit path, then `./promptstore.yml`, then
    /// `~/.config/promptstore/promptstore.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let default_paths = [
            Some(PathBuf::from("promptstore.yml")),
            dirs::config_dir().map(|p| p.join("promptstore").join("promptstore.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                match Self::load_from_file(path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Repository for the configured data directory
    pub fn repository(&self) -> StoreRepository {
        StoreRepository::open(&self.data_dir).with_snapshot_retention(self.snapshot_retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("promptstore.yml");
        fs::write(&path, "data-dir: /srv/prompts\nsnapshot-retention: 20\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/prompts"));
        assert_eq!(config.snapshot_retention, Some(20));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.yml");
        fs::write(&path, "snapshot-retention: 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, default_data_dir());
        assert_eq!(config.snapshot_retention, Some(3));
    }

    #[test]
    fn test_missing_explicit_file_errors() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(&temp.path().join("nope.yml"))).is_err());
    }

    #[test]
    fn test_repository_uses_data_dir() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp.path().join("data"),
            snapshot_retention: Some(5),
        };

        assert_eq!(config.repository().data_path(), temp.path().join("data").join("prompts.json"));
    }
}
