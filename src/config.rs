//! Configuration loaded from `config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::generation::GenerationSettings;
use crate::models::OwnerId;
use crate::storage::{JsonStore, STORE_FILE};

/// Environment variable overriding the store file location.
pub const STORE_ENV: &str = "TASKCADENCE_DB";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `store.json`.
    pub data_dir: PathBuf,
    /// Owner used by the CLI when `--owner` is not given.
    pub default_owner: OwnerId,
    pub schedule: ScheduleConfig,
    pub generation: GenerationConfig,
}

/// Local wall-clock time at which the daily generation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub hour: u8,
    pub minute: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Runs taking longer than this many seconds are logged as slow.
    pub slow_threshold_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_owner: 1,
            schedule: ScheduleConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { hour: 0, minute: 5 }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            slow_threshold_secs: 30,
        }
    }
}

/// `~/.local/share/taskcadence` on Linux, `./taskcadence` when there is no
/// data directory.
fn default_data_dir() -> PathBuf {
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("taskcadence");
    p
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `~/.config/taskcadence/config.toml` on Linux.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("taskcadence").join("config.toml"))
    }

    /// Loads `explicit` if given, else the default config file if it exists,
    /// else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.hour > 23 || self.schedule.minute > 59 {
            return Err(Error::Config(format!(
                "invalid schedule time {:02}:{:02}",
                self.schedule.hour, self.schedule.minute
            )));
        }
        Ok(())
    }

    /// Store file location: `$TASKCADENCE_DB` when set, else `<data_dir>/store.json`.
    pub fn store_path(&self) -> PathBuf {
        std::env::var(STORE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.data_dir.join(STORE_FILE))
    }

    pub fn open_store(&self) -> Result<JsonStore> {
        JsonStore::open(self.store_path())
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            slow_threshold: Duration::from_secs(self.generation.slow_threshold_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[schedule]\nhour = 6\n").unwrap();
        assert_eq!(config.schedule.hour, 6);
        assert_eq!(config.schedule.minute, 5);
        assert_eq!(config.default_owner, 1);
        assert_eq!(config.generation.slow_threshold_secs, 30);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.default_owner = 42;
        config.data_dir = dir.path().join("data");
        config.save_to_file(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.default_owner, 42);
        assert_eq!(loaded.data_dir, dir.path().join("data"));
    }

    #[test]
    fn test_invalid_schedule_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\nhour = 24\n").unwrap();
        assert!(matches!(Config::from_file(&path), Err(Error::Config(_))));
    }
}
