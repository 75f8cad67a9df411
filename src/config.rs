use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::app_dirs::AppDirs;
use crate::session::{
    SessionConfig, SessionError, DEFAULT_BREATHS_PER_ROUND, DEFAULT_BREATH_CYCLE_MS,
    DEFAULT_INTER_ROUND_DELAY_MS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not write config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode config: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] SessionError),
}

/// Persisted user preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub rounds: u32,
    pub breaths_per_round: u32,
    pub breath_cycle_ms: u64,
    pub inter_round_delay_ms: u64,
    pub record_history: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rounds: 3,
            breaths_per_round: DEFAULT_BREATHS_PER_ROUND,
            breath_cycle_ms: DEFAULT_BREATH_CYCLE_MS,
            inter_round_delay_ms: DEFAULT_INTER_ROUND_DELAY_MS,
            record_history: true,
        }
    }
}

impl Config {
    pub fn to_session_config(&self) -> Result<SessionConfig, ConfigError> {
        let cfg = SessionConfig {
            total_rounds: self.rounds,
            breaths_per_round: self.breaths_per_round,
            breath_cycle: Duration::from_millis(self.breath_cycle_ms),
            inter_round_delay: Duration::from_millis(self.inter_round_delay_ms),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("breathwork_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing or unreadable files fall back to defaults
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|err| {
                tracing::warn!(path = %self.path.display(), error = %err, "ignoring corrupt config");
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        assert_eq!(cfg, store.load());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nope").join("config.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{ "rounds": 5 }"#).unwrap();

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.rounds, 5);
        assert_eq!(cfg.breaths_per_round, 30);
        assert!(cfg.record_history);
    }

    #[test]
    fn to_session_config_converts_millis() {
        let cfg = Config {
            rounds: 4,
            breaths_per_round: 40,
            breath_cycle_ms: 3000,
            inter_round_delay_ms: 1000,
            record_history: false,
        };
        let session = cfg.to_session_config().unwrap();
        assert_eq!(session.total_rounds, 4);
        assert_eq!(session.breaths_per_round, 40);
        assert_eq!(session.breath_cycle, Duration::from_secs(3));
        assert_eq!(session.inter_round_delay, Duration::from_secs(1));
    }

    #[test]
    fn to_session_config_rejects_zero_rounds() {
        let cfg = Config {
            rounds: 0,
            ..Config::default()
        };
        assert_matches!(
            cfg.to_session_config(),
            Err(ConfigError::Invalid(SessionError::NoRounds(0)))
        );
    }
}
