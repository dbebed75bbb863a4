//! Process-wide settings: evaluation tile height and progress-tracking
//! policies. Loadable from JSON; install with [`crate::init`].
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{CyclePolicy, ReenablePolicy};

/// Progress adapter policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub reenable: ReenablePolicy,
    pub cycle: CyclePolicy,
}

/// Settings suitable for config files and test fixtures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rows computed per evaluation tile; one `eval` event fires per tile
    pub tile_height: usize,
    pub progress: ProgressConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tile_height: 16,
            progress: ProgressConfig::default(),
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_height == 0 {
            return Err(Error::Config("tile_height must be greater than 0".into()));
        }
        Ok(())
    }
}

static CURRENT: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Snapshot of the installed configuration.
pub fn current() -> Config {
    CURRENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub(crate) fn install(config: Config) -> Result<()> {
    config.validate()?;
    *CURRENT.write().unwrap_or_else(PoisonError::into_inner) = config;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = Config::from_json_str(r#"{ "progress": { "cycle": "single_shot" } }"#).unwrap();
        assert_eq!(config.tile_height, 16);
        assert_eq!(config.progress.cycle, CyclePolicy::SingleShot);
        assert_eq!(config.progress.reenable, ReenablePolicy::Idempotent);
    }

    #[test]
    fn zero_tile_height_is_rejected() {
        assert!(matches!(
            Config::from_json_str(r#"{ "tile_height": 0 }"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            Config::from_json_str("{ tile_height: "),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tilevips.json");
        std::fs::write(&path, r#"{ "tile_height": 4, "progress": { "reenable": "reject" } }"#)
            .unwrap();
        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.tile_height, 4);
        assert_eq!(config.progress.reenable, ReenablePolicy::Reject);
    }
}
