//! Engine configuration.
//!
//! Loaded from `switch_engine.toml`. Every key is optional; a missing or unreadable file yields
//! the defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::evaluator::DEFAULT_CHECK_INTERVAL_SECS;
use crate::key::DEFAULT_MAX_NAME_LEN;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "switch_engine.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum seconds between condition passes.
    pub check_interval_secs: i64,
    /// How long past its deadline a timer may linger before cleanup removes it.
    pub stale_timer_grace_secs: i64,
    pub max_name_len: usize,
    /// Whether fired conditions produce messages for the current map.
    pub announce_changes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            stale_timer_grace_secs: 3600,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            announce_changes: true,
        }
    }
}

impl EngineConfig {
    /// Parse a config document.
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML for this config.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing engine config")
    }

    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading config from '{}'", path.display()))?;
        Self::from_toml(&text)
    }
}

/// Load the engine config, falling back to defaults on any error.
pub fn load_config(path: &Path) -> EngineConfig {
    match EngineConfig::read(path) {
        Ok(config) => {
            info!("engine config loaded from '{}'", path.display());
            config
        },
        Err(e) => {
            warn!("using default engine config: {e:#}");
            EngineConfig::default()
        },
    }
}
