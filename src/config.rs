//! Configuration file handling
//! This module loads the optional JSON config: key bindings plus a couple
//! of timing tunables. A missing or broken file falls back to the defaults
//! so the controller always starts.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::bluetooth::{DEFAULT_SCAN_DURATION_SECS, DEFAULT_WRITE_RETRY_DELAY_MS};
use crate::core::session::InputEvent;

/// Config file looked for in the working directory unless a path is given
/// on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "trainctl.json";

/// User-tunable settings for a controller run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Keystroke to action-name bindings
    #[serde(default = "default_key_bindings")]
    pub key_bindings: HashMap<char, String>,
    /// How long a device scan runs, in seconds
    #[serde(default = "default_scan_duration_secs")]
    pub scan_duration_secs: u64,
    /// Pause before the reconnect attempt after a failed write, in milliseconds
    #[serde(default = "default_write_retry_delay_ms")]
    pub write_retry_delay_ms: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            key_bindings: default_key_bindings(),
            scan_duration_secs: default_scan_duration_secs(),
            write_retry_delay_ms: default_write_retry_delay_ms(),
        }
    }
}

impl TrainConfig {
    /// Loads the config from `path`, falling back to the defaults when the
    /// file is missing or does not parse.
    pub async fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Self::default();
        }
        match Self::read_from(path).await {
            Ok(config) => {
                info!("Config loaded from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Could not read config {:?} ({}), using defaults", path, e);
                Self::default()
            }
        }
    }

    async fn read_from(path: &Path) -> Result<Self> {
        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)?;
        Ok(config)
    }

    /// Resolves the bindings to concrete input events, skipping unknown
    /// action names with a warning.
    pub fn bindings(&self) -> HashMap<char, InputEvent> {
        let mut bindings = HashMap::new();
        for (key, action) in &self.key_bindings {
            match InputEvent::from_action_name(action) {
                Some(event) => {
                    bindings.insert(*key, event);
                }
                None => warn!("Ignoring key '{}': unknown action {:?}", key, action),
            }
        }
        bindings
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_duration_secs)
    }

    pub fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }
}

fn default_key_bindings() -> HashMap<char, String> {
    let mut bindings = HashMap::new();
    bindings.insert('f', "forward-slow".to_string());
    bindings.insert('F', "forward-fast".to_string());
    bindings.insert('b', "backward-slow".to_string());
    bindings.insert('B', "backward-fast".to_string());
    bindings.insert('s', "stop".to_string());
    bindings.insert('c', "color-cycle".to_string());
    bindings.insert('q', "quit".to_string());
    bindings.insert('1', "sound-1".to_string());
    bindings.insert('2', "sound-2".to_string());
    bindings.insert('3', "sound-3".to_string());
    bindings.insert('4', "sound-4".to_string());
    bindings.insert('5', "sound-5".to_string());
    bindings
}

fn default_scan_duration_secs() -> u64 {
    DEFAULT_SCAN_DURATION_SECS
}

fn default_write_retry_delay_ms() -> u64 {
    DEFAULT_WRITE_RETRY_DELAY_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::{Direction, Speed};

    #[test]
    fn default_bindings_all_resolve() {
        let config = TrainConfig::default();
        let bindings = config.bindings();
        assert_eq!(bindings.len(), config.key_bindings.len());
        assert_eq!(
            bindings.get(&'F'),
            Some(&InputEvent::Drive {
                direction: Direction::Forward,
                speed: Speed::Fast
            })
        );
        assert_eq!(bindings.get(&'q'), Some(&InputEvent::Quit));
        assert_eq!(bindings.get(&'3'), Some(&InputEvent::Sound(3)));
    }

    #[test]
    fn partial_config_files_keep_defaults_for_the_rest() {
        let config: TrainConfig = serde_json::from_str(r#"{"scan_duration_secs": 30}"#).unwrap();
        assert_eq!(config.scan_duration_secs, 30);
        assert_eq!(config.write_retry_delay_ms, DEFAULT_WRITE_RETRY_DELAY_MS);
        assert_eq!(config.key_bindings, default_key_bindings());
    }

    #[test]
    fn unknown_action_names_are_skipped() {
        let config: TrainConfig = serde_json::from_str(
            r#"{"key_bindings": {"x": "warp-drive", "s": "stop"}}"#,
        )
        .unwrap();
        let bindings = config.bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get(&'s'), Some(&InputEvent::Stop));
    }
}
