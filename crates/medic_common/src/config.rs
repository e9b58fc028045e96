//! Configuration for medicd and medicctl.
//!
//! Loads settings from /etc/medic/config.toml, then /var/lib/medic/config.toml,
//! else defaults. Every field has a serde default so partial files work.

use crate::executor::DEFAULT_FIX_TIMEOUT_MS;
use crate::monitor::DEFAULT_WINDOW_CAPACITY;
use crate::predictor::DEFAULT_CONFIDENCE_SCALE;
use crate::store::STORE_DB_PATH;
use crate::types::FixKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/medic/config.toml";

/// Fallback config file path
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/medic/config.toml";

/// Metric store location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Metric samples older than this are pruned by the daemon
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_store_path() -> String {
    STORE_DB_PATH.to_string()
}

fn default_retention_days() -> u32 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            retention_days: default_retention_days(),
        }
    }
}

/// Sliding window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Write every accepted sample to system_metrics_history
    #[serde(default = "default_true")]
    pub persist_samples: bool,
}

fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}

fn default_true() -> bool {
    true
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
            persist_samples: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_fix_timeout")]
    pub fix_timeout_ms: u64,
}

fn default_fix_timeout() -> u64 {
    DEFAULT_FIX_TIMEOUT_MS
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            fix_timeout_ms: default_fix_timeout(),
        }
    }
}

impl ExecutorConfig {
    pub fn fix_timeout(&self) -> Duration {
        Duration::from_millis(self.fix_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_interval() -> u64 {
    30
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Multiplier on analysis confidence, keeps predictions low-confidence
    #[serde(default = "default_confidence_scale")]
    pub confidence_scale: f64,
}

fn default_confidence_scale() -> f64 {
    DEFAULT_CONFIDENCE_SCALE
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_scale: default_confidence_scale(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    #[serde(default)]
    pub predictor: PredictorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fix kind name -> shell command run by the daemon's handler
    #[serde(default)]
    pub actions: BTreeMap<String, String>,
}

impl MedicConfig {
    /// Load config, falling back to defaults
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_PATH)
            .or_else(|_| Self::load_from_path(DEFAULT_CONFIG_PATH))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                MedicConfig::default()
            })
    }

    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: MedicConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save default config to path (for init)
    pub fn save_default(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(&MedicConfig::default())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }

    /// Configured actions with a recognized fix kind; unknown keys are logged
    pub fn action_commands(&self) -> Vec<(FixKind, String)> {
        self.actions
            .iter()
            .filter_map(|(name, command)| match FixKind::parse(name) {
                Some(kind) => Some((kind, command.clone())),
                None => {
                    warn!("Ignoring action for unknown fix kind '{}'", name);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = MedicConfig::default();
        assert_eq!(config.store.path, "/var/lib/medic/medic.db");
        assert_eq!(config.monitor.window_capacity, 120);
        assert_eq!(config.executor.fix_timeout(), Duration::from_secs(10));
        assert_eq!(config.heartbeat.interval_secs, 30);
        assert!(config.predictor.enabled);
        assert!(config.actions.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let toml_str = r#"
            [heartbeat]
            interval_secs = 5

            [actions]
            clear_caches = "sync"
            defrag_disk = "true"
        "#;
        let config: MedicConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.heartbeat.interval_secs, 5);
        assert_eq!(config.monitor.window_capacity, 120);
        assert_eq!(config.logging.level, "info");

        let actions = config.action_commands();
        assert_eq!(actions, vec![(FixKind::ClearCaches, "sync".to_string())]);
    }

    #[test]
    fn test_save_default_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("medic").join("config.toml");
        MedicConfig::save_default(&path).unwrap();
        let loaded = MedicConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, MedicConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(MedicConfig::load_from_path("/nonexistent/medic.toml").is_err());
    }
}
