use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{check_unit_interval, FlowError};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FlowConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub detection: DetectionConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Tunables for correlation detection.
///
/// Changing a strength constant moves the accept/reject boundary at the
/// default threshold.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    /// Threshold used when a caller does not pass one.
    pub min_strength: f64,
    /// Events within this many seconds of a run's anchor join the run.
    pub temporal_window_secs: i64,
    /// Run strength is `min(1, run_length / temporal_run_scale)`.
    pub temporal_run_scale: f64,
    pub causal_base: f64,
    pub causal_short_gap_secs: i64,
    pub causal_short_bonus: f64,
    pub causal_long_gap_secs: i64,
    pub causal_long_bonus: f64,
    /// Tokens shorter than this (in chars) are ignored for similarity.
    pub semantic_min_token_len: usize,
    pub contextual_file_base: f64,
    pub contextual_file_scale: f64,
    pub contextual_other_base: f64,
    pub contextual_other_scale: f64,
}

/// Bounds for the event window fed into a single correlation run.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CaptureConfig {
    pub window_minutes: i64,
    pub max_events: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_flow_dir()
            .join("flow.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_strength: 0.5,
            temporal_window_secs: 300,
            temporal_run_scale: 10.0,
            causal_base: 0.6,
            causal_short_gap_secs: 30,
            causal_short_bonus: 0.3,
            causal_long_gap_secs: 300,
            causal_long_bonus: 0.1,
            semantic_min_token_len: 3,
            contextual_file_base: 0.7,
            contextual_file_scale: 20.0,
            contextual_other_base: 0.6,
            contextual_other_scale: 30.0,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            window_minutes: 60,
            max_events: 500,
        }
    }
}

impl DetectionConfig {
    /// Reject windows, scales and thresholds that would make detection meaningless.
    pub fn validate(&self) -> Result<(), FlowError> {
        check_unit_interval("min_strength", self.min_strength)?;
        if self.temporal_window_secs <= 0 {
            return Err(FlowError::InvalidArgument(format!(
                "temporal_window_secs must be positive, got {}",
                self.temporal_window_secs
            )));
        }
        if self.causal_short_gap_secs < 0 || self.causal_long_gap_secs < 0 {
            return Err(FlowError::InvalidArgument(
                "causal gap thresholds must not be negative".into(),
            ));
        }
        for (name, scale) in [
            ("temporal_run_scale", self.temporal_run_scale),
            ("contextual_file_scale", self.contextual_file_scale),
            ("contextual_other_scale", self.contextual_other_scale),
        ] {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(FlowError::InvalidArgument(format!(
                    "{name} must be positive, got {scale}"
                )));
            }
        }
        Ok(())
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.window_minutes <= 0 {
            return Err(FlowError::InvalidArgument(format!(
                "window_minutes must be positive, got {}",
                self.window_minutes
            )));
        }
        if self.max_events == 0 {
            return Err(FlowError::InvalidArgument(
                "max_events must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Returns `~/.loci-flow/`
pub fn default_flow_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".loci-flow")
}

/// Returns the default config file path: `~/.loci-flow/config.toml`
pub fn default_config_path() -> PathBuf {
    default_flow_dir().join("config.toml")
}

impl FlowConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            FlowConfig::default()
        };

        config.apply_env_overrides();
        config
            .detection
            .validate()
            .context("invalid [detection] config")?;
        config.capture.validate().context("invalid [capture] config")?;
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (LOCI_FLOW_DB, LOCI_FLOW_LOG_LEVEL, LOCI_FLOW_MIN_STRENGTH).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOCI_FLOW_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("LOCI_FLOW_LOG_LEVEL") {
            self.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("LOCI_FLOW_MIN_STRENGTH") {
            match val.parse::<f64>() {
                Ok(v) => self.detection.min_strength = v,
                Err(_) => warn!(value = %val, "ignoring unparsable LOCI_FLOW_MIN_STRENGTH"),
            }
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    /// Serializes tests that read or write `LOCI_FLOW_*` variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn default_config_is_valid() {
        let config = FlowConfig::default();
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(config.detection.min_strength, 0.5);
        assert_eq!(config.detection.temporal_window_secs, 300);
        assert_eq!(config.capture.max_events, 500);
        assert!(config.storage.db_path.ends_with("flow.db"));
        assert!(config.detection.validate().is_ok());
        assert!(config.capture.validate().is_ok());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[logging]
log_level = "debug"

[storage]
db_path = "/tmp/test-flow.db"

[detection]
min_strength = 0.3
temporal_window_secs = 120
"#;
        let config: FlowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test-flow.db");
        assert_eq!(config.detection.min_strength, 0.3);
        assert_eq!(config.detection.temporal_window_secs, 120);
        // defaults still apply for unset fields
        assert_eq!(config.detection.causal_base, 0.6);
        assert_eq!(config.capture.window_minutes, 60);
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let _env = env_lock();
        let dir = tempfile::tempdir().unwrap();
        let config = FlowConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.capture.window_minutes, 60);
        assert_eq!(config.detection.temporal_run_scale, 10.0);
    }

    #[test]
    fn load_from_rejects_invalid_detection() {
        let _env = env_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[detection]\ntemporal_window_secs = 0\n").unwrap();
        let err = FlowConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("temporal_window_secs"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut detection = DetectionConfig::default();
        detection.min_strength = 1.5;
        assert!(detection.validate().is_err());

        let mut detection = DetectionConfig::default();
        detection.contextual_file_scale = 0.0;
        assert!(detection.validate().is_err());

        let capture = CaptureConfig {
            window_minutes: 10,
            max_events: 0,
        };
        assert!(capture.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let _env = env_lock();
        let mut config = FlowConfig::default();
        std::env::set_var("LOCI_FLOW_DB", "/tmp/override.db");
        std::env::set_var("LOCI_FLOW_LOG_LEVEL", "trace");
        std::env::set_var("LOCI_FLOW_MIN_STRENGTH", "0.25");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.logging.log_level, "trace");
        assert_eq!(config.detection.min_strength, 0.25);

        // Clean up
        std::env::remove_var("LOCI_FLOW_DB");
        std::env::remove_var("LOCI_FLOW_LOG_LEVEL");
        std::env::remove_var("LOCI_FLOW_MIN_STRENGTH");
    }

    #[test]
    fn invalid_env_strength_fails_load() {
        let _env = env_lock();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LOCI_FLOW_MIN_STRENGTH", "1.5");
        let result = FlowConfig::load_from(dir.path().join("absent.toml"));
        std::env::remove_var("LOCI_FLOW_MIN_STRENGTH");

        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("min_strength"));
    }
}
