//! ABOUTME: Typed engine configuration, covering every knob the executor and planner consult
//! ABOUTME: Layered defaults -> TOML file -> `AGENTFLOW_*` environment overrides

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    InvalidOverride { key: String, message: String },
}

/// Every tunable knob the executor, planner, and runner consult, with
/// production-sane defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_steps: usize,
    pub max_duration_ms: u64,
    pub max_parallel_steps: usize,
    pub auto_checkpoint: bool,
    pub checkpoint_interval: usize,
    pub max_checkpoints: usize,
    pub default_retry_attempts: u32,
    pub default_retry_delay_ms: u64,
    pub require_confirmation_for_destructive: bool,
    pub dry_run_by_default: bool,
    pub verbose_logging: bool,
    pub log_retention_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            max_duration_ms: 300_000,
            max_parallel_steps: 5,
            auto_checkpoint: true,
            checkpoint_interval: 5,
            max_checkpoints: 10,
            default_retry_attempts: 3,
            default_retry_delay_ms: 1000,
            require_confirmation_for_destructive: true,
            dry_run_by_default: false,
            verbose_logging: false,
            log_retention_days: 7,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    #[must_use]
    pub fn log_retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.log_retention_days) * 24 * 3600)
    }

    /// Load defaults, then overlay a TOML file if it exists, then overlay
    /// `AGENTFLOW_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = path {
            config = Self::from_file(path)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overlays `AGENTFLOW_<SCREAMING_SNAKE_KEY>` environment variables,
    /// e.g. `AGENTFLOW_MAX_PARALLEL_STEPS=8`. Unparseable values are
    /// logged and ignored rather than aborting startup, matching the
    /// teacher's tolerant env-override behavior.
    pub fn apply_env_overrides(&mut self) {
        macro_rules! override_parsed {
            ($field:ident, $env_key:literal) => {
                if let Ok(raw) = std::env::var(concat!("AGENTFLOW_", $env_key)) {
                    match raw.parse() {
                        Ok(value) => self.$field = value,
                        Err(_) => {
                            tracing::warn!(
                                key = concat!("AGENTFLOW_", $env_key),
                                value = %raw,
                                "ignoring unparseable environment override"
                            );
                        }
                    }
                }
            };
        }

        override_parsed!(max_steps, "MAX_STEPS");
        override_parsed!(max_duration_ms, "MAX_DURATION_MS");
        override_parsed!(max_parallel_steps, "MAX_PARALLEL_STEPS");
        override_parsed!(auto_checkpoint, "AUTO_CHECKPOINT");
        override_parsed!(checkpoint_interval, "CHECKPOINT_INTERVAL");
        override_parsed!(max_checkpoints, "MAX_CHECKPOINTS");
        override_parsed!(default_retry_attempts, "DEFAULT_RETRY_ATTEMPTS");
        override_parsed!(default_retry_delay_ms, "DEFAULT_RETRY_DELAY_MS");
        override_parsed!(
            require_confirmation_for_destructive,
            "REQUIRE_CONFIRMATION_FOR_DESTRUCTIVE"
        );
        override_parsed!(dry_run_by_default, "DRY_RUN_BY_DEFAULT");
        override_parsed!(verbose_logging, "VERBOSE_LOGGING");
        override_parsed!(log_retention_days, "LOG_RETENTION_DAYS");
    }
}
