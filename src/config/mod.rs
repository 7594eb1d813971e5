//! # Engine Configuration
//!
//! YAML-backed configuration with environment-specific overrides and explicit
//! validation. A base `batch-engine.yaml` is merged with an optional
//! `batch-engine.{environment}.yaml` override; nothing falls back silently to
//! environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use batch_engine::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let threads = manager.config().execution.worker_threads;
//! let attempts = manager.config().backoff.max_attempts;
//! # let _ = (threads, attempts);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration mirroring `batch-engine.yaml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchEngineConfig {
    /// Dispatch and batching settings.
    pub execution: ExecutionConfig,

    /// Retry pacing for rolled-back batches.
    pub backoff: BackoffConfig,

    /// Logging and event settings.
    pub telemetry: TelemetryConfig,
}

impl BatchEngineConfig {
    /// Validate the configuration, rejecting values the engine cannot run
    /// with rather than papering over them.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.execution.worker_threads == 0 {
            return Err(ConfigurationError::invalid(
                "execution.worker_threads must be at least 1",
            ));
        }
        if self.execution.batch_size == 0 {
            return Err(ConfigurationError::invalid(
                "execution.batch_size must be at least 1",
            ));
        }
        if self.execution.progress_interval == 0 {
            return Err(ConfigurationError::invalid(
                "execution.progress_interval must be at least 1",
            ));
        }
        if self.execution.event_channel_capacity == 0 {
            return Err(ConfigurationError::invalid(
                "execution.event_channel_capacity must be at least 1",
            ));
        }
        if self.backoff.max_attempts == 0 {
            return Err(ConfigurationError::invalid(
                "backoff.max_attempts must be at least 1",
            ));
        }
        if self.backoff.default_backoff_ms.is_empty() {
            return Err(ConfigurationError::invalid(
                "backoff.default_backoff_ms must list at least one delay",
            ));
        }
        if self.backoff.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid(
                "backoff.backoff_multiplier must be at least 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter_max_percentage) {
            return Err(ConfigurationError::invalid(
                "backoff.jitter_max_percentage must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

/// Dispatch and batching configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Number of batches processed concurrently in split-transaction mode.
    pub worker_threads: usize,

    /// Number of items processed per transaction.
    pub batch_size: usize,

    /// Number of processed entries between progress reports.
    pub progress_interval: u64,

    /// Capacity of the lifecycle event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            batch_size: 25,
            progress_interval: 100,
            event_channel_capacity: 1024,
        }
    }
}

/// Backoff and retry configuration for rolled-back batches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Attempts per batch, including the first.
    pub max_attempts: u32,

    /// Explicit delays (ms) for the first failures; later attempts grow the
    /// last entry by `backoff_multiplier`.
    pub default_backoff_ms: Vec<u64>,

    /// Upper bound (ms) on any computed delay.
    pub max_backoff_ms: u64,

    /// Growth factor once the explicit delay sequence is exhausted.
    pub backoff_multiplier: f64,

    /// Whether to add proportional jitter to delays.
    pub jitter_enabled: bool,

    /// Maximum jitter as a fraction of the base delay (0.0 to 1.0).
    pub jitter_max_percentage: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            default_backoff_ms: vec![50, 100, 250, 500],
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_enabled: true,
            jitter_max_percentage: 0.1,
        }
    }
}

/// Logging and telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Mirror logs to a JSON file under `log_directory`.
    pub structured_file_logging: bool,

    /// Directory receiving JSON log files.
    pub log_directory: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            structured_file_logging: false,
            log_directory: "log".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(BatchEngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_worker_threads() {
        let mut config = BatchEngineConfig::default();
        config.execution.worker_threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let mut config = BatchEngineConfig::default();
        config.execution.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_backoff_sequence() {
        let mut config = BatchEngineConfig::default();
        config.backoff.default_backoff_ms.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_jitter() {
        let mut config = BatchEngineConfig::default();
        config.backoff.jitter_max_percentage = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: BatchEngineConfig =
            serde_yaml::from_str("execution:\n  batch_size: 10\n").unwrap();
        assert_eq!(config.execution.batch_size, 10);
        assert_eq!(config.execution.worker_threads, 4);
        assert_eq!(config.backoff.max_attempts, 10);
    }
}
