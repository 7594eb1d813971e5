//! Configuration Loader
//!
//! Environment-aware configuration loading: YAML file discovery, environment
//! detection, and base-plus-override merging.

use super::error::{ConfigResult, ConfigurationError};
use super::BatchEngineConfig;
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const BASE_FILE: &str = "batch-engine.yaml";

/// Loaded configuration plus the context it was resolved in.
pub struct ConfigManager {
    config: BatchEngineConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    ///
    /// Falls back to validated defaults when the default config directory has
    /// no base file, so library consumers without a config tree still get a
    /// working engine.
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        let config_directory = Self::default_config_directory();
        if !config_directory.join(BASE_FILE).exists() {
            debug!(
                directory = %config_directory.display(),
                environment = %environment,
                "no configuration file present, using defaults"
            );
            let config = BatchEngineConfig::default();
            config.validate()?;
            return Ok(Arc::new(ConfigManager {
                config,
                environment,
                config_directory,
            }));
        }
        Self::load_from_directory_with_env(Some(config_directory), &environment)
    }

    /// Load configuration from a specific directory.
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with an explicit
    /// environment, for callers (and tests) that must not touch process-wide
    /// environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "loading configuration"
        );

        let config = Self::load_and_merge(&config_directory, environment)?;
        config.validate()?;

        debug!(
            config = %serde_json::to_string(&config)
                .unwrap_or_else(|_| "[serialization error]".to_string()),
            "configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// The loaded configuration.
    pub fn config(&self) -> &BatchEngineConfig {
        &self.config
    }

    /// Environment the configuration was resolved for.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Directory the configuration was loaded from.
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the active environment from `BATCH_ENGINE_ENV` or `APP_ENV`.
    pub fn detect_environment() -> String {
        env::var("BATCH_ENGINE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        PathBuf::from("config")
    }

    fn override_file(environment: &str) -> String {
        format!("batch-engine.{environment}.yaml")
    }

    fn load_and_merge(directory: &Path, environment: &str) -> ConfigResult<BatchEngineConfig> {
        let base_path = directory.join(BASE_FILE);
        if !base_path.exists() {
            return Err(ConfigurationError::file_not_found(
                base_path.display().to_string(),
            ));
        }
        let mut merged = Self::read_yaml(&base_path)?;

        let override_path = directory.join(Self::override_file(environment));
        if override_path.exists() {
            let overrides = Self::read_yaml(&override_path)?;
            Self::merge_values(&mut merged, overrides);
            debug!(
                file = %override_path.display(),
                "applied environment overrides"
            );
        }

        serde_yaml::from_value(merged).map_err(|e| {
            ConfigurationError::parse(base_path.display().to_string(), e.to_string())
        })
    }

    fn read_yaml(path: &Path) -> ConfigResult<YamlValue> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::file_read(path.display().to_string(), e.to_string())
        })?;
        serde_yaml::from_str(&raw)
            .map_err(|e| ConfigurationError::parse(path.display().to_string(), e.to_string()))
    }

    /// Merge `overrides` into `base`: mappings merge key-by-key, everything
    /// else (sequences included) is replaced wholesale.
    fn merge_values(base: &mut YamlValue, overrides: YamlValue) {
        match (base, overrides) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    match base_map.get_mut(&key) {
                        Some(existing) => Self::merge_values(existing, value),
                        None => {
                            base_map.insert(key, value);
                        }
                    }
                }
            }
            (base_slot, value) => *base_slot = value,
        }
    }
}
