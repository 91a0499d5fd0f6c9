//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles YAML file discovery,
//! environment detection, overlay merging, and environment-variable
//! overrides. A missing config file falls back to defaults; a malformed
//! one is a startup error.

use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{ConfigResult, ConfigurationError};
use super::RegistryCoreConfig;

const BASE_CONFIG_FILE: &str = "registry-core.yaml";

/// Loaded configuration plus the context it was resolved in
pub struct ConfigManager {
    config: RegistryCoreConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let mut config = Self::load_and_merge_config(&config_directory, environment)?;
        Self::apply_env_overrides(&mut config);

        config.validate()?;

        debug!(
            environment = %environment,
            upstream = %config.upstream.base_url,
            shared_tier = config.cache.redis_url.is_some(),
            "✅ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &RegistryCoreConfig {
        &self.config
    }

    /// Get the environment this configuration was loaded for
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the directory configuration was loaded from
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment from environment variables
    fn detect_environment() -> String {
        env::var("REGISTRY_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        PathBuf::from("config")
    }

    /// Read the base YAML file, merge the environment overlay on top, and
    /// deserialize the result. A missing base file yields defaults.
    fn load_and_merge_config(
        config_dir: &Path,
        environment: &str,
    ) -> ConfigResult<RegistryCoreConfig> {
        let base_path = config_dir.join(BASE_CONFIG_FILE);
        if !base_path.exists() {
            warn!(
                path = %base_path.display(),
                "Config file not found, using built-in defaults"
            );
            return Ok(RegistryCoreConfig::default());
        }

        let mut merged = Self::read_yaml_file(&base_path)?;

        let overlay_path =
            config_dir.join(format!("registry-core.{environment}.yaml"));
        if overlay_path.exists() {
            let overlay = Self::read_yaml_file(&overlay_path)?;
            Self::merge_yaml(&mut merged, overlay);
            debug!(overlay = %overlay_path.display(), "Merged environment overlay");
        }

        serde_yaml::from_value(merged)
            .map_err(|e| ConfigurationError::parse_error(base_path.display().to_string(), e.to_string()))
    }

    fn read_yaml_file(path: &Path) -> ConfigResult<YamlValue> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigurationError::parse_error(path.display().to_string(), e.to_string()))
    }

    /// Recursively merge `overlay` into `base`; overlay scalars win
    fn merge_yaml(base: &mut YamlValue, overlay: YamlValue) {
        match (base, overlay) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
                for (key, overlay_value) in overlay_map {
                    match base_map.get_mut(&key) {
                        Some(base_value) => Self::merge_yaml(base_value, overlay_value),
                        None => {
                            base_map.insert(key, overlay_value);
                        }
                    }
                }
            }
            (base_slot, overlay_value) => *base_slot = overlay_value,
        }
    }

    /// Apply environment-variable overrides on top of file configuration
    fn apply_env_overrides(config: &mut RegistryCoreConfig) {
        if let Ok(url) = env::var("REGISTRY_UPSTREAM_URL") {
            config.upstream.base_url = url;
        }
        if let Ok(url) = env::var("REGISTRY_REDIS_URL") {
            config.cache.redis_url = Some(url);
        }
    }
}
