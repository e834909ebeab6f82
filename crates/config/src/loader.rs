//! Configuration loading from multiple sources

use crate::{AppConfig, ConfigError, Result, ENV_PREFIX};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Configuration loader with support for multiple formats and sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Supports TOML, YAML, and JSON formats based on file extension
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading config file");

        match extension {
            "toml" => Self::from_toml(&content),
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}",
                extension
            ))),
        }
    }

    pub fn from_toml(content: &str) -> Result<AppConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_yaml(content: &str) -> Result<AppConfig> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_json(content: &str) -> Result<AppConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from environment variables with the default prefix
    pub fn from_env() -> Result<AppConfig> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load configuration from environment variables with custom prefix
    ///
    /// Variables look like `PREFIX_SECTION__KEY`, for example
    /// `ORDER_DISPATCH_SERVER__PORT=8080`. Unset keys keep their defaults.
    pub fn from_env_with_prefix(prefix: &str) -> Result<AppConfig> {
        Self::builder().add_env(prefix).build()
    }

    /// Merge two configurations, with overlay taking precedence
    ///
    /// Sections are taken whole from the overlay. Drivers are combined; an
    /// overlay entry replaces a base entry with the same phone.
    pub fn merge(base: AppConfig, overlay: AppConfig) -> AppConfig {
        let mut drivers = base.drivers;
        for driver in overlay.drivers {
            match drivers.iter_mut().find(|d| d.phone == driver.phone) {
                Some(existing) => *existing = driver,
                None => drivers.push(driver),
            }
        }

        AppConfig {
            server: overlay.server,
            store: overlay.store,
            dispatch: overlay.dispatch,
            notifier: overlay.notifier,
            drivers,
        }
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Only variables that are actually set override file values.
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<AppConfig> {
        if !path.exists() {
            return Err(ConfigError::LoadError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::builder().add_file(path, true).add_env(env_prefix).build()
    }

    /// Build configuration using the config crate's builder pattern
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder {
            builder: Config::builder(),
        }
    }
}

/// Builder for layered configuration; later sources win
pub struct ConfigLoaderBuilder {
    builder: ConfigBuilder<config::builder::DefaultState>,
}

impl ConfigLoaderBuilder {
    /// Add a configuration file source
    pub fn add_file(mut self, path: &Path, required: bool) -> Self {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };

        self.builder = self
            .builder
            .add_source(File::from(path).format(format).required(required));
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        self
    }

    /// Set a default value for a key
    pub fn set_default(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_default(key, value)?;
        Ok(self)
    }

    /// Set a value that overrides every source
    pub fn set_override(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<AppConfig> {
        let config = self.builder.build()?;
        config.try_deserialize().map_err(ConfigError::from)
    }
}
