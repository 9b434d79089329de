//! Worker configuration.
//!
//! The canonical configuration lives in `vizsession-config.yaml` at the
//! working directory. Every section and field has a default, so a missing
//! file or a partial file is valid.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use vizsession_cache::CacheConfig;
use vizsession_core::SessionConfig;
use vizsession_loader::LayoutConfig;
use vizsession_server::ServerConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override has an unusable value.
    #[error("invalid value for {name}: {value:?}")]
    Env {
        /// Variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,
    /// Cache namespace eviction policies.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Workbook backing store.
    #[serde(default)]
    pub store: StoreConfig,
    /// Layout simulation parameters.
    #[serde(default)]
    pub simulation: LayoutConfig,
    /// Session pipeline settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Snapshot export destination.
    #[serde(default)]
    pub publish: PublishConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Env`] for an unusable override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply `VIZSESSION_PORT` and `DRAGONFLY_URL` from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if `VIZSESSION_PORT` is not a port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if `VIZSESSION_PORT` is not a port.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("VIZSESSION_PORT") {
            self.server.port = value.parse().map_err(|_| ConfigError::Env {
                name: "VIZSESSION_PORT",
                value,
            })?;
        }
        if let Some(value) = lookup("DRAGONFLY_URL") {
            self.store.dragonfly_url = value;
        }
        Ok(())
    }
}

/// Which backing store holds workbook documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store seeded from a directory of JSON documents.
    #[default]
    Memory,
    /// `Dragonfly` (Redis-compatible) server.
    Dragonfly,
}

/// Backing store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Which store to use.
    #[serde(default)]
    pub backend: StoreBackend,
    /// `Dragonfly` URL, for the `dragonfly` backend.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,
    /// Directory of workbook JSON documents, for the `memory` backend.
    #[serde(default)]
    pub seed_dir: Option<PathBuf>,
}

fn default_dragonfly_url() -> String {
    String::from("redis://localhost:6379")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            dragonfly_url: default_dragonfly_url(),
            seed_dir: None,
        }
    }
}

/// Snapshot export settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishConfig {
    /// Directory snapshots are written under.
    #[serde(default = "default_publish_root")]
    pub root: PathBuf,
    /// Path prefix inside the root.
    #[serde(default)]
    pub prefix: String,
}

fn default_publish_root() -> PathBuf {
    PathBuf::from("published")
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            root: default_publish_root(),
            prefix: String::new(),
        }
    }
}
