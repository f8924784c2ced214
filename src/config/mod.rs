mod namespace;

pub use namespace::{canonicalize_display, Namespace};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use directories::BaseDirs;

use crate::error::{AcmeError, Result};
use crate::fs::DEFAULT_MOUNT;
use crate::window::DEFAULT_QUEUE_CAPACITY;

const CONFIG_DIR: &str = "acmectl";
const MAIN_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub connection: ConnectionConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Where the editor's file tree is mounted.
    pub mount: Option<PathBuf>,
    /// Overrides `$NAMESPACE` / `$DISPLAY` resolution.
    pub namespace: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub queue_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl ClientConfig {
    /// `<config_dir>/acmectl/config.toml`, when a config directory exists.
    pub fn config_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join(CONFIG_DIR).join(MAIN_CONFIG_FILE))
    }

    /// Loads the default config file. A missing or broken file yields the
    /// defaults; a broken one is also reported as a warning.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_lenient(&path),
            None => {
                tracing::debug!("No config directory, using defaults");
                Self::default()
            }
        }
    }

    /// Loads a file the user named explicitly; every failure is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AcmeError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AcmeError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AcmeError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn load_lenient(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.events.queue_capacity == 0 {
            return Err(AcmeError::Config("events.queue_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Mount point of the editor's file tree: the command-line override,
    /// then the config file, then `/mnt/acme`.
    pub fn mount_point(&self, cli_override: Option<&Path>) -> PathBuf {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.connection.mount.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MOUNT))
    }

    /// The configured namespace, or the one the environment describes.
    pub fn namespace(&self) -> Result<Namespace> {
        match &self.connection.namespace {
            Some(dir) => Namespace::resolve(dir.to_str(), None, ""),
            None => Namespace::from_env(),
        }
    }
}
