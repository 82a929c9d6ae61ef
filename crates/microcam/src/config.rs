//! Configuration management for microcam.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name under the user's config directory.
const APP_DIR_NAME: &str = "microcam";

/// Prefix for nested environment overrides, e.g. `MICROCAM_SERVER__BIND_ADDR`.
const ENV_PREFIX: &str = "MICROCAM_";

/// Environment variable that selects the storage directory.
pub const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";

/// Storage directory used when nothing else is configured.
pub const DEFAULT_UPLOAD_DIR: &str = "/data";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. `UPLOAD_DIR` (storage directory only)
/// 2. Environment variables prefixed with `MICROCAM_`, nested with `__`
/// 3. TOML config file at `~/.config/microcam/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Frame storage configuration.
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: String,
    /// Largest request body accepted by the upload endpoint, in bytes.
    pub max_upload_bytes: usize,
}

/// Frame storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory that receives frames and the latest pointer.
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
        }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// A config file that does not exist is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        Self::from_figment(Self::figment(&config_file))
    }

    /// Load and validate one specific config file.
    ///
    /// Unlike [`Config::load_from`], a file that does not exist is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file is missing, or the
    /// loading and validation errors of [`Config::load_from`].
    pub fn check_file(config_file: &Path) -> Result<Self> {
        if !config_file.is_file() {
            return Err(Error::ConfigNotFound {
                path: config_file.to_path_buf(),
            });
        }
        Self::from_figment(Self::figment(config_file))
    }

    /// Build the layered figment for the given config file.
    #[must_use]
    pub fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(
                Env::raw()
                    .only(&[UPLOAD_DIR_ENV])
                    .map(|_| "storage.upload_dir".into()),
            )
    }

    /// Extract and validate a configuration from a prepared figment.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "server.bind_addr ({}) is not a valid socket address",
                    self.server.bind_addr
                ),
            });
        }

        if self.server.max_upload_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "server.max_upload_bytes must be greater than 0".to_string(),
            });
        }

        if self.storage.upload_dir.as_os_str().is_empty() {
            return Err(Error::ConfigValidation {
                message: "storage.upload_dir must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the bind address as a socket address.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .map_err(|e| Error::ConfigValidation {
                message: format!("server.bind_addr ({}): {e}", self.server.bind_addr),
            })
    }

    /// Get the storage directory.
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.storage.upload_dir
    }
}
