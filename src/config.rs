use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::gateway::{NetworkRegistry, DEFAULT_NETWORK};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "movekit.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub network: NetworkConfig,
    pub tracker: TrackerConfig,
    pub logging: LoggingConfig,
}

/// RPC client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Network selection and endpoint overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network used when a command does not name one
    pub default: String,
    /// Extra or overridden network profiles, name -> base URL
    pub endpoints: BTreeMap<String, String>,
}

/// Event tracker defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Module filter applied when --module is not given
    pub default_module: String,
    /// Delay between poll cycles in milliseconds
    pub poll_interval_ms: u64,
    /// Transactions requested per poll
    pub page_limit: u32,
    /// SQLite file for persisted watermarks; disabled when unset
    pub cursor_db: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_NETWORK.to_string(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_module: crate::tracker::DEFAULT_MODULE.to_string(),
            poll_interval_ms: crate::tracker::DEFAULT_POLL_INTERVAL_MS,
            page_limit: crate::tracker::DEFAULT_PAGE_LIMIT,
            cursor_db: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables take precedence over file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit file, falling back to CONFIG_FILE or movekit.toml
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load_from_file()?,
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the implicit configuration file; a missing file yields defaults
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        Self::load_from_path(Path::new(&config_path))
    }

    /// Load a TOML file that must exist
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(network) = env::var("MOVEKIT_NETWORK") {
            self.network.default = network;
        }
        if let Ok(timeout) = env::var("RPC_TIMEOUT_SECONDS") {
            self.rpc.timeout_seconds = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RPC_TIMEOUT_SECONDS".to_string(),
                value: timeout,
            })?;
        }

        if let Ok(interval) = env::var("TRACK_INTERVAL_MS") {
            self.tracker.poll_interval_ms = interval.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TRACK_INTERVAL_MS".to_string(),
                value: interval,
            })?;
        }
        if let Ok(limit) = env::var("TRACK_PAGE_LIMIT") {
            self.tracker.page_limit = limit.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TRACK_PAGE_LIMIT".to_string(),
                value: limit,
            })?;
        }
        if let Ok(cursor_db) = env::var("TRACK_CURSOR_DB") {
            self.tracker.cursor_db = Some(cursor_db);
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.timeout_seconds == 0 || self.rpc.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.timeout_seconds".to_string(),
                value: self.rpc.timeout_seconds.to_string(),
            });
        }

        if self.network.default.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "network.default".to_string(),
                value: self.network.default.clone(),
            });
        }

        for (name, url) in &self.network.endpoints {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "network.endpoints".to_string(),
                    value: url.clone(),
                });
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }

        if self.tracker.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tracker.poll_interval_ms".to_string(),
                value: self.tracker.poll_interval_ms.to_string(),
            });
        }

        if self.tracker.page_limit == 0 || self.tracker.page_limit > 1000 {
            return Err(ConfigError::InvalidValue {
                key: "tracker.page_limit".to_string(),
                value: self.tracker.page_limit.to_string(),
            });
        }

        if self.tracker.default_module.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "tracker.default_module".to_string(),
                value: self.tracker.default_module.clone(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// Network registry with the built-in profiles plus configured endpoints
    pub fn network_registry(&self) -> NetworkRegistry {
        let mut registry = NetworkRegistry::new();
        for (name, url) in &self.network.endpoints {
            registry.set_custom_endpoint(name, url);
        }
        registry
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}
