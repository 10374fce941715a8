//! Configuration for the Workbench configurator service.
//!
//! Loaded from `workbench.json`. Every key is optional; missing keys take
//! the defaults below.
//!
//! ```json
//! {
//!   "appId": "default-app-id",
//!   "storeDir": ".workbench/store",
//!   "generation": { "apiKey": "...", "maxAttempts": 3 },
//!   "statusTtlSecs": 5
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::generation::RetryPolicy;

/// The default config file name.
const CONFIG_FILE_NAME: &str = "workbench.json";

fn default_app_id() -> String {
    "default-app-id".to_string()
}

fn default_store_dir() -> Option<String> {
    Some(".workbench/store".to_string())
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash-preview-09-2025".to_string()
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_attempt_timeout_secs() -> u64 {
    30
}

const fn default_status_ttl_secs() -> u64 {
    5
}

/// Main configuration for the configurator service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Namespace for every stored document.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Root directory of the file-backed store.
    ///
    /// `null` keeps documents in memory for the lifetime of the process.
    #[serde(default = "default_store_dir")]
    pub store_dir: Option<String>,

    /// Token used for sign-in instead of an anonymous session.
    #[serde(default)]
    pub initial_auth_token: Option<String>,

    /// Generation API settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Seconds a status message stays visible.
    #[serde(default = "default_status_ttl_secs")]
    pub status_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            store_dir: default_store_dir(),
            initial_auth_token: None,
            generation: GenerationConfig::default(),
            status_ttl_secs: default_status_ttl_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            AppError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `workbench.json` from a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigParseError` for unreadable files or invalid
    /// JSON, and `AppError::ConfigValidationError` for out-of-range values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(AppError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| AppError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() || self.app_id.contains('/') {
            return Err(AppError::config_validation(
                "appId must be a non-empty name without '/'",
                "Set appId to a simple identifier in your workbench.json",
            ));
        }

        if self
            .store_dir
            .as_deref()
            .is_some_and(|dir| dir.trim().is_empty())
        {
            return Err(AppError::config_validation(
                "storeDir must not be empty",
                "Remove storeDir to use the default, or set it to null to keep data in memory",
            ));
        }

        if self.generation.max_attempts == 0 {
            return Err(AppError::config_validation(
                "generation.maxAttempts must be greater than 0",
                "Set generation.maxAttempts to at least 1 in your workbench.json",
            ));
        }

        if self.generation.attempt_timeout_secs == 0 {
            return Err(AppError::config_validation(
                "generation.attemptTimeoutSecs must be greater than 0",
                "Set generation.attemptTimeoutSecs to at least 1 second in your workbench.json",
            ));
        }

        if self.status_ttl_secs == 0 {
            return Err(AppError::config_validation(
                "statusTtlSecs must be greater than 0",
                "Set statusTtlSecs to at least 1 second in your workbench.json",
            ));
        }

        Ok(())
    }

    /// Returns how long a status message stays visible.
    #[must_use]
    pub const fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }
}

/// Settings for the generative-language API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// API origin, without a trailing path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name used in the request path.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key sent as the `key` query parameter.
    #[serde(default)]
    pub api_key: String,

    /// Total attempts per generation request.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each following retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on a single attempt.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: String::new(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    /// Builds the retry policy described by these settings.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}
