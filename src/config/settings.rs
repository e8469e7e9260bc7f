//! TOML-based configuration for dashq.
//!
//! Supports a config file (dashq.toml) with environment variable expansion
//! in paths.
//!
//! Example configuration:
//! ```toml
//! [database]
//! path = "${DASHQ_DATA}/superstore.db"
//! pool_size = 4
//! statement_timeout_ms = 30000
//! checkout_timeout_ms = 5000
//!
//! [execution]
//! retry_backoff_ms = 200
//!
//! [filters]
//! date = "order_date"
//! segment = "segment"
//! region = "region"
//! category = "category"
//!
//! [cache]
//! enabled = true
//!
//! [templates]
//! include_standard = true
//! files = ["./templates/extra.toml"]
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::filter::FilterColumns;
use crate::gateway::{GatewayOptions, StoreOptions};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DASHQ_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub execution: ExecutionSettings,
    pub filters: FilterColumns,
    pub cache: CacheSettings,
    pub templates: TemplateSettings,
}

/// The SQLite database holding the dataset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file or `file:` URI (supports ${ENV_VAR} expansion).
    pub path: String,

    /// Maximum pooled connections.
    pub pool_size: u32,

    /// Per-statement time budget.
    pub statement_timeout_ms: u64,

    /// How long to wait for a pooled connection.
    pub checkout_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "data/superstore.db".to_string(),
            pool_size: 4,
            statement_timeout_ms: 30_000,
            checkout_timeout_ms: 5_000,
        }
    }
}

impl DatabaseSettings {
    /// The path with environment variables expanded.
    pub fn resolved_path(&self) -> SettingsResult<PathBuf> {
        Ok(PathBuf::from(expand_env_vars(&self.path)?))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Pause before retrying a lost connection.
    pub retry_backoff_ms: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            retry_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Where templates come from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Register the built-in Superstore templates.
    pub include_standard: bool,

    /// Extra template files (support ${ENV_VAR} expansion).
    pub files: Vec<String>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            include_standard: true,
            files: Vec::new(),
        }
    }
}

impl TemplateSettings {
    pub fn resolved_files(&self) -> SettingsResult<Vec<PathBuf>> {
        self.files
            .iter()
            .map(|f| expand_env_vars(f).map(PathBuf::from))
            .collect()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SettingsResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn parse(content: &str) -> SettingsResult<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DASHQ_CONFIG`
    /// 2. `./dashq.toml`
    /// 3. `<config dir>/dashq/config.toml`
    pub fn load() -> SettingsResult<Self> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("dashq.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dashq").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Load an explicit file if given, otherwise search the default locations.
    pub fn load_from(path: Option<&Path>) -> SettingsResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::load(),
        }
    }

    pub fn validate(&self) -> SettingsResult<()> {
        if self.database.pool_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        if self.database.statement_timeout_ms == 0 {
            return Err(SettingsError::InvalidConfig(
                "database.statement_timeout_ms must be positive".to_string(),
            ));
        }
        self.filters
            .validate()
            .map_err(|e| SettingsError::InvalidConfig(e.to_string()))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            pool_size: self.database.pool_size,
            checkout_timeout: Duration::from_millis(self.database.checkout_timeout_ms),
        }
    }

    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            statement_timeout: Duration::from_millis(self.database.statement_timeout_ms),
            retry_backoff: Duration::from_millis(self.execution.retry_backoff_ms),
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> SettingsResult<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let mut name = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                name.push(ch);
            }
            if !closed {
                return Err(SettingsError::InvalidConfig(format!(
                    "unterminated variable reference in '{}'",
                    s
                )));
            }
            name
        } else {
            std::iter::from_fn(|| chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_')).collect()
        };

        if var_name.is_empty() {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
