//! Configuration module for dashq.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CacheSettings, DatabaseSettings, ExecutionSettings, Settings,
    SettingsError, SettingsResult, TemplateSettings, CONFIG_ENV,
};
