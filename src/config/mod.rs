//! Configuration module for text2sql.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{expand_env_vars, ServerSettings, Settings, SettingsError};
