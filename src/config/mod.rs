//! Configuration module for Quarry.
//!
//! Handles the settings file, environment variables and catalog selection.

mod settings;

pub use settings::{expand_env_vars, ServerSettings, Settings, SettingsError, StorageSettings};
