//! TOML-based configuration for Quarry.
//!
//! Supports a config file (quarry.toml) with environment variable expansion
//! in path values.
//!
//! Example configuration:
//! ```toml
//! catalog = "${QUARRY_HOME}/catalog.toml"
//!
//! [compiler]
//! join_strategy = "shortest_path"
//! group_by = "explicit"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! include_sql = true
//!
//! [storage]
//! reports_file = "${HOME}/.quarry/saved_reports.json"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{CatalogError, EntityRegistry};
use crate::planner::CompileOptions;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Failed to load catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Catalog document to load instead of the built-in catalog.
    pub catalog: Option<String>,

    /// Compiler knobs.
    pub compiler: CompileOptions,

    /// HTTP server configuration.
    pub server: ServerSettings,

    /// Saved-report storage.
    pub storage: StorageSettings,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,

    /// Echo compiled SQL in compile responses.
    pub include_sql: bool,

    /// Development mode. Implies `include_sql`.
    pub dev_mode: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            include_sql: false,
            dev_mode: false,
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn exposes_sql(&self) -> bool {
        self.include_sql || self.dev_mode
    }
}

/// Saved-report storage.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON file holding saved reports (supports ${ENV_VAR} expansion).
    pub reports_file: Option<String>,
}

impl StorageSettings {
    /// The reports file with environment variables expanded.
    ///
    /// Defaults to `<data dir>/quarry/saved_reports.json`, or
    /// `./saved_reports.json` when the platform has no data directory.
    pub fn resolved_reports_file(&self) -> Result<PathBuf, SettingsError> {
        if let Some(path) = &self.reports_file {
            return Ok(PathBuf::from(expand_env_vars(path)?));
        }
        Ok(dirs::data_dir()
            .map(|dir| dir.join("quarry").join("saved_reports.json"))
            .unwrap_or_else(|| PathBuf::from("saved_reports.json")))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `QUARRY_CONFIG`
    /// 2. `./quarry.toml`
    /// 3. `~/.config/quarry/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("QUARRY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("quarry.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("quarry").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// The catalog path with environment variables expanded.
    pub fn catalog_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.catalog
            .as_deref()
            .map(|path| expand_env_vars(path).map(PathBuf::from))
            .transpose()
    }

    /// Load the configured catalog, or clone the built-in one.
    pub fn registry(&self) -> Result<EntityRegistry, SettingsError> {
        match self.catalog_path()? {
            Some(path) => Ok(EntityRegistry::from_file(path)?),
            None => Ok(EntityRegistry::builtin().clone()),
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
