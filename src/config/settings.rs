//! TOML-based configuration for labdb.
//!
//! Supports a config file (labdb.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [storage]
//! dir = "${LABDB_STORAGE_DIR}"
//! database_name = "labdb"
//!
//! [schema]
//! expected_version = 2
//!
//! [assets]
//! snapshot_path = "assets/labdb-snapshot.sqlite3"
//! schema_path = "assets/schema.sql"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Schema version this build of the application expects to find in the
/// database's version marker. Bump together with the schema artifact.
pub const SCHEMA_VERSION: i64 = 2;

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

    #[error("Failed to determine data directory")]
    NoDataDir,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Storage sandbox configuration.
    pub storage: StorageSettings,

    /// Schema versioning configuration.
    pub schema: SchemaSettings,

    /// Bootstrap asset locations.
    pub assets: AssetSettings,
}

/// Storage sandbox configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Storage directory (supports ${ENV_VAR} expansion). Defaults to the
    /// platform data directory.
    pub dir: Option<String>,

    /// Database file stem inside the storage directory.
    pub database_name: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: None,
            database_name: "labdb".to_string(),
        }
    }
}

impl StorageSettings {
    /// Resolve the storage directory, expanding environment variables.
    pub fn resolved_dir(&self) -> Result<PathBuf, SettingsError> {
        match &self.dir {
            Some(dir) => Ok(PathBuf::from(expand_env_vars(dir)?)),
            None => {
                let base = dirs::data_dir().ok_or(SettingsError::NoDataDir)?;
                Ok(base.join("labdb"))
            }
        }
    }
}

/// Schema versioning configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Version the application expects in the database's version marker.
    pub expected_version: i64,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            expected_version: SCHEMA_VERSION,
        }
    }
}

/// Bootstrap asset locations, served by the host's asset fetcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Well-known path of the prebuilt binary database snapshot.
    pub snapshot_path: String,

    /// Well-known path of the plain-text schema definition, used only when
    /// the snapshot is unavailable.
    pub schema_path: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            snapshot_path: "assets/labdb-snapshot.sqlite3".to_string(),
            schema_path: "assets/schema.sql".to_string(),
        }
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
    /// 1. Environment variable `LABDB_CONFIG`
    /// 2. `./labdb.toml`
    /// 3. `~/.config/labdb/config.toml`
    ///
    /// Returns defaults when no config file is found.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("LABDB_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("labdb.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("labdb").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

/// Expand `${VAR}` and `$VAR` references against the process environment.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            // Check for ${VAR} or $VAR
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(chars.next().unwrap());
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // Just a lone $, keep it
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}
