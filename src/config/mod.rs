//! Configuration module for labdb.
//!
//! Handles storage, schema-version and bootstrap-asset settings.

mod settings;

pub use settings::{
    expand_env_vars, AssetSettings, SchemaSettings, Settings, SettingsError, StorageSettings,
    SCHEMA_VERSION,
};
