//! hs-project: simulator configuration file format, overrides and validation.

pub mod pairs;
pub mod schema;
pub mod validate;

pub use pairs::{NameValueTable, apply_overrides, to_pairs};
pub use schema::*;
pub use validate::{ValidationError, validate_config};

use std::path::{Path, PathBuf};

pub const LATEST_VERSION: u32 = 1;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown configuration parameter: {name}")]
    UnknownParameter { name: String },

    #[error("Invalid format for configuration parameter {name}: {value:?} ({reason})")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Malformed override {text:?}: expected name=value")]
    MalformedOverride { text: String },
}

/// Load a config file, resolve its relative paths against the file's
/// directory and validate it.
pub fn load_yaml(path: &Path) -> ConfigResult<SimConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: SimConfig = serde_yaml::from_str(&content)?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    validate_config(&config)?;
    Ok(config)
}

pub fn save_yaml(path: &Path, config: &SimConfig) -> ConfigResult<()> {
    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
