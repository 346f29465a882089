//! Tool search configuration.
//!
//! ```rust,no_run
//! use tool_search::config::ToolSearchSettings;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ToolSearchSettings::from_file("tool-search.json")?.with_env()?;
//! settings.validate()?;
//! let engine = settings.build_engine()?;
//! # Ok(())
//! # }
//! ```

pub mod env;
pub mod settings;

pub use env::EnvConfigProvider;
pub use settings::{ENV_PREFIX, SearchBackend, ToolSearchSettings};

use thiserror::Error;

/// Failure to load, parse, or validate [`ToolSearchSettings`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A setting is out of range or could not be parsed.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Malformed settings JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// An environment variable exists but is not valid unicode.
    #[error("Unreadable environment variable: {0}")]
    Env(#[from] std::env::VarError),

    #[error("{0}")]
    ValidationErrors(ValidationErrors),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Every violation found by [`ToolSearchSettings::validate`].
#[derive(Debug)]
pub struct ValidationErrors(pub Vec<ConfigError>);

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Validation failed: ")?;
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
