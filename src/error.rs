//! Error types for the config schema compiler

use thiserror::Error;

use crate::compiler::ValidationErrors;
use crate::schema::Visibility;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Config schema errors
///
/// Everything except `ConfigInvalid` is raised while compiling fragments and
/// points at a packaging defect rather than bad configuration data.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Config schema visibility is both '{existing}' and '{incoming}' for {path} (declared by '{existing_fragment}' and '{incoming_fragment}')")]
    VisibilityConflict {
        path: String,
        existing: Visibility,
        incoming: Visibility,
        existing_fragment: String,
        incoming_fragment: String,
    },

    #[error("Invalid visibility {value} in schema '{fragment}' at {path}, must be one of 'frontend', 'backend' or 'secret'")]
    InvalidVisibility {
        fragment: String,
        path: String,
        value: String,
    },

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Merged config schema failed to compile: {0}")]
    Compile(String),

    #[error("Config validation failed:\n{0}")]
    ConfigInvalid(ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config_crate::ConfigError),
}
