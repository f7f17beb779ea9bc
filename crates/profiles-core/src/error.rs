//! Error types for profiles-proto

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for binding generation
#[derive(Error, Debug)]
pub enum Error {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error(
        "Schema not found for family '{family}': neither {} nor {} exists",
        .current.display(),
        .legacy.display()
    )]
    SchemaNotFound {
        family: String,
        current: PathBuf,
        legacy: PathBuf,
    },

    #[error("Dependency schema not found: {}", .0.display())]
    MissingSchema(PathBuf),

    #[error("Compiler error: {0}")]
    Compiler(String),

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Error::Fetch(msg.into())
    }

    /// Create a compiler error
    pub fn compiler(msg: impl Into<String>) -> Self {
        Error::Compiler(msg.into())
    }

    /// Create a layout error
    pub fn layout(msg: impl Into<String>) -> Self {
        Error::Layout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::Layout(format!("invalid glob pattern: {}", err))
    }
}
