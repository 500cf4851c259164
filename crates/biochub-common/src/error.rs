//! Error types shared by every biochub crate

use thiserror::Error;

/// Result type alias for biochub operations
pub type Result<T> = std::result::Result<T, BiochubError>;

#[derive(Error, Debug)]
pub enum BiochubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown hub code: {0}")]
    UnknownHub(String),

    #[error("Unknown location type: {0}")]
    UnknownLocationType(String),

    #[error("Unknown entity kind: {0}")]
    UnknownEntityKind(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl BiochubError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
