use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DbError {
    /// Compile errors are a kind of configuration error: both mean the caller built a bad query.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Compile(_))
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }
}
