//! Error types for the navigation core.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    /// Route has no steps or no coordinates.
    #[error("malformed route: {0}")]
    MalformedRoute(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    /// A position was delivered to a source that is not subscribed.
    #[error("position source is stopped")]
    SourceStopped,

    #[error("position source failed: {0}")]
    SourceFailed(String),

    /// The navigator worker is no longer running.
    #[error("navigation engine is stopped")]
    EngineStopped,

    #[error("failed to spawn thread: {0}")]
    Thread(String),
}

impl From<serde_json::Error> for NavError {
    fn from(e: serde_json::Error) -> Self {
        NavError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
