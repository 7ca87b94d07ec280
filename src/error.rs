//! Error types for praxis

use thiserror::Error;

/// Result type alias for praxis operations
pub type Result<T> = std::result::Result<T, PraxisError>;

/// Main error type for praxis
#[derive(Error, Debug)]
pub enum PraxisError {
    #[error("Trajectory not found: {0}")]
    TrajectoryNotFound(String),

    #[error("Memory not found: {0}")]
    MemoryNotFound(String),

    #[error("Cannot judge incomplete trajectory: {0}")]
    IncompleteTrajectory(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Listener error: {0}")]
    Listener(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    #[cfg(feature = "remote-index")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PraxisError {
    /// Check if the error comes from a degraded external dependency rather
    /// than a caller contract violation
    pub fn is_degraded_dependency(&self) -> bool {
        #[cfg(feature = "remote-index")]
        if matches!(self, PraxisError::Http(_)) {
            return true;
        }
        matches!(self, PraxisError::Index(_))
    }
}
