//! Error types for the state layer

use meshgate_core::StoreError;
use thiserror::Error;

/// Errors that can occur while loading or saving state
#[derive(Error, Debug)]
pub enum StateError {
    /// Settings file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<StateError> for StoreError {
    fn from(err: StateError) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

/// Result type for state operations
pub type Result<T> = std::result::Result<T, StateError>;
