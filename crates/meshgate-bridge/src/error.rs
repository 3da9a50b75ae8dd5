//! Error types for running the configuration plane
//!
//! Command failures never surface here; they are [`meshgate_core::CommandError`]s
//! logged by the dispatcher. These errors cover setup and the plane handle.

use meshgate_core::TransportError;
use thiserror::Error;

/// Errors raised while starting or talking to the configuration plane
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport failed during startup
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The plane task has stopped
    #[error("Configuration plane is not running")]
    ChannelClosed,
}

impl BridgeError {
    /// Get an error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::InvalidConfig(_) => "INVALID_CONFIG",
            BridgeError::Transport(_) => "TRANSPORT_ERROR",
            BridgeError::ChannelClosed => "CHANNEL_CLOSED",
        }
    }
}

/// Result type alias for plane operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for BridgeError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        BridgeError::ChannelClosed
    }
}
