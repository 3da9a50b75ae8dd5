//! Error types for configuration plane operations
//!
//! Commands never propagate failures to the sender of a message. Every
//! handler returns a [`CommandError`] which the dispatcher logs together
//! with the offending command and payload. Collaborators report their own
//! failures through [`NetworkError`], [`StoreError`] and [`TransportError`].

use thiserror::Error;

/// Failure reported by the mesh network controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Controller is not connected to the radio
    #[error("network controller not connected")]
    NotConnected,

    /// Operation did not complete in time
    #[error("operation timed out after {duration_ms}ms")]
    Timeout {
        /// Elapsed time in milliseconds
        duration_ms: u64,
    },

    /// The device or coordinator refused the request
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Any other controller failure
    #[error("{0}")]
    Failed(String),
}

/// Failure reported by the settings store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No entry with the given friendly name or address
    #[error("no device entry for '{0}'")]
    NotFound(String),

    /// Friendly name is already assigned to a device
    #[error("friendly name '{0}' is already in use")]
    NameTaken(String),

    /// Snapshot could not be written
    #[error("failed to persist settings: {0}")]
    Persistence(String),
}

/// Failure reported by the pub/sub transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Transport connection is down
    #[error("transport disconnected")]
    Disconnected,

    /// Publish was refused
    #[error("publish to '{topic}' failed: {reason}")]
    PublishFailed {
        /// Destination topic
        topic: String,
        /// Failure reason
        reason: String,
    },

    /// Subscription was refused
    #[error("subscribe to '{0}' failed")]
    SubscribeFailed(String),
}

/// Outcome of a rejected or failed configuration command
#[derive(Error, Debug)]
pub enum CommandError {
    /// Payload is not valid JSON or misses required fields
    #[error("invalid {command} payload: {reason}")]
    MalformedPayload {
        /// Command name
        command: &'static str,
        /// Human readable reason
        reason: String,
    },

    /// Value is not a member of the allowed set
    #[error("'{value}' is not a valid {field}, allowed values: {allowed}")]
    InvalidEnumValue {
        /// Name of the field being validated
        field: &'static str,
        /// The rejected value
        value: String,
        /// Comma separated list of accepted values
        allowed: String,
    },

    /// Device reference does not match a known device
    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    /// Network controller reported an error
    #[error("{operation} failed: {source}")]
    NetworkOperationFailed {
        /// Operation being performed
        operation: &'static str,
        /// Controller error
        #[source]
        source: NetworkError,
    },

    /// Settings store rejected a mutation
    #[error("{operation} rejected by settings store: {source}")]
    StoreOperationFailed {
        /// Operation being performed
        operation: &'static str,
        /// Store error
        #[source]
        source: StoreError,
    },

    /// Outbound message could not be delivered to the transport
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Outbound message could not be serialized
    #[error("failed to encode message: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl CommandError {
    /// Wrap a network error for the given operation
    pub fn network(operation: &'static str) -> impl FnOnce(NetworkError) -> Self {
        move |source| CommandError::NetworkOperationFailed { operation, source }
    }

    /// Wrap a store error for the given operation
    pub fn store(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| CommandError::StoreOperationFailed { operation, source }
    }

    /// Stable code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            CommandError::MalformedPayload { .. } => "MALFORMED_PAYLOAD",
            CommandError::InvalidEnumValue { .. } => "INVALID_ENUM_VALUE",
            CommandError::UnknownDevice(_) => "UNKNOWN_DEVICE",
            CommandError::NetworkOperationFailed { .. } => "NETWORK_OPERATION_FAILED",
            CommandError::StoreOperationFailed { .. } => "STORE_OPERATION_FAILED",
            CommandError::Transport(_) => "TRANSPORT_ERROR",
            CommandError::Encoding(_) => "ENCODING_FAILED",
        }
    }
}

/// Result type alias for command handlers
pub type Result<T> = std::result::Result<T, CommandError>;
