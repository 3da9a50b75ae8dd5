//! Meshgate Core - Shared types for the mesh bridge configuration plane
//!
//! This crate holds the vocabulary shared by the other meshgate crates:
//!
//! - [`device`] - Device addresses, network records and persisted settings
//! - [`status`] - Log level, last-seen policy and the bridge status snapshot
//! - [`traits`] - Collaborator contracts (network, settings, cache, transport, logging)
//! - [`error`] - Command and collaborator error types

#![warn(missing_docs)]

pub mod device;
pub mod error;
pub mod status;
pub mod traits;

pub use device::{DeviceAddress, DeviceModel, DeviceRecord, DeviceSettings, DeviceType};
pub use error::{CommandError, NetworkError, Result, StoreError, TransportError};
pub use status::{BridgeStatus, LastSeenPolicy, LogLevel};
pub use traits::{
    DeviceStateCache, LogSink, ModelLookup, NetworkController, PublishOptions, QoS, SettingsStore,
    Transport,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
