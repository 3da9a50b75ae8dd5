//! Collaborator contracts consumed by the configuration plane
//!
//! The plane owns none of the state it mutates. Network, settings, device
//! state, transport and logging are all reached through these traits and
//! injected at construction, which keeps the command handlers testable
//! without a radio or a broker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device::{DeviceAddress, DeviceModel, DeviceRecord, DeviceSettings};
use crate::error::{NetworkError, StoreError, TransportError};
use crate::status::LogLevel;

/// Mesh network controller
///
/// Mutating operations are asynchronous: the returned future resolves once
/// the controller has acknowledged the request.
#[async_trait]
pub trait NetworkController: Send + Sync {
    /// Allow or deny new devices joining the mesh
    async fn set_join_permission(&self, permit: bool) -> Result<(), NetworkError>;

    /// Current join permission
    fn join_permission(&self) -> bool;

    /// Soft reset the coordinator
    async fn soft_reset(&self) -> Result<(), NetworkError>;

    /// Remove a device from the mesh; `ban` also denylists it
    async fn remove_device(&self, address: &DeviceAddress, ban: bool) -> Result<(), NetworkError>;

    /// Live record for an address, if the device is part of the mesh
    fn find_device(&self, address: &DeviceAddress) -> Option<DeviceRecord>;

    /// All devices except the coordinator
    fn list_clients(&self) -> Vec<DeviceRecord>;
}

/// Persisted bridge and device settings
pub trait SettingsStore: Send + Sync {
    /// Canonical address mapped to a friendly name
    fn resolve_address(&self, friendly_name: &str) -> Option<DeviceAddress>;

    /// Settings entry for an address
    fn device_entry(&self, address: &DeviceAddress) -> Option<DeviceSettings>;

    /// Set a global option addressed by a dotted path (e.g. `advanced.last_seen`)
    fn set_global_option(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Read a global option addressed by a dotted path
    fn global_option(&self, path: &str) -> Option<Value>;

    /// Merge option overrides into a device entry
    fn set_device_options(&self, address: &DeviceAddress, options: Map<String, Value>) -> Result<(), StoreError>;

    /// Atomically move a friendly name.
    ///
    /// Fails with [`StoreError::NotFound`] when `old` is not in use and
    /// [`StoreError::NameTaken`] when `new` is; nothing changes on failure.
    fn rename_device(&self, old: &str, new: &str) -> Result<(), StoreError>;

    /// Delete the entry for an address. Absent entries are not an error.
    fn remove_device_entry(&self, address: &DeviceAddress) -> Result<(), StoreError>;
}

/// Runtime device state cache
pub trait DeviceStateCache: Send + Sync {
    /// Drop the cached state for an address, returning whether one existed
    fn remove_entry(&self, address: &DeviceAddress) -> bool;
}

/// Device model lookup table
pub trait ModelLookup: Send + Sync {
    /// Model metadata for a reported model identifier
    fn find_model(&self, model_id: &str) -> Option<DeviceModel>;
}

/// Log output whose threshold can change at runtime
pub trait LogSink: Send + Sync {
    /// Apply a new threshold
    fn set_level(&self, level: LogLevel);

    /// Threshold currently in effect
    fn level(&self) -> LogLevel;
}

/// MQTT-style quality of service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QoS {
    /// Fire and forget
    #[default]
    AtMostOnce,
    /// Acknowledged delivery
    AtLeastOnce,
    /// Exactly-once handshake
    ExactlyOnce,
}

/// Options for an outbound publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublishOptions {
    /// Broker keeps the message for late subscribers
    pub retain: bool,
    /// Delivery guarantee
    pub qos: QoS,
}

impl PublishOptions {
    /// Retained, QoS 0
    pub fn retained() -> Self {
        Self {
            retain: true,
            qos: QoS::AtMostOnce,
        }
    }
}

/// Topic-addressed pub/sub transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to a topic pattern
    async fn subscribe(&self, pattern: &str) -> Result<(), TransportError>;

    /// Publish a payload to a topic
    async fn publish(&self, topic: &str, payload: String, options: PublishOptions) -> Result<(), TransportError>;

    /// Emit a bridge event (`devices`, `device_renamed`, `device_removed`, ...)
    async fn emit_event(&self, event: &str, message: Value) -> Result<(), TransportError>;
}
