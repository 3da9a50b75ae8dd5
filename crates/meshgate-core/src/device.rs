//! Device identity and metadata
//!
//! A device is known under two names: its canonical network address, which
//! is assigned by the mesh layer and never changes, and an optional
//! user-assigned friendly name kept in the settings store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Canonical network address of a device (e.g. `0x00158d0001a2b3c4`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(pub String);

impl DeviceAddress {
    /// Create an address from any string-like value
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Borrow the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Role of a device inside the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    /// Network coordinator (the bridge's own radio)
    Coordinator,
    /// Mains powered device that relays traffic
    Router,
    /// Leaf device, usually battery powered
    EndDevice,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Coordinator => write!(f, "Coordinator"),
            DeviceType::Router => write!(f, "Router"),
            DeviceType::EndDevice => write!(f, "EndDevice"),
        }
    }
}

/// Live device record as reported by the network controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Canonical address
    pub address: DeviceAddress,
    /// Short network address, reassigned on rejoin
    pub network_address: u16,
    /// Device role
    pub device_type: DeviceType,
    /// Model identifier reported by the device
    pub model_id: Option<String>,
    /// Manufacturer name reported by the device
    pub manufacturer_name: Option<String>,
    /// Power source reported by the device
    pub power_source: Option<String>,
}

impl DeviceRecord {
    /// Create a record with no reported metadata
    pub fn new(address: impl Into<DeviceAddress>, network_address: u16, device_type: DeviceType) -> Self {
        Self {
            address: address.into(),
            network_address,
            device_type,
            model_id: None,
            manufacturer_name: None,
            power_source: None,
        }
    }

    /// Set the reported model identifier
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Set the reported manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer_name = Some(manufacturer.into());
        self
    }
}

/// Model metadata from the device model table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceModel {
    /// Vendor model number
    pub model: String,
    /// Vendor name
    pub vendor: String,
    /// Short description
    pub description: String,
    /// Exposed capabilities, free-form
    pub supports: String,
}

/// Persisted per-device settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// User-assigned friendly name
    pub friendly_name: String,
    /// Per-device option overrides
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl DeviceSettings {
    /// Create an entry with no option overrides
    pub fn new(friendly_name: impl Into<String>) -> Self {
        Self {
            friendly_name: friendly_name.into(),
            options: Map::new(),
        }
    }
}
