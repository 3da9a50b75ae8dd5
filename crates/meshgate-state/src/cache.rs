//! Runtime device state cache
//!
//! Holds the last reported state of every device together with the time it
//! was last heard from. Entries live only as long as the process.

use chrono::{DateTime, Utc};
use meshgate_core::{DeviceAddress, DeviceStateCache};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::trace;

/// Cached state of a single device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    /// When the device was last heard from
    pub last_seen: DateTime<Utc>,
    /// Last reported attribute values
    pub state: Map<String, Value>,
}

/// In-memory cache keyed by canonical address
#[derive(Debug, Default)]
pub struct StateCache {
    entries: RwLock<HashMap<DeviceAddress, DeviceState>>,
}

impl StateCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge reported attributes into a device's state and touch `last_seen`
    pub fn update(&self, address: &DeviceAddress, attributes: Map<String, Value>) {
        let seen = Utc::now();
        let mut entries = self.entries.write();
        let entry = entries.entry(address.clone()).or_insert_with(|| DeviceState {
            last_seen: seen,
            state: Map::new(),
        });
        entry.last_seen = seen;
        entry.state.extend(attributes);
        trace!("Updated state for {}", address);
    }

    /// Cached state for an address
    pub fn get(&self, address: &DeviceAddress) -> Option<DeviceState> {
        self.entries.read().get(address).cloned()
    }

    /// Number of cached devices
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl DeviceStateCache for StateCache {
    fn remove_entry(&self, address: &DeviceAddress) -> bool {
        self.entries.write().remove(address).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_update_merges_attributes() {
        let cache = StateCache::new();
        let addr = DeviceAddress::from("0x01");
        cache.update(&addr, attrs(json!({"state": "ON", "brightness": 10})));
        cache.update(&addr, attrs(json!({"brightness": 200})));

        let state = cache.get(&addr).unwrap();
        assert_eq!(Value::Object(state.state), json!({"state": "ON", "brightness": 200}));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_entry() {
        let cache = StateCache::new();
        let addr = DeviceAddress::from("0x01");
        cache.update(&addr, Map::new());

        assert!(cache.remove_entry(&addr));
        assert!(!cache.remove_entry(&addr));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_update_touches_last_seen() {
        let cache = StateCache::new();
        let addr = DeviceAddress::from("0x01");
        cache.update(&addr, attrs(json!({"state": "OFF"})));
        let first = cache.get(&addr).unwrap().last_seen;

        cache.update(&addr, Map::new());
        let state = cache.get(&addr).unwrap();
        assert!(state.last_seen >= first);
        assert!(state.last_seen <= Utc::now());
        assert_eq!(Value::Object(state.state), json!({"state": "OFF"}));
    }
}
