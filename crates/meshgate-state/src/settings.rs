//! In-memory settings store with optional JSON snapshot persistence
//!
//! Every mutation is applied to a draft copy of the snapshot, written to
//! disk, and only then committed. A failed write leaves both the file and the
//! in-memory view untouched, so multi-field changes such as a rename are
//! all-or-nothing.

use meshgate_core::{DeviceAddress, DeviceSettings, LastSeenPolicy, SettingsStore, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, StateError};

/// Global option path for the last-seen policy
pub const LAST_SEEN_OPTION: &str = "advanced.last_seen";

/// Global option path for the elapsed flag
pub const ELAPSED_OPTION: &str = "advanced.elapsed";

/// Everything the store persists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    /// Global options, nested by dotted path segments
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Device entries keyed by canonical address
    #[serde(default)]
    pub devices: BTreeMap<DeviceAddress, DeviceSettings>,
}

impl SettingsSnapshot {
    fn address_of(&self, friendly_name: &str) -> Option<&DeviceAddress> {
        self.devices
            .iter()
            .find(|(_, entry)| entry.friendly_name == friendly_name)
            .map(|(address, _)| address)
    }
}

/// Settings store backed by memory and, optionally, a JSON file
#[derive(Debug, Default)]
pub struct MemorySettings {
    snapshot: RwLock<SettingsSnapshot>,
    path: Option<PathBuf>,
}

impl MemorySettings {
    /// Create an empty store that is never written to disk
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from an existing snapshot, memory only
    pub fn from_snapshot(snapshot: SettingsSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            path: None,
        }
    }

    /// Open a store persisted at `path`, loading it when the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            let snapshot: SettingsSnapshot = serde_json::from_str(&data)
                .map_err(|e| StateError::Deserialization(e.to_string()))?;
            info!(
                "Loaded settings from {} ({} devices)",
                path.display(),
                snapshot.devices.len()
            );
            snapshot
        } else {
            debug!("Settings file {} not found, starting empty", path.display());
            SettingsSnapshot::default()
        };

        Ok(Self {
            snapshot: RwLock::new(snapshot),
            path: Some(path),
        })
    }

    /// File backing this store, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> SettingsSnapshot {
        self.snapshot.read().clone()
    }

    /// All device entries
    pub fn devices(&self) -> Vec<(DeviceAddress, DeviceSettings)> {
        self.snapshot
            .read()
            .devices
            .iter()
            .map(|(address, entry)| (address.clone(), entry.clone()))
            .collect()
    }

    /// Register a device, or rename it if the address is already known
    pub fn add_device(
        &self,
        address: impl Into<DeviceAddress>,
        friendly_name: impl Into<String>,
    ) -> std::result::Result<(), StoreError> {
        let address = address.into();
        let friendly_name = friendly_name.into();
        self.mutate(|snapshot| {
            if let Some(owner) = snapshot.address_of(&friendly_name) {
                if *owner != address {
                    return Err(StoreError::NameTaken(friendly_name));
                }
            }
            snapshot
                .devices
                .entry(address)
                .and_modify(|entry| entry.friendly_name = friendly_name.clone())
                .or_insert_with(|| DeviceSettings::new(friendly_name.clone()));
            Ok(())
        })
    }

    /// Last-seen policy currently stored, `disabled` when unset or invalid
    pub fn last_seen_policy(&self) -> LastSeenPolicy {
        self.global_option(LAST_SEEN_OPTION)
            .and_then(|value| value.as_str().and_then(|s| s.parse().ok()))
            .unwrap_or_default()
    }

    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut SettingsSnapshot) -> std::result::Result<T, StoreError>,
    ) -> std::result::Result<T, StoreError> {
        let mut guard = self.snapshot.write();
        let mut draft = guard.clone();
        let output = apply(&mut draft)?;
        self.save(&draft)?;
        *guard = draft;
        Ok(output)
    }

    fn save(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let data = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;
        debug!("Settings written to {}", path.display());
        Ok(())
    }
}

fn set_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut node = root;
    for segment in segments {
        let child = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        node = match child {
            Value::Object(map) => map,
            _ => return,
        };
    }
    node.insert(last.to_string(), value);
}

fn get_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = root.get(segments.next()?)?;
    segments.try_fold(first, |value, segment| value.get(segment))
}

impl SettingsStore for MemorySettings {
    fn resolve_address(&self, friendly_name: &str) -> Option<DeviceAddress> {
        self.snapshot.read().address_of(friendly_name).cloned()
    }

    fn device_entry(&self, address: &DeviceAddress) -> Option<DeviceSettings> {
        self.snapshot.read().devices.get(address).cloned()
    }

    fn set_global_option(&self, path: &str, value: Value) -> std::result::Result<(), StoreError> {
        self.mutate(|snapshot| {
            set_path(&mut snapshot.options, path, value);
            Ok(())
        })
    }

    fn global_option(&self, path: &str) -> Option<Value> {
        get_path(&self.snapshot.read().options, path).cloned()
    }

    fn set_device_options(
        &self,
        address: &DeviceAddress,
        options: Map<String, Value>,
    ) -> std::result::Result<(), StoreError> {
        self.mutate(|snapshot| {
            let entry = snapshot
                .devices
                .get_mut(address)
                .ok_or_else(|| StoreError::NotFound(address.to_string()))?;
            entry.options.extend(options);
            Ok(())
        })
    }

    fn rename_device(&self, old: &str, new: &str) -> std::result::Result<(), StoreError> {
        self.mutate(|snapshot| {
            let address = snapshot
                .address_of(old)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(old.to_string()))?;
            if snapshot.address_of(new).is_some() {
                return Err(StoreError::NameTaken(new.to_string()));
            }
            if let Some(entry) = snapshot.devices.get_mut(&address) {
                entry.friendly_name = new.to_string();
            }
            Ok(())
        })
    }

    fn remove_device_entry(&self, address: &DeviceAddress) -> std::result::Result<(), StoreError> {
        if !self.snapshot.read().devices.contains_key(address) {
            return Ok(());
        }
        self.mutate(|snapshot| {
            snapshot.devices.remove(address);
            Ok(())
        })
    }
}
