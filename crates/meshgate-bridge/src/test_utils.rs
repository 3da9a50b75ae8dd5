//! Recording collaborators for exercising the configuration plane
//!
//! Every mock records the calls it receives so tests can assert on the
//! exact sequence of side effects, and most can be told to fail.
//!
//! # Example
//!
//! ```rust,ignore
//! use meshgate_bridge::test_utils::TestFixture;
//!
//! #[tokio::test]
//! async fn test_remove() {
//!     let fixture = TestFixture::new();
//!     fixture.add_device("0x01", "lamp1", true);
//!
//!     let mut dispatcher = fixture.dispatcher();
//!     dispatcher.dispatch(&fixture.topic("remove"), b"lamp1").await;
//!
//!     assert!(!fixture.has_settings("0x01"));
//! }
//! ```

use async_trait::async_trait;
use meshgate_core::{
    DeviceAddress, DeviceModel, DeviceRecord, DeviceType, LogLevel, LogSink, NetworkController,
    NetworkError, PublishOptions, SettingsStore, Transport, TransportError,
};
use meshgate_state::{MemorySettings, StateCache};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::config::PlaneConfig;
use crate::dispatcher::{Collaborators, Dispatcher};
use crate::logging::LogSinks;
use crate::models::StaticModelTable;

/// Model identifier registered in the fixture's model table
pub const FIXTURE_MODEL_ID: &str = "lumi.plug";

#[derive(Default)]
struct ControllerState {
    permit_join: bool,
    devices: BTreeMap<DeviceAddress, DeviceRecord>,
    banned: HashSet<DeviceAddress>,
    join_calls: Vec<bool>,
    reset_calls: usize,
    removal_calls: Vec<(DeviceAddress, bool)>,
    join_failure: Option<NetworkError>,
    reset_failure: Option<NetworkError>,
    removal_failure: Option<NetworkError>,
}

/// In-memory network controller that records every request
#[derive(Default)]
pub struct MockController {
    state: Mutex<ControllerState>,
}

impl MockController {
    /// Controller with no devices and joining disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a live device
    pub fn add_device(&self, record: DeviceRecord) {
        self.state.lock().devices.insert(record.address.clone(), record);
    }

    /// Whether a device is still part of the mesh
    pub fn has_device(&self, address: &str) -> bool {
        self.state.lock().devices.contains_key(&DeviceAddress::from(address))
    }

    /// Whether a device was removed with `ban`
    pub fn is_banned(&self, address: &str) -> bool {
        self.state.lock().banned.contains(&DeviceAddress::from(address))
    }

    /// Make every join permission change fail
    pub fn fail_join(&self, error: NetworkError) {
        self.state.lock().join_failure = Some(error);
    }

    /// Make every soft reset fail
    pub fn fail_reset(&self, error: NetworkError) {
        self.state.lock().reset_failure = Some(error);
    }

    /// Make every removal fail
    pub fn fail_removal(&self, error: NetworkError) {
        self.state.lock().removal_failure = Some(error);
    }

    /// Join permission requests, in order
    pub fn join_calls(&self) -> Vec<bool> {
        self.state.lock().join_calls.clone()
    }

    /// Number of soft reset requests
    pub fn reset_calls(&self) -> usize {
        self.state.lock().reset_calls
    }

    /// Removal requests, in order
    pub fn removal_calls(&self) -> Vec<(DeviceAddress, bool)> {
        self.state.lock().removal_calls.clone()
    }
}

#[async_trait]
impl NetworkController for MockController {
    async fn set_join_permission(&self, permit: bool) -> Result<(), NetworkError> {
        let mut state = self.state.lock();
        state.join_calls.push(permit);
        if let Some(err) = state.join_failure.clone() {
            return Err(err);
        }
        state.permit_join = permit;
        Ok(())
    }

    fn join_permission(&self) -> bool {
        self.state.lock().permit_join
    }

    async fn soft_reset(&self) -> Result<(), NetworkError> {
        let mut state = self.state.lock();
        state.reset_calls += 1;
        match state.reset_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn remove_device(&self, address: &DeviceAddress, ban: bool) -> Result<(), NetworkError> {
        let mut state = self.state.lock();
        state.removal_calls.push((address.clone(), ban));
        if let Some(err) = state.removal_failure.clone() {
            return Err(err);
        }
        state.devices.remove(address);
        if ban {
            state.banned.insert(address.clone());
        }
        Ok(())
    }

    fn find_device(&self, address: &DeviceAddress) -> Option<DeviceRecord> {
        self.state.lock().devices.get(address).cloned()
    }

    fn list_clients(&self) -> Vec<DeviceRecord> {
        self.state
            .lock()
            .devices
            .values()
            .filter(|record| record.device_type != DeviceType::Coordinator)
            .cloned()
            .collect()
    }
}

/// A recorded publication
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    /// Destination topic
    pub topic: String,
    /// Payload as published
    pub payload: String,
    /// Retain flag and QoS
    pub options: PublishOptions,
}

impl Publication {
    /// Payload parsed as JSON
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.payload).ok()
    }
}

#[derive(Default)]
struct TransportState {
    subscriptions: Vec<String>,
    publications: Vec<Publication>,
    events: Vec<(String, Value)>,
    fail_publish: bool,
    fail_events: bool,
}

/// Transport that records subscriptions, publications and events
#[derive(Default)]
pub struct RecordingTransport {
    state: Mutex<TransportState>,
}

impl RecordingTransport {
    /// Empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Make publications fail
    pub fn set_fail_publish(&self, fail: bool) {
        self.state.lock().fail_publish = fail;
    }

    /// Make event emission fail
    pub fn set_fail_events(&self, fail: bool) {
        self.state.lock().fail_events = fail;
    }

    /// Subscribed patterns
    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().subscriptions.clone()
    }

    /// Every successful publication
    pub fn publications(&self) -> Vec<Publication> {
        self.state.lock().publications.clone()
    }

    /// Publications to one topic
    pub fn publications_to(&self, topic: &str) -> Vec<Publication> {
        self.state
            .lock()
            .publications
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }

    /// Every emitted event as `(name, message)`
    pub fn events(&self) -> Vec<(String, Value)> {
        self.state.lock().events.clone()
    }

    /// Messages of the events with the given name
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|(event, _)| event == name)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn subscribe(&self, pattern: &str) -> Result<(), TransportError> {
        self.state.lock().subscriptions.push(pattern.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: String, options: PublishOptions) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.fail_publish {
            return Err(TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: "mock publish failure".to_string(),
            });
        }
        state.publications.push(Publication {
            topic: topic.to_string(),
            payload,
            options,
        });
        Ok(())
    }

    async fn emit_event(&self, event: &str, message: Value) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.fail_events {
            return Err(TransportError::Disconnected);
        }
        state.events.push((event.to_string(), message));
        Ok(())
    }
}

/// Log sink that remembers every threshold it was given
pub struct RecordingSink {
    level: Mutex<LogLevel>,
    changes: Mutex<Vec<LogLevel>>,
}

impl RecordingSink {
    /// Sink starting at `level`
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: Mutex::new(level),
            changes: Mutex::new(Vec::new()),
        }
    }

    /// Levels applied since creation
    pub fn changes(&self) -> Vec<LogLevel> {
        self.changes.lock().clone()
    }
}

impl LogSink for RecordingSink {
    fn set_level(&self, level: LogLevel) {
        *self.level.lock() = level;
        self.changes.lock().push(level);
    }

    fn level(&self) -> LogLevel {
        *self.level.lock()
    }
}

/// A configuration plane wired to recording collaborators
pub struct TestFixture {
    /// Plane configuration (default base topic)
    pub config: PlaneConfig,
    /// Network controller
    pub network: Arc<MockController>,
    /// Settings store, memory only
    pub settings: Arc<MemorySettings>,
    /// Device-state cache
    pub state_cache: Arc<StateCache>,
    /// Transport
    pub transport: Arc<RecordingTransport>,
    /// Two attached log sinks
    pub sinks: Vec<Arc<RecordingSink>>,
    /// Model table knowing [`FIXTURE_MODEL_ID`]
    pub models: Arc<StaticModelTable>,
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    /// Create a fixture with no devices
    pub fn new() -> Self {
        Self::with_config(PlaneConfig::default())
    }

    /// Create a fixture with a custom configuration
    pub fn with_config(config: PlaneConfig) -> Self {
        let models = StaticModelTable::new().with_model(
            FIXTURE_MODEL_ID,
            DeviceModel {
                model: "ZNCZ02LM".to_string(),
                vendor: "Xiaomi".to_string(),
                description: "Mi power plug".to_string(),
                supports: "on/off, power measurement".to_string(),
            },
        );

        Self {
            config,
            network: Arc::new(MockController::new()),
            settings: Arc::new(MemorySettings::new()),
            state_cache: Arc::new(StateCache::new()),
            transport: Arc::new(RecordingTransport::new()),
            sinks: vec![
                Arc::new(RecordingSink::new(LogLevel::Info)),
                Arc::new(RecordingSink::new(LogLevel::Info)),
            ],
            models: Arc::new(models),
        }
    }

    /// Collaborators backed by the fixture's mocks
    pub fn collaborators(&self) -> Collaborators {
        let mut log_sinks = LogSinks::new();
        for sink in &self.sinks {
            log_sinks.attach(sink.clone());
        }

        Collaborators {
            network: self.network.clone(),
            settings: self.settings.clone(),
            state_cache: self.state_cache.clone(),
            transport: self.transport.clone(),
            models: self.models.clone(),
            log_sinks,
        }
    }

    /// A dispatcher over the fixture's collaborators
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(&self.config, self.collaborators())
    }

    /// Full topic of a command
    pub fn topic(&self, command: &str) -> String {
        format!("{}{}", self.config.command_prefix(), command)
    }

    /// Register a device in settings and the state cache; `live` also adds it to the network
    pub fn add_device(&self, address: &str, friendly_name: &str, live: bool) {
        self.settings
            .add_device(address, friendly_name)
            .expect("fixture friendly names must be unique");

        let mut attributes = Map::new();
        attributes.insert("state".to_string(), Value::from("ON"));
        self.state_cache.update(&DeviceAddress::from(address), attributes);

        if live {
            let network_address = 0x1000 + self.network.list_clients().len() as u16;
            self.network.add_device(
                DeviceRecord::new(address, network_address, DeviceType::Router)
                    .with_model_id(FIXTURE_MODEL_ID)
                    .with_manufacturer("LUMI"),
            );
        }
    }

    /// Whether a settings entry exists for the address
    pub fn has_settings(&self, address: &str) -> bool {
        self.settings.device_entry(&DeviceAddress::from(address)).is_some()
    }

    /// Whether cached state exists for the address
    pub fn has_state(&self, address: &str) -> bool {
        self.state_cache.get(&DeviceAddress::from(address)).is_some()
    }

    /// Friendly name recorded for the address
    pub fn friendly_name(&self, address: &str) -> Option<String> {
        self.settings
            .device_entry(&DeviceAddress::from(address))
            .map(|entry| entry.friendly_name)
    }

    /// Status publications, parsed
    pub fn status_publications(&self) -> Vec<Value> {
        self.transport
            .publications_to(&self.config.status_topic())
            .iter()
            .filter_map(Publication::json)
            .collect()
    }
}
