//! In-process network controller and line-oriented transport
//!
//! These stand in for a radio and a broker so the configuration plane can
//! be driven from a terminal: commands come in on stdin, everything the
//! plane publishes goes out on stdout as one JSON object per line.

use async_trait::async_trait;
use meshgate_core::{
    DeviceAddress, DeviceRecord, DeviceType, NetworkController, NetworkError, PublishOptions,
    Transport, TransportError,
};
use meshgate_state::MemorySettings;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use tracing::{debug, info};

/// Address of the simulated coordinator
pub const COORDINATOR_ADDRESS: &str = "0x0000000000000000";

/// Device option naming the model identifier a simulated device reports
pub const MODEL_ID_OPTION: &str = "model_id";

#[derive(Default)]
struct SimState {
    permit_join: bool,
    devices: BTreeMap<DeviceAddress, DeviceRecord>,
    banned: HashSet<DeviceAddress>,
}

/// Network controller backed by an in-memory device table
pub struct SimulatedController {
    state: RwLock<SimState>,
    fail_removal: bool,
}

impl SimulatedController {
    /// Controller with only a coordinator
    pub fn new(fail_removal: bool) -> Self {
        let mut state = SimState::default();
        let coordinator = DeviceAddress::from(COORDINATOR_ADDRESS);
        state.devices.insert(
            coordinator.clone(),
            DeviceRecord::new(coordinator, 0x0000, DeviceType::Coordinator),
        );

        Self {
            state: RwLock::new(state),
            fail_removal,
        }
    }

    /// Controller whose mesh holds every device known to the settings store
    pub fn from_settings(settings: &MemorySettings, fail_removal: bool) -> Self {
        let controller = Self::new(fail_removal);
        for (index, (address, entry)) in settings.devices().into_iter().enumerate() {
            let mut record = DeviceRecord::new(address, index as u16 + 1, DeviceType::Router);
            if let Some(model_id) = entry.options.get(MODEL_ID_OPTION).and_then(Value::as_str) {
                record = record.with_model_id(model_id);
            }
            controller.join(record);
        }
        controller
    }

    /// Add a device to the mesh unless it is banned
    pub fn join(&self, record: DeviceRecord) -> bool {
        let mut state = self.state.write();
        if state.banned.contains(&record.address) {
            debug!("Refusing banned device {}", record.address);
            return false;
        }
        state.devices.insert(record.address.clone(), record);
        true
    }

    /// Whether an address was banned
    pub fn is_banned(&self, address: &DeviceAddress) -> bool {
        self.state.read().banned.contains(address)
    }
}

#[async_trait]
impl NetworkController for SimulatedController {
    async fn set_join_permission(&self, permit: bool) -> Result<(), NetworkError> {
        tokio::task::yield_now().await;
        self.state.write().permit_join = permit;
        Ok(())
    }

    fn join_permission(&self) -> bool {
        self.state.read().permit_join
    }

    async fn soft_reset(&self) -> Result<(), NetworkError> {
        tokio::task::yield_now().await;
        info!("Simulated coordinator reset");
        Ok(())
    }

    async fn remove_device(&self, address: &DeviceAddress, ban: bool) -> Result<(), NetworkError> {
        tokio::task::yield_now().await;
        if self.fail_removal {
            return Err(NetworkError::Rejected(format!("{} did not leave the network", address)));
        }

        let mut state = self.state.write();
        state.devices.remove(address);
        if ban {
            state.banned.insert(address.clone());
        }
        Ok(())
    }

    fn find_device(&self, address: &DeviceAddress) -> Option<DeviceRecord> {
        self.state.read().devices.get(address).cloned()
    }

    fn list_clients(&self) -> Vec<DeviceRecord> {
        self.state
            .read()
            .devices
            .values()
            .filter(|record| record.device_type != DeviceType::Coordinator)
            .cloned()
            .collect()
    }
}

/// Transport writing every publication as a JSON line
pub struct StdoutTransport {
    log_topic: String,
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdoutTransport {
    /// Write to stdout; events go to `log_topic`
    pub fn new(log_topic: impl Into<String>) -> Self {
        Self::with_writer(log_topic, Box::new(std::io::stdout()))
    }

    /// Write to any writer
    pub fn with_writer(log_topic: impl Into<String>, out: Box<dyn Write + Send>) -> Self {
        Self {
            log_topic: log_topic.into(),
            out: Mutex::new(out),
        }
    }

    fn write_line(&self, topic: &str, payload: &str, options: PublishOptions) -> Result<(), TransportError> {
        let payload = serde_json::from_str::<Value>(payload).unwrap_or_else(|_| Value::from(payload));
        let line = json!({
            "topic": topic,
            "payload": payload,
            "retain": options.retain,
        });

        let mut out = self.out.lock();
        writeln!(out, "{}", line)
            .and_then(|_| out.flush())
            .map_err(|e| TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    async fn subscribe(&self, pattern: &str) -> Result<(), TransportError> {
        info!("Reading commands for {} from stdin", pattern);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: String, options: PublishOptions) -> Result<(), TransportError> {
        self.write_line(topic, &payload, options)
    }

    async fn emit_event(&self, event: &str, message: Value) -> Result<(), TransportError> {
        let payload = json!({"type": event, "message": message}).to_string();
        self.write_line(&self.log_topic, &payload, PublishOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn lines(&self) -> Vec<Value> {
            String::from_utf8(self.0.lock().clone())
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    #[tokio::test]
    async fn test_seeded_from_settings() {
        let settings = MemorySettings::new();
        settings.add_device("0x01", "lamp1").unwrap();
        settings.add_device("0x02", "plug").unwrap();

        let controller = SimulatedController::from_settings(&settings, false);

        assert_eq!(controller.list_clients().len(), 2);
        assert!(controller.find_device(&DeviceAddress::from(COORDINATOR_ADDRESS)).is_some());
        assert_eq!(
            controller.find_device(&DeviceAddress::from("0x02")).unwrap().network_address,
            2
        );
    }

    #[tokio::test]
    async fn test_ban_blocks_rejoin() {
        let controller = SimulatedController::new(false);
        controller.join(DeviceRecord::new("0x01", 1, DeviceType::EndDevice));

        controller.remove_device(&DeviceAddress::from("0x01"), true).await.unwrap();

        assert!(controller.is_banned(&DeviceAddress::from("0x01")));
        assert!(!controller.join(DeviceRecord::new("0x01", 1, DeviceType::EndDevice)));
        assert!(controller.list_clients().is_empty());
    }

    #[tokio::test]
    async fn test_failing_removal_keeps_device() {
        let controller = SimulatedController::new(true);
        controller.join(DeviceRecord::new("0x01", 1, DeviceType::Router));

        assert!(controller.remove_device(&DeviceAddress::from("0x01"), false).await.is_err());
        assert!(controller.find_device(&DeviceAddress::from("0x01")).is_some());
    }

    #[tokio::test]
    async fn test_join_permission() {
        let controller = SimulatedController::new(false);
        controller.set_join_permission(true).await.unwrap();
        assert!(controller.join_permission());
    }

    #[tokio::test]
    async fn test_transport_lines() {
        let buffer = SharedBuffer::default();
        let transport = StdoutTransport::with_writer("meshgate/bridge/log", Box::new(buffer.clone()));

        transport
            .publish(
                "meshgate/bridge/config",
                r#"{"log_level":"info","permit_join":false}"#.to_string(),
                PublishOptions::retained(),
            )
            .await
            .unwrap();
        transport.emit_event("device_removed", json!("lamp1")).await.unwrap();

        assert_eq!(
            buffer.lines(),
            vec![
                json!({
                    "topic": "meshgate/bridge/config",
                    "payload": {"log_level": "info", "permit_join": false},
                    "retain": true
                }),
                json!({
                    "topic": "meshgate/bridge/log",
                    "payload": {"type": "device_removed", "message": "lamp1"},
                    "retain": false
                }),
            ]
        );
    }
}
