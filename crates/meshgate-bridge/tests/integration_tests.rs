//! Integration tests for the configuration plane
//!
//! These tests drive a running [`ConfigPlane`] through its handle and check
//! the side effects on the recording collaborators:
//! - Topic claiming and command routing
//! - Join permission, log level and status publication
//! - Device removal, banning, renaming and option changes
//! - Settings persistence across restarts

use meshgate_bridge::test_utils::{Publication, TestFixture};
use meshgate_bridge::{
    Collaborators, ConfigCommand, ConfigPlane, ConfigPlaneHandle, LogSinks, PlaneConfigBuilder,
    StaticModelTable,
};
use meshgate_core::{DeviceAddress, LastSeenPolicy, LogLevel, NetworkError, SettingsStore};
use meshgate_state::{MemorySettings, StateCache, ELAPSED_OPTION, LAST_SEEN_OPTION};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

// ============================================================================
// Helpers
// ============================================================================

/// Spawn a plane and wait until its startup publication is done
async fn spawn_plane(
    fixture: &TestFixture,
) -> (ConfigPlaneHandle, JoinHandle<meshgate_bridge::Result<()>>) {
    let (plane, handle) = ConfigPlane::new(fixture.config.clone(), fixture.collaborators());
    let task = tokio::spawn(plane.run());
    handle.stats().await.unwrap();
    (handle, task)
}

async fn send(handle: &ConfigPlaneHandle, fixture: &TestFixture, command: &str, payload: &str) -> bool {
    handle
        .dispatch(fixture.topic(command), payload.to_string())
        .await
        .unwrap()
}

async fn stop(handle: ConfigPlaneHandle, task: JoinHandle<meshgate_bridge::Result<()>>) {
    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

// ============================================================================
// Claiming
// ============================================================================

#[tokio::test]
async fn test_all_commands_claimed_even_with_garbage() {
    let fixture = TestFixture::new();
    let (handle, task) = spawn_plane(&fixture).await;

    for command in ConfigCommand::ALL {
        assert!(send(&handle, &fixture, command.name(), "\u{0}{[").await);
    }

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.messages_claimed, ConfigCommand::ALL.len() as u64);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_unmatched_topics_have_no_side_effects() {
    let fixture = TestFixture::new();
    fixture.add_device("0x01", "lamp1", true);
    let (handle, task) = spawn_plane(&fixture).await;
    let baseline = fixture.transport.publications().len();

    for topic in ["meshgate/bridge/config/unknown", "meshgate/lamp1", "meshgate/bridge/configure/ban"] {
        assert!(!handle.dispatch(topic, "lamp1").await.unwrap());
    }

    assert_eq!(fixture.transport.publications().len(), baseline);
    assert!(fixture.transport.events().is_empty());
    assert!(fixture.network.removal_calls().is_empty());
    assert!(fixture.has_settings("0x01"));
    stop(handle, task).await;
}

#[tokio::test]
async fn test_custom_base_topic() {
    let config = PlaneConfigBuilder::new().base_topic("home/zigbee").build();
    let fixture = TestFixture::with_config(config);
    let (handle, task) = spawn_plane(&fixture).await;

    assert!(handle
        .dispatch("home/zigbee/bridge/config/permit_join", "true")
        .await
        .unwrap());
    assert!(!handle
        .dispatch("meshgate/bridge/config/permit_join", "false")
        .await
        .unwrap());

    assert_eq!(fixture.network.join_calls(), vec![true]);
    assert_eq!(fixture.transport.subscriptions(), vec!["home/zigbee/bridge/config/+"]);
    assert_eq!(fixture.transport.publications_to("home/zigbee/bridge/config").len(), 2);
    stop(handle, task).await;
}

// ============================================================================
// Status
// ============================================================================

#[tokio::test]
async fn test_startup_status_precedes_first_command() {
    let fixture = TestFixture::new();
    let (handle, task) = spawn_plane(&fixture).await;

    assert_eq!(fixture.transport.subscriptions(), vec!["meshgate/bridge/config/+"]);
    assert_eq!(
        fixture.status_publications(),
        vec![json!({"log_level": "info", "permit_join": false})]
    );
    assert_eq!(handle.stats().await.unwrap().status_publishes, 1);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_permit_join_scenario() {
    let fixture = TestFixture::new();
    let (handle, task) = spawn_plane(&fixture).await;

    send(&handle, &fixture, "permit_join", "true").await;

    assert_eq!(fixture.network.join_calls(), vec![true]);
    let statuses = fixture.status_publications();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[1], json!({"log_level": "info", "permit_join": true}));

    let last: Publication = fixture.transport.publications().pop().unwrap();
    assert!(last.options.retain);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_log_level_publishes_exactly_once() {
    let fixture = TestFixture::new();
    let (handle, task) = spawn_plane(&fixture).await;
    let startup = fixture.status_publications().len();
    assert_eq!(startup, 1);

    send(&handle, &fixture, "log_level", "Warn").await;
    assert_eq!(fixture.status_publications().len(), startup + 1);

    send(&handle, &fixture, "log_level", "verbose").await;
    assert_eq!(fixture.status_publications().len(), startup + 2);

    for sink in &fixture.sinks {
        // startup level, then the accepted change; the rejected one applies nothing
        assert_eq!(sink.changes(), vec![LogLevel::Info, LogLevel::Warn]);
    }
    assert_eq!(
        fixture.status_publications().last().cloned(),
        Some(json!({"log_level": "warn", "permit_join": false}))
    );
    stop(handle, task).await;
}

#[tokio::test]
async fn test_status_reflects_live_values() {
    let fixture = TestFixture::new();
    let (handle, task) = spawn_plane(&fixture).await;

    send(&handle, &fixture, "permit_join", "true").await;
    send(&handle, &fixture, "log_level", "debug").await;
    let status = handle.publish_status().await.unwrap();

    assert!(status.permit_join);
    assert_eq!(status.log_level, LogLevel::Debug);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_status_publish_failure_is_reported() {
    let fixture = TestFixture::new();
    let (handle, task) = spawn_plane(&fixture).await;
    send(&handle, &fixture, "permit_join", "false").await;

    fixture.transport.set_fail_publish(true);
    assert!(handle.publish_status().await.is_err());
    stop(handle, task).await;
}

// ============================================================================
// Device lifecycle
// ============================================================================

#[tokio::test]
async fn test_remove_absent_device_skips_network() {
    let fixture = TestFixture::new();
    fixture.add_device("0x01", "lamp1", false);
    let (handle, task) = spawn_plane(&fixture).await;

    send(&handle, &fixture, "remove", "lamp1").await;

    assert!(fixture.network.removal_calls().is_empty());
    assert!(!fixture.has_settings("0x01"));
    assert!(!fixture.has_state("0x01"));
    assert_eq!(fixture.transport.events_named("device_removed"), vec![json!("lamp1")]);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_ban_failure_leaves_everything() {
    let fixture = TestFixture::new();
    fixture.add_device("0x01", "lamp1", true);
    fixture.network.fail_removal(NetworkError::Timeout { duration_ms: 10_000 });
    let (handle, task) = spawn_plane(&fixture).await;

    send(&handle, &fixture, "ban", "lamp1").await;

    assert_eq!(fixture.network.removal_calls(), vec![(DeviceAddress::from("0x01"), true)]);
    assert!(fixture.has_settings("0x01"));
    assert!(fixture.has_state("0x01"));
    assert!(fixture.network.has_device("0x01"));
    assert!(fixture.transport.events().is_empty());

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.commands_failed, 1);
    assert_eq!(stats.devices_banned, 0);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_ban_success_cleans_up_once() {
    let fixture = TestFixture::new();
    fixture.add_device("0x01", "lamp1", true);
    fixture.add_device("0x02", "lamp2", true);
    let (handle, task) = spawn_plane(&fixture).await;

    send(&handle, &fixture, "ban", "lamp1").await;

    assert_eq!(fixture.network.removal_calls().len(), 1);
    assert!(fixture.network.is_banned("0x01"));
    assert!(!fixture.has_settings("0x01"));
    assert!(!fixture.has_state("0x01"));
    assert!(fixture.has_settings("0x02"));
    assert!(fixture.has_state("0x02"));
    assert_eq!(fixture.transport.events(), vec![("device_banned".to_string(), json!("lamp1"))]);

    // Second attempt: the name no longer resolves and the device is gone
    send(&handle, &fixture, "ban", "lamp1").await;
    assert_eq!(fixture.network.removal_calls().len(), 1);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_rename_scenario() {
    let fixture = TestFixture::new();
    fixture.add_device("0x01", "lamp1", true);
    let (handle, task) = spawn_plane(&fixture).await;

    send(&handle, &fixture, "rename", r#"{"old":"lamp1","new":"kitchen_lamp"}"#).await;

    assert_eq!(fixture.friendly_name("0x01").as_deref(), Some("kitchen_lamp"));
    assert_eq!(
        fixture.settings.resolve_address("kitchen_lamp"),
        Some(DeviceAddress::from("0x01"))
    );
    assert_eq!(fixture.settings.resolve_address("lamp1"), None);
    assert_eq!(
        fixture.transport.events_named("device_renamed"),
        vec![json!({"from": "lamp1", "to": "kitchen_lamp"})]
    );

    // Removing under the new name reports the new name
    send(&handle, &fixture, "remove", "kitchen_lamp").await;
    assert_eq!(fixture.transport.events_named("device_removed"), vec![json!("kitchen_lamp")]);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_device_options_flow() {
    let fixture = TestFixture::new();
    fixture.add_device("0x01", "lamp1", true);
    let (handle, task) = spawn_plane(&fixture).await;

    let unknown = json!({"friendly_name": "ghost", "options": {"retain": true}}).to_string();
    let known = json!({"friendly_name": "lamp1", "options": {"retain": true, "qos": 1}}).to_string();
    send(&handle, &fixture, "device_options", &unknown).await;
    send(&handle, &fixture, "device_options", &known).await;

    let entry = fixture.settings.device_entry(&DeviceAddress::from("0x01")).unwrap();
    assert_eq!(Value::Object(entry.options), json!({"retain": true, "qos": 1}));
    assert_eq!(handle.stats().await.unwrap().commands_failed, 1);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_devices_event() {
    let fixture = TestFixture::new();
    fixture.add_device("0x01", "lamp1", true);
    fixture.add_device("0x02", "lamp2", false);
    let (handle, task) = spawn_plane(&fixture).await;

    send(&handle, &fixture, "devices", "").await;

    let events = fixture.transport.events_named("devices");
    assert_eq!(events.len(), 1);
    let names: Vec<&str> = events[0]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["friendly_name"].as_str())
        .collect();
    assert_eq!(names, vec!["lamp1"]);
    stop(handle, task).await;
}

// ============================================================================
// Global settings and persistence
// ============================================================================

#[tokio::test]
async fn test_last_seen_and_elapsed() {
    let fixture = TestFixture::new();
    let (handle, task) = spawn_plane(&fixture).await;

    send(&handle, &fixture, "last_seen", "epoch").await;
    send(&handle, &fixture, "last_seen", "Epoch").await;
    send(&handle, &fixture, "elapsed", "true").await;

    assert_eq!(fixture.settings.last_seen_policy(), LastSeenPolicy::Epoch);
    assert_eq!(fixture.settings.global_option(ELAPSED_OPTION), Some(json!(true)));
    assert_eq!(handle.stats().await.unwrap().commands_failed, 1);
    stop(handle, task).await;
}

#[tokio::test]
async fn test_settings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let config = PlaneConfigBuilder::new().settings_path(&path).build();

    {
        let settings = Arc::new(MemorySettings::open(&path).unwrap());
        settings.add_device("0x01", "lamp1").unwrap();
        settings.add_device("0x02", "lamp2").unwrap();

        let fixture = TestFixture::with_config(config.clone());
        let collaborators = Collaborators {
            settings: settings.clone(),
            ..fixture.collaborators()
        };
        let (plane, handle) = ConfigPlane::new(config.clone(), collaborators);
        let task = tokio::spawn(plane.run());

        handle
            .dispatch(fixture.topic("rename"), r#"{"old":"lamp1","new":"porch"}"#)
            .await
            .unwrap();
        handle.dispatch(fixture.topic("remove"), "lamp2").await.unwrap();
        handle.dispatch(fixture.topic("last_seen"), "ISO_8601").await.unwrap();
        stop(handle, task).await;
    }

    let reopened = MemorySettings::open(&path).unwrap();
    assert_eq!(reopened.resolve_address("porch"), Some(DeviceAddress::from("0x01")));
    assert!(reopened.device_entry(&DeviceAddress::from("0x02")).is_none());
    assert_eq!(reopened.global_option(LAST_SEEN_OPTION), Some(json!("ISO_8601")));
}

#[tokio::test]
async fn test_plane_with_standalone_collaborators() {
    let fixture = TestFixture::new();
    let collaborators = Collaborators {
        network: fixture.network.clone(),
        settings: Arc::new(MemorySettings::new()),
        state_cache: Arc::new(StateCache::new()),
        transport: fixture.transport.clone(),
        models: Arc::new(StaticModelTable::new()),
        log_sinks: LogSinks::new(),
    };
    let (plane, handle) = ConfigPlane::new(fixture.config.clone(), collaborators);
    let task = tokio::spawn(plane.run());

    send(&handle, &fixture, "log_level", "error").await;

    // Without sinks the reported level stays at the default
    assert_eq!(
        fixture.status_publications().last().cloned(),
        Some(json!({"log_level": "info", "permit_join": false}))
    );
    stop(handle, task).await;
}
