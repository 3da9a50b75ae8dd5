//! Device removal and banning
//!
//! Removing a device touches three owners: the network controller, the
//! settings store and the device-state cache. The sequence is:
//!
//! ```text
//! resolve reference ──► find_device(address)
//!                          │
//!              ┌───────────┴────────────┐
//!           no record               live record
//!              │                        │
//!              │              remove_device(address, ban).await
//!              │                   │             │
//!              │                  Ok            Err ──► log, stop (nothing cleaned)
//!              ▼                   ▼
//!           cleanup: settings entry, state entry, event
//! ```
//!
//! Local bookkeeping is only dropped once the network has confirmed the
//! device is gone, or when the network never knew it. The event is emitted
//! after cleanup has been committed, so an event that cannot be delivered
//! is logged and does not fail the removal.

use meshgate_core::{
    CommandError, DeviceAddress, DeviceStateCache, NetworkController, Result, SettingsStore,
    Transport,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::resolver::DeviceResolver;

/// Whether a removal also denylists the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    /// Plain removal, the device may rejoin
    Remove,
    /// Removal plus a persistent denylist entry
    Ban,
}

impl RemovalMode {
    /// Whether the network should denylist the device
    pub fn is_ban(&self) -> bool {
        matches!(self, RemovalMode::Ban)
    }

    /// Event emitted after cleanup
    pub fn event_name(&self) -> &'static str {
        match self {
            RemovalMode::Remove => "device_removed",
            RemovalMode::Ban => "device_banned",
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            RemovalMode::Remove => "remove",
            RemovalMode::Ban => "ban",
        }
    }

    pub(crate) fn past_tense(&self) -> &'static str {
        match self {
            RemovalMode::Remove => "removed",
            RemovalMode::Ban => "banned",
        }
    }
}

impl fmt::Display for RemovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation())
    }
}

/// How a successful removal went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// Device was not on the network; only local state was dropped
    AlreadyAbsent,
    /// Network confirmed the removal, then local state was dropped
    Removed,
}

/// Runs the remove/ban sequence
#[derive(Clone)]
pub struct LifecycleCoordinator {
    resolver: DeviceResolver,
    network: Arc<dyn NetworkController>,
    settings: Arc<dyn SettingsStore>,
    state_cache: Arc<dyn DeviceStateCache>,
    transport: Arc<dyn Transport>,
}

impl LifecycleCoordinator {
    /// Create a coordinator over the given collaborators
    pub fn new(
        resolver: DeviceResolver,
        network: Arc<dyn NetworkController>,
        settings: Arc<dyn SettingsStore>,
        state_cache: Arc<dyn DeviceStateCache>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            resolver,
            network,
            settings,
            state_cache,
            transport,
        }
    }

    /// Remove or ban the device named by `reference`
    ///
    /// When the network removal fails the error is returned and the
    /// settings entry, the cached state and the event are all left alone.
    pub async fn remove(&self, reference: &str, mode: RemovalMode) -> Result<RemovalOutcome> {
        let address = self.resolver.resolve(reference);

        let outcome = match self.network.find_device(&address) {
            None => RemovalOutcome::AlreadyAbsent,
            Some(record) => {
                debug!(
                    "Requesting network {} of '{}' ({}, {})",
                    mode, reference, address, record.device_type
                );
                self.network
                    .remove_device(&address, mode.is_ban())
                    .await
                    .map_err(CommandError::network(mode.operation()))?;
                RemovalOutcome::Removed
            }
        };

        self.cleanup(reference, &address, mode).await?;
        Ok(outcome)
    }

    async fn cleanup(&self, reference: &str, address: &DeviceAddress, mode: RemovalMode) -> Result<()> {
        self.settings
            .remove_device_entry(address)
            .map_err(CommandError::store(mode.operation()))?;
        if !self.state_cache.remove_entry(address) {
            debug!("No cached state for {}", address);
        }

        if let Err(e) = self
            .transport
            .emit_event(mode.event_name(), Value::String(reference.to_string()))
            .await
        {
            warn!(
                "'{}' was {} but the {} event was not delivered: {}",
                reference,
                mode.past_tense(),
                mode.event_name(),
                e
            );
        }
        Ok(())
    }
}
