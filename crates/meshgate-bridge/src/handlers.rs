//! Per-command handlers
//!
//! Each handler validates its payload before touching any collaborator, so
//! a rejected command leaves no trace besides the error log written by the
//! dispatcher. Handlers that wait on the network controller only continue
//! (status publish, cleanup) after the controller has answered.

use meshgate_core::{
    CommandError, DeviceModel, DeviceRecord, LastSeenPolicy, LogLevel, Result,
};
use meshgate_state::{ELAPSED_OPTION, LAST_SEEN_OPTION};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::command::{
    parse_device_reference, parse_flag, ConfigCommand, DeviceOptionsRequest, RenameRequest,
};
use crate::dispatcher::Dispatcher;
use crate::lifecycle::{RemovalMode, RemovalOutcome};

/// One entry of the `devices` event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceListing {
    /// Canonical address
    #[serde(rename = "ieeeAddr")]
    pub address: String,
    /// Device role
    #[serde(rename = "type")]
    pub device_type: String,
    /// Short network address
    #[serde(rename = "networkAddress")]
    pub network_address: u16,
    /// Vendor model number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Vendor name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Model description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Exposed capabilities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports: Option<String>,
    /// Friendly name, or the address when none is assigned
    pub friendly_name: String,
    /// Model identifier reported by the device
    #[serde(rename = "modelID", skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Manufacturer reported by the device
    #[serde(rename = "manufacturerName", skip_serializing_if = "Option::is_none")]
    pub manufacturer_name: Option<String>,
    /// Power source reported by the device
    #[serde(rename = "powerSource", skip_serializing_if = "Option::is_none")]
    pub power_source: Option<String>,
}

impl DeviceListing {
    /// Build a listing from the network record and optional metadata
    pub fn new(record: DeviceRecord, model: Option<DeviceModel>, friendly_name: Option<String>) -> Self {
        let friendly_name = friendly_name.unwrap_or_else(|| record.address.to_string());
        let (model, vendor, description, supports) = match model {
            Some(m) => (Some(m.model), Some(m.vendor), Some(m.description), Some(m.supports)),
            None => (None, None, None, None),
        };

        Self {
            address: record.address.0,
            device_type: record.device_type.to_string(),
            network_address: record.network_address,
            model,
            vendor,
            description,
            supports,
            friendly_name,
            model_id: record.model_id,
            manufacturer_name: record.manufacturer_name,
            power_source: record.power_source,
        }
    }
}

impl Dispatcher {
    pub(crate) async fn handle_permit_join(&mut self, payload: &str) -> Result<()> {
        let permit = parse_flag(ConfigCommand::PermitJoin, payload);

        self.collaborators
            .network
            .set_join_permission(permit)
            .await
            .map_err(CommandError::network("permit_join"))?;
        info!("Join permission {}", if permit { "enabled" } else { "disabled" });

        self.publish_status().await?;
        Ok(())
    }

    pub(crate) async fn handle_reset(&mut self) -> Result<()> {
        self.collaborators
            .network
            .soft_reset()
            .await
            .map_err(CommandError::network("soft_reset"))?;
        info!("Soft reset coordinator");
        Ok(())
    }

    pub(crate) fn handle_last_seen(&mut self, payload: &str) -> Result<()> {
        let policy: LastSeenPolicy = payload.parse()?;

        self.collaborators
            .settings
            .set_global_option(LAST_SEEN_OPTION, Value::from(policy.as_str()))
            .map_err(CommandError::store("last_seen"))?;
        info!("Set last_seen to {}", policy);
        Ok(())
    }

    pub(crate) fn handle_elapsed(&mut self, payload: &str) -> Result<()> {
        let enabled = parse_flag(ConfigCommand::Elapsed, payload);

        self.collaborators
            .settings
            .set_global_option(ELAPSED_OPTION, Value::Bool(enabled))
            .map_err(CommandError::store("elapsed"))?;
        info!("Set elapsed to {}", enabled);
        Ok(())
    }

    /// The status snapshot goes out even when the level is rejected.
    pub(crate) async fn handle_log_level(&mut self, payload: &str) -> Result<()> {
        let applied = payload.parse::<LogLevel>().map(|level| {
            self.collaborators.log_sinks.set_level(level);
            info!("Switched log level to '{}'", level);
        });

        let published = self.publish_status().await;
        applied?;
        published?;
        Ok(())
    }

    pub(crate) async fn handle_devices(&mut self) -> Result<()> {
        let listings: Vec<DeviceListing> = self
            .collaborators
            .network
            .list_clients()
            .into_iter()
            .map(|record| {
                let model = record
                    .model_id
                    .as_deref()
                    .and_then(|id| self.collaborators.models.find_model(id));
                let friendly_name = self
                    .collaborators
                    .settings
                    .device_entry(&record.address)
                    .map(|entry| entry.friendly_name);
                DeviceListing::new(record, model, friendly_name)
            })
            .collect();

        let count = listings.len();
        let message = serde_json::to_value(listings)?;
        self.collaborators.transport.emit_event("devices", message).await?;
        info!("Listed {} network clients", count);
        Ok(())
    }

    pub(crate) async fn handle_rename(&mut self, payload: &str) -> Result<()> {
        let request = RenameRequest::parse(payload)?;

        self.collaborators
            .settings
            .rename_device(&request.old, &request.new)
            .map_err(CommandError::store("rename"))?;
        self.stats.devices_renamed += 1;
        info!("Successfully renamed - {} to {}", request.old, request.new);

        // The rename is committed; a lost event does not fail the command
        if let Err(e) = self
            .collaborators
            .transport
            .emit_event("device_renamed", json!({"from": request.old, "to": request.new}))
            .await
        {
            warn!("device_renamed event for '{}' was not delivered: {}", request.new, e);
        }
        Ok(())
    }

    pub(crate) async fn handle_removal(&mut self, payload: &str, mode: RemovalMode) -> Result<()> {
        let command = match mode {
            RemovalMode::Remove => ConfigCommand::Remove,
            RemovalMode::Ban => ConfigCommand::Ban,
        };
        let reference = parse_device_reference(command, payload)?;

        match self.lifecycle.remove(&reference, mode).await? {
            RemovalOutcome::Removed => {
                info!("Successfully {} '{}' from the network", mode.past_tense(), reference)
            }
            RemovalOutcome::AlreadyAbsent => info!(
                "'{}' was not on the network, {} its local entries only",
                reference,
                mode.past_tense()
            ),
        }
        match mode {
            RemovalMode::Remove => self.stats.devices_removed += 1,
            RemovalMode::Ban => self.stats.devices_banned += 1,
        }
        Ok(())
    }

    pub(crate) fn handle_device_options(&mut self, payload: &str) -> Result<()> {
        let request = DeviceOptionsRequest::parse(payload)?;

        let address = self.resolver.resolve(&request.friendly_name);
        if self.collaborators.settings.device_entry(&address).is_none() {
            return Err(CommandError::UnknownDevice(request.friendly_name));
        }
        if request.options.is_empty() {
            warn!("device_options for '{}' carries no options", request.friendly_name);
        }

        let keys: Vec<String> = request.options.keys().cloned().collect();
        self.collaborators
            .settings
            .set_device_options(&address, request.options)
            .map_err(CommandError::store("device_options"))?;
        info!(
            "Changed device options of '{}' ({}): {}",
            request.friendly_name,
            address,
            keys.join(", ")
        );
        Ok(())
    }
}
