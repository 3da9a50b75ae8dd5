//! Command dispatcher
//!
//! Maps `<base>/bridge/config/<command>` messages to handlers. The return
//! value of [`Dispatcher::dispatch`] only says whether the topic belonged to
//! the configuration plane; whether the command succeeded is reported through
//! logging and the emitted events.

use meshgate_core::{
    BridgeStatus, DeviceStateCache, ModelLookup, NetworkController, Result, SettingsStore,
    Transport, TransportError,
};
use std::sync::Arc;
use tracing::{error, trace};

use crate::command::ConfigCommand;
use crate::config::PlaneConfig;
use crate::lifecycle::{LifecycleCoordinator, RemovalMode};
use crate::logging::LogSinks;
use crate::resolver::DeviceResolver;
use crate::status::StatusPublisher;

/// Everything the handlers act upon, injected at construction
#[derive(Clone)]
pub struct Collaborators {
    /// Mesh network controller
    pub network: Arc<dyn NetworkController>,
    /// Persisted settings
    pub settings: Arc<dyn SettingsStore>,
    /// Runtime device state
    pub state_cache: Arc<dyn DeviceStateCache>,
    /// Pub/sub transport
    pub transport: Arc<dyn Transport>,
    /// Device model table
    pub models: Arc<dyn ModelLookup>,
    /// Log sinks following the `log_level` command
    pub log_sinks: LogSinks,
}

/// Dispatcher counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaneStats {
    /// Messages addressed to a supported command
    pub messages_claimed: u64,
    /// Messages left for other handlers
    pub messages_ignored: u64,
    /// Claimed messages whose command failed
    pub commands_failed: u64,
    /// Devices removed
    pub devices_removed: u64,
    /// Devices banned
    pub devices_banned: u64,
    /// Devices renamed
    pub devices_renamed: u64,
    /// Status snapshots published
    pub status_publishes: u64,
}

/// Routes configuration commands to their handlers
pub struct Dispatcher {
    pub(crate) prefix: String,
    pub(crate) resolver: DeviceResolver,
    pub(crate) lifecycle: LifecycleCoordinator,
    pub(crate) status: StatusPublisher,
    pub(crate) collaborators: Collaborators,
    pub(crate) stats: PlaneStats,
}

impl Dispatcher {
    /// Create a dispatcher for the topics described by `config`
    pub fn new(config: &PlaneConfig, collaborators: Collaborators) -> Self {
        let resolver = DeviceResolver::new(collaborators.settings.clone());
        let lifecycle = LifecycleCoordinator::new(
            resolver.clone(),
            collaborators.network.clone(),
            collaborators.settings.clone(),
            collaborators.state_cache.clone(),
            collaborators.transport.clone(),
        );
        let status = StatusPublisher::new(
            config.status_topic(),
            collaborators.network.clone(),
            collaborators.transport.clone(),
            collaborators.log_sinks.clone(),
        );

        Self {
            prefix: config.command_prefix(),
            resolver,
            lifecycle,
            status,
            collaborators,
            stats: PlaneStats::default(),
        }
    }

    /// Counters so far
    pub fn stats(&self) -> &PlaneStats {
        &self.stats
    }

    /// Handle one inbound message, returning whether the topic was claimed
    pub async fn dispatch(&mut self, topic: &str, payload: &[u8]) -> bool {
        let Some(command) = ConfigCommand::from_topic(&self.prefix, topic) else {
            trace!("Ignoring message on {}", topic);
            self.stats.messages_ignored += 1;
            return false;
        };
        self.stats.messages_claimed += 1;

        let payload = String::from_utf8_lossy(payload);
        if let Err(err) = self.execute(command, &payload).await {
            self.stats.commands_failed += 1;
            error!(
                "{} command failed [{}]: {} (payload: '{}')",
                command,
                err.error_code(),
                err,
                payload
            );
        }
        true
    }

    /// Publish the status snapshot
    pub async fn publish_status(&mut self) -> std::result::Result<BridgeStatus, TransportError> {
        let status = self.status.publish().await?;
        self.stats.status_publishes += 1;
        Ok(status)
    }

    async fn execute(&mut self, command: ConfigCommand, payload: &str) -> Result<()> {
        match command {
            ConfigCommand::PermitJoin => self.handle_permit_join(payload).await,
            ConfigCommand::Reset => self.handle_reset().await,
            ConfigCommand::LastSeen => self.handle_last_seen(payload),
            ConfigCommand::Elapsed => self.handle_elapsed(payload),
            ConfigCommand::LogLevel => self.handle_log_level(payload).await,
            ConfigCommand::Devices => self.handle_devices().await,
            ConfigCommand::Rename => self.handle_rename(payload).await,
            ConfigCommand::Remove => self.handle_removal(payload, RemovalMode::Remove).await,
            ConfigCommand::Ban => self.handle_removal(payload, RemovalMode::Ban).await,
            ConfigCommand::DeviceOptions => self.handle_device_options(payload),
        }
    }
}
