//! Configuration plane service
//!
//! The plane owns the [`Dispatcher`] and drains a bounded command queue on a
//! single task, so at most one configuration command is in flight at any
//! time. Everything outside the task talks to it through a cloneable
//! [`ConfigPlaneHandle`].

use bytes::Bytes;
use meshgate_core::{BridgeStatus, LastSeenPolicy, TransportError};
use meshgate_state::LAST_SEEN_OPTION;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::PlaneConfig;
use crate::dispatcher::{Collaborators, Dispatcher, PlaneStats};
use crate::error::{BridgeError, Result};

/// Messages accepted by the plane task
#[derive(Debug)]
pub enum PlaneCommand {
    /// Inbound transport message; `reply` receives whether it was claimed
    Inbound {
        /// Topic the message arrived on
        topic: String,
        /// Raw payload
        payload: Bytes,
        /// Claim acknowledgement
        reply: oneshot::Sender<bool>,
    },
    /// Publish the status snapshot now
    PublishStatus(oneshot::Sender<std::result::Result<BridgeStatus, TransportError>>),
    /// Get plane statistics
    GetStats(oneshot::Sender<PlaneStats>),
    /// Stop the plane
    Shutdown,
}

/// Handle for talking to a running [`ConfigPlane`]
#[derive(Clone)]
pub struct ConfigPlaneHandle {
    command_tx: mpsc::Sender<PlaneCommand>,
}

impl ConfigPlaneHandle {
    /// Dispatch a message and wait until the plane has handled it
    pub async fn dispatch(&self, topic: impl Into<String>, payload: impl Into<Bytes>) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(PlaneCommand::Inbound {
                topic: topic.into(),
                payload: payload.into(),
                reply: tx,
            })
            .await?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    /// Publish the status snapshot
    pub async fn publish_status(&self) -> Result<BridgeStatus> {
        let (tx, rx) = oneshot::channel();
        self.command_tx.send(PlaneCommand::PublishStatus(tx)).await?;
        let status = rx.await.map_err(|_| BridgeError::ChannelClosed)??;
        Ok(status)
    }

    /// Get plane statistics
    pub async fn stats(&self) -> Result<PlaneStats> {
        let (tx, rx) = oneshot::channel();
        self.command_tx.send(PlaneCommand::GetStats(tx)).await?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    /// Stop the plane after the queued messages
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx.send(PlaneCommand::Shutdown).await?;
        Ok(())
    }
}

/// Configuration plane of the bridge
pub struct ConfigPlane {
    config: PlaneConfig,
    dispatcher: Dispatcher,
    command_rx: mpsc::Receiver<PlaneCommand>,
}

impl ConfigPlane {
    /// Create a plane and the handle used to feed it
    pub fn new(config: PlaneConfig, collaborators: Collaborators) -> (Self, ConfigPlaneHandle) {
        let (command_tx, command_rx) = mpsc::channel(config.queue_size.max(1));
        let dispatcher = Dispatcher::new(&config, collaborators);

        let plane = Self {
            config,
            dispatcher,
            command_rx,
        };
        (plane, ConfigPlaneHandle { command_tx })
    }

    /// Plane configuration
    pub fn config(&self) -> &PlaneConfig {
        &self.config
    }

    /// Apply startup settings, subscribe to every command topic and publish the status
    pub async fn start(&mut self) -> Result<()> {
        self.config.validate()?;

        let collaborators = &self.dispatcher.collaborators;
        collaborators.log_sinks.set_level(self.config.log_level);

        if self.config.last_seen != LastSeenPolicy::Disabled
            && collaborators.settings.global_option(LAST_SEEN_OPTION).is_none()
        {
            if let Err(e) = collaborators
                .settings
                .set_global_option(LAST_SEEN_OPTION, Value::from(self.config.last_seen.as_str()))
            {
                warn!("Could not store default last_seen policy: {}", e);
            }
        }

        let subscription = self.config.command_subscription();
        collaborators.transport.subscribe(&subscription).await?;
        debug!("Subscribed to {}", subscription);

        self.dispatcher.publish_status().await?;
        Ok(())
    }

    /// Start the plane and process commands until shutdown
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;
        info!("Configuration plane listening on {}", self.config.command_subscription());

        while let Some(command) = self.command_rx.recv().await {
            match command {
                PlaneCommand::Inbound {
                    topic,
                    payload,
                    reply,
                } => {
                    let claimed = self.dispatcher.dispatch(&topic, &payload).await;
                    let _ = reply.send(claimed);
                }
                PlaneCommand::PublishStatus(reply) => {
                    let _ = reply.send(self.dispatcher.publish_status().await);
                }
                PlaneCommand::GetStats(reply) => {
                    let _ = reply.send(self.dispatcher.stats().clone());
                }
                PlaneCommand::Shutdown => {
                    info!("Configuration plane shutdown requested");
                    break;
                }
            }
        }

        let stats = self.dispatcher.stats();
        info!(
            "Configuration plane stopped: claimed={}, ignored={}, failed={}",
            stats.messages_claimed, stats.messages_ignored, stats.commands_failed
        );
        Ok(())
    }
}
