//! Bridge status snapshot publishing
//!
//! The snapshot is never cached: both fields are read from their owners
//! (the log sinks and the network controller) at the moment of publish.

use meshgate_core::{BridgeStatus, NetworkController, PublishOptions, Transport, TransportError};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::logging::LogSinks;

/// Publishes the retained `{log_level, permit_join}` snapshot
#[derive(Clone)]
pub struct StatusPublisher {
    topic: String,
    network: Arc<dyn NetworkController>,
    transport: Arc<dyn Transport>,
    log_sinks: LogSinks,
}

impl StatusPublisher {
    /// Create a publisher for the given status topic
    pub fn new(
        topic: impl Into<String>,
        network: Arc<dyn NetworkController>,
        transport: Arc<dyn Transport>,
        log_sinks: LogSinks,
    ) -> Self {
        Self {
            topic: topic.into(),
            network,
            transport,
            log_sinks,
        }
    }

    /// Current status, read from the owners
    pub fn snapshot(&self) -> BridgeStatus {
        BridgeStatus {
            log_level: self.log_sinks.level(),
            permit_join: self.network.join_permission(),
        }
    }

    /// Publish the current status, retained at QoS 0
    pub async fn publish(&self) -> Result<BridgeStatus, TransportError> {
        let status = self.snapshot();
        let payload = json!({
            "log_level": status.log_level.as_str(),
            "permit_join": status.permit_join,
        });

        self.transport
            .publish(&self.topic, payload.to_string(), PublishOptions::retained())
            .await?;
        debug!(
            "Published bridge status: log_level={}, permit_join={}",
            status.log_level, status.permit_join
        );
        Ok(status)
    }
}
