//! Attached log sinks

use meshgate_core::{LogLevel, LogSink};
use std::sync::Arc;

/// Every log sink whose threshold follows the `log_level` command
#[derive(Clone, Default)]
pub struct LogSinks {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl LogSinks {
    /// No sinks attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink
    pub fn attach(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    /// Attach a sink, builder style
    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.attach(sink);
        self
    }

    /// Apply a threshold to every sink
    pub fn set_level(&self, level: LogLevel) {
        for sink in &self.sinks {
            sink.set_level(level);
        }
    }

    /// Threshold of the first sink, `info` when none is attached
    pub fn level(&self) -> LogLevel {
        self.sinks.first().map(|sink| sink.level()).unwrap_or_default()
    }

    /// Number of attached sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sink is attached
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
