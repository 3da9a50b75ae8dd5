//! Runtime-adjustable tracing output

use meshgate_core::{LogLevel, LogSink};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Reload handle around the global filter
pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Filter used for a bridge log level
pub fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::new(level.as_str())
}

/// Log sink that swaps the global `EnvFilter` when the level changes
pub struct ReloadSink {
    handle: FilterHandle,
    level: Mutex<LogLevel>,
}

impl ReloadSink {
    /// Wrap a reload handle whose filter currently matches `level`
    pub fn new(handle: FilterHandle, level: LogLevel) -> Self {
        Self {
            handle,
            level: Mutex::new(level),
        }
    }
}

impl LogSink for ReloadSink {
    fn set_level(&self, level: LogLevel) {
        match self.handle.reload(filter_for(level)) {
            Ok(()) => *self.level.lock() = level,
            Err(e) => warn!("Failed to apply log level {}: {}", level, e),
        }
    }

    fn level(&self) -> LogLevel {
        *self.level.lock()
    }
}

/// Install the global subscriber and return the sink controlling it
pub fn init(level: LogLevel) -> anyhow::Result<Arc<ReloadSink>> {
    let (filter, handle) = reload::Layer::new(filter_for(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(Arc::new(ReloadSink::new(handle, level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_follows_reload() {
        let (_layer, handle) = reload::Layer::<EnvFilter, Registry>::new(filter_for(LogLevel::Info));
        let sink = ReloadSink::new(handle, LogLevel::Info);

        sink.set_level(LogLevel::Debug);
        assert_eq!(sink.level(), LogLevel::Debug);
    }

    #[test]
    fn test_level_kept_when_subscriber_gone() {
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(filter_for(LogLevel::Warn));
        drop(layer);
        let sink = ReloadSink::new(handle, LogLevel::Warn);

        sink.set_level(LogLevel::Debug);
        assert_eq!(sink.level(), LogLevel::Warn);
    }
}
