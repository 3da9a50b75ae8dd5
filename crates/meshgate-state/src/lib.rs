//! Meshgate State - Settings persistence and device state caching
//!
//! ## Components
//!
//! - **settings**: [`MemorySettings`], the settings store with JSON snapshot persistence
//! - **cache**: [`StateCache`], runtime device state keyed by canonical address
//! - **error**: State-specific error types
//!
//! ## Example
//!
//! ```ignore
//! use meshgate_state::{MemorySettings, StateCache};
//! use std::sync::Arc;
//!
//! let settings = Arc::new(MemorySettings::open("settings.json")?);
//! let cache = Arc::new(StateCache::new());
//! ```

pub mod cache;
pub mod error;
pub mod settings;

// Re-exports for convenience
pub use cache::{DeviceState, StateCache};
pub use error::{Result, StateError};
pub use settings::{MemorySettings, SettingsSnapshot, ELAPSED_OPTION, LAST_SEEN_OPTION};
