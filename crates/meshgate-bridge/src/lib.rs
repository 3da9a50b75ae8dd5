//! Configuration plane for a mesh network bridge
//!
//! This crate turns `<base>/bridge/config/<command>` messages arriving on a
//! pub/sub transport into changes on the mesh network controller, the
//! settings store and the runtime device-state cache, and publishes the
//! resulting bridge status.
//!
//! # Architecture
//!
//! 1. **Dispatch** - [`Dispatcher`] claims topics under the command prefix
//!    and routes the last segment through [`ConfigCommand`]
//! 2. **Validation** - typed requests in [`command`] reject bad payloads
//!    before any collaborator is touched
//! 3. **Execution** - handlers, the [`DeviceResolver`] and the
//!    [`LifecycleCoordinator`] act on the injected [`Collaborators`]
//! 4. **Publication** - [`StatusPublisher`] emits the retained
//!    `{log_level, permit_join}` snapshot
//!
//! [`ConfigPlane`] owns the dispatcher and processes one message at a time.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use meshgate_bridge::{Collaborators, ConfigPlane, PlaneConfigBuilder};
//!
//! let config = PlaneConfigBuilder::new().base_topic("home/mesh").build();
//! let (plane, handle) = ConfigPlane::new(config, collaborators);
//! tokio::spawn(plane.run());
//!
//! handle.dispatch("home/mesh/bridge/config/permit_join", "true").await?;
//! ```
//!
//! # Commands
//!
//! | Command          | Payload                                      |
//! |------------------|----------------------------------------------|
//! | `permit_join`    | `true` enables, anything else disables       |
//! | `reset`          | ignored                                      |
//! | `last_seen`      | `disabled`, `ISO_8601`, `epoch`, `ISO_8601_local` |
//! | `elapsed`        | `true` enables, anything else disables       |
//! | `log_level`      | `error`, `warn`, `info`, `debug`             |
//! | `devices`        | ignored                                      |
//! | `rename`         | `{"old": "...", "new": "..."}`               |
//! | `remove` / `ban` | friendly name or address                     |
//! | `device_options` | `{"friendly_name": "...", "options": {...}}` |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod plane;
pub mod resolver;
pub mod status;

pub mod test_utils;

pub use command::{ConfigCommand, DeviceOptionsRequest, RenameRequest};
pub use config::{PlaneConfig, PlaneConfigBuilder, DEFAULT_BASE_TOPIC, DEFAULT_QUEUE_SIZE};
pub use dispatcher::{Collaborators, Dispatcher, PlaneStats};
pub use error::{BridgeError, Result};
pub use handlers::DeviceListing;
pub use lifecycle::{LifecycleCoordinator, RemovalMode, RemovalOutcome};
pub use logging::LogSinks;
pub use models::StaticModelTable;
pub use plane::{ConfigPlane, ConfigPlaneHandle, PlaneCommand};
pub use resolver::DeviceResolver;
pub use status::StatusPublisher;
pub use test_utils::{MockController, RecordingSink, RecordingTransport, TestFixture};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
