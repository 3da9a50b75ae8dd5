//! Command registry and payload validation
//!
//! The set of configuration commands is fixed, so the registry is an enum
//! with an exhaustive match rather than a runtime table. Each command that
//! carries structured data has a typed request parsed from the raw payload;
//! a parse failure is a [`CommandError`] and the command is dropped before
//! any collaborator is touched.

use meshgate_core::{CommandError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// Configuration commands addressed by the last topic segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigCommand {
    /// Allow or deny joining (`"true"` enables, anything else disables)
    PermitJoin,
    /// Soft reset the coordinator
    Reset,
    /// Set the last-seen policy
    LastSeen,
    /// Toggle elapsed-time reporting
    Elapsed,
    /// Change the log threshold
    LogLevel,
    /// List network clients
    Devices,
    /// Rename a device
    Rename,
    /// Remove a device
    Remove,
    /// Remove and denylist a device
    Ban,
    /// Merge per-device options
    DeviceOptions,
}

impl ConfigCommand {
    /// Every supported command
    pub const ALL: [ConfigCommand; 10] = [
        ConfigCommand::PermitJoin,
        ConfigCommand::Reset,
        ConfigCommand::LastSeen,
        ConfigCommand::Elapsed,
        ConfigCommand::LogLevel,
        ConfigCommand::Devices,
        ConfigCommand::Rename,
        ConfigCommand::Remove,
        ConfigCommand::Ban,
        ConfigCommand::DeviceOptions,
    ];

    /// Topic segment naming this command
    pub fn name(&self) -> &'static str {
        match self {
            ConfigCommand::PermitJoin => "permit_join",
            ConfigCommand::Reset => "reset",
            ConfigCommand::LastSeen => "last_seen",
            ConfigCommand::Elapsed => "elapsed",
            ConfigCommand::LogLevel => "log_level",
            ConfigCommand::Devices => "devices",
            ConfigCommand::Rename => "rename",
            ConfigCommand::Remove => "remove",
            ConfigCommand::Ban => "ban",
            ConfigCommand::DeviceOptions => "device_options",
        }
    }

    /// Look up a command by name
    pub fn from_name(name: &str) -> Option<Self> {
        let command = match name {
            "permit_join" => ConfigCommand::PermitJoin,
            "reset" => ConfigCommand::Reset,
            "last_seen" => ConfigCommand::LastSeen,
            "elapsed" => ConfigCommand::Elapsed,
            "log_level" => ConfigCommand::LogLevel,
            "devices" => ConfigCommand::Devices,
            "rename" => ConfigCommand::Rename,
            "remove" => ConfigCommand::Remove,
            "ban" => ConfigCommand::Ban,
            "device_options" => ConfigCommand::DeviceOptions,
            _ => return None,
        };
        Some(command)
    }

    /// Match a topic under `prefix` and return the command in its last segment
    pub fn from_topic(prefix: &str, topic: &str) -> Option<Self> {
        let rest = topic.strip_prefix(prefix)?;
        let name = rest.rsplit('/').next()?;
        Self::from_name(name)
    }
}

impl fmt::Display for ConfigCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercased payload equal to `"true"` enables; everything else disables.
///
/// Payloads that are neither `true` nor `false` are still accepted but logged.
pub fn parse_flag(command: ConfigCommand, payload: &str) -> bool {
    let lowered = payload.to_lowercase();
    if lowered != "true" && lowered != "false" {
        warn!(
            "{} payload '{}' is not 'true' or 'false', treating it as false",
            command, payload
        );
    }
    lowered == "true"
}

/// Single device reference (friendly name or address), surrounding whitespace removed
pub fn parse_device_reference(command: ConfigCommand, payload: &str) -> Result<String> {
    let reference = payload.trim();
    if reference.is_empty() {
        return Err(CommandError::MalformedPayload {
            command: command.name(),
            reason: "expected a friendly name or device address".to_string(),
        });
    }
    Ok(reference.to_string())
}

#[derive(Deserialize)]
struct RawRename {
    old: Option<String>,
    new: Option<String>,
}

/// Payload of the `rename` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    /// Friendly name currently in use
    pub old: String,
    /// Friendly name to move to
    pub new: String,
}

impl RenameRequest {
    /// Parse `{"old": "...", "new": "..."}`; any missing field is one error
    pub fn parse(payload: &str) -> Result<Self> {
        let malformed = || CommandError::MalformedPayload {
            command: ConfigCommand::Rename.name(),
            reason: format!(
                r#"expected {{"old": "friendly_name", "new": "new_name"}}, got '{}'"#,
                payload
            ),
        };

        let raw: RawRename = serde_json::from_str(payload).map_err(|_| malformed())?;
        match (raw.old, raw.new) {
            (Some(old), Some(new)) => Ok(Self { old, new }),
            _ => Err(malformed()),
        }
    }
}

#[derive(Deserialize)]
struct RawDeviceOptions {
    friendly_name: Option<String>,
    options: Option<Map<String, Value>>,
}

/// Payload of the `device_options` command
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceOptionsRequest {
    /// Device to update
    pub friendly_name: String,
    /// Options to merge into the device entry
    pub options: Map<String, Value>,
}

impl DeviceOptionsRequest {
    /// Parse `{"friendly_name": "...", "options": {...}}`
    pub fn parse(payload: &str) -> Result<Self> {
        let malformed = || CommandError::MalformedPayload {
            command: ConfigCommand::DeviceOptions.name(),
            reason: format!(
                r#"expected {{"friendly_name": "name", "options": {{...}}}}, got '{}'"#,
                payload
            ),
        };

        let raw: RawDeviceOptions = serde_json::from_str(payload).map_err(|_| malformed())?;
        match (raw.friendly_name, raw.options) {
            (Some(friendly_name), Some(options)) => Ok(Self {
                friendly_name,
                options,
            }),
            _ => Err(malformed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PREFIX: &str = "meshgate/bridge/config/";

    #[test]
    fn test_names_round_trip() {
        for command in ConfigCommand::ALL {
            assert_eq!(ConfigCommand::from_name(command.name()), Some(command));
        }
        assert_eq!(ConfigCommand::from_name("PERMIT_JOIN"), None);
        assert_eq!(ConfigCommand::from_name("groups"), None);
    }

    #[test]
    fn test_from_topic() {
        assert_eq!(
            ConfigCommand::from_topic(PREFIX, "meshgate/bridge/config/rename"),
            Some(ConfigCommand::Rename)
        );
        assert_eq!(
            ConfigCommand::from_topic(PREFIX, "meshgate/bridge/config/nested/ban"),
            Some(ConfigCommand::Ban)
        );
        assert_eq!(ConfigCommand::from_topic(PREFIX, "meshgate/bridge/config/"), None);
        assert_eq!(ConfigCommand::from_topic(PREFIX, "meshgate/bridge/config"), None);
        assert_eq!(ConfigCommand::from_topic(PREFIX, "other/bridge/config/rename"), None);
        assert_eq!(ConfigCommand::from_topic(PREFIX, "meshgate/lamp1/set"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(ConfigCommand::PermitJoin, "true"));
        assert!(parse_flag(ConfigCommand::PermitJoin, "TRUE"));
        assert!(!parse_flag(ConfigCommand::PermitJoin, "false"));
        assert!(!parse_flag(ConfigCommand::PermitJoin, "yes"));
        assert!(!parse_flag(ConfigCommand::PermitJoin, " true"));
        assert!(!parse_flag(ConfigCommand::PermitJoin, ""));
    }

    #[test]
    fn test_parse_device_reference() {
        assert_eq!(
            parse_device_reference(ConfigCommand::Remove, "  lamp1\n").unwrap(),
            "lamp1"
        );
        assert!(parse_device_reference(ConfigCommand::Ban, "   ").is_err());
    }

    #[test]
    fn test_rename_request() {
        let req = RenameRequest::parse(r#"{"old":"lamp1","new":"kitchen_lamp"}"#).unwrap();
        assert_eq!(req.old, "lamp1");
        assert_eq!(req.new, "kitchen_lamp");
    }

    #[test]
    fn test_rename_missing_fields_is_one_error() {
        for payload in [r#"{"old":"lamp1"}"#, r#"{"new":"x"}"#, "{}", "lamp1", r#"{"old":1,"new":"x"}"#] {
            let err = RenameRequest::parse(payload).unwrap_err();
            assert_eq!(err.error_code(), "MALFORMED_PAYLOAD", "payload {}", payload);
            assert!(err.to_string().contains("friendly_name"));
        }
    }

    #[test]
    fn test_device_options_request() {
        let payload = json!({"friendly_name": "lamp1", "options": {"retain": true}}).to_string();
        let req = DeviceOptionsRequest::parse(&payload).unwrap();
        assert_eq!(req.friendly_name, "lamp1");
        assert_eq!(req.options.get("retain"), Some(&json!(true)));

        assert!(DeviceOptionsRequest::parse(r#"{"friendly_name":"lamp1"}"#).is_err());
        assert!(DeviceOptionsRequest::parse(r#"{"friendly_name":"lamp1","options":[1]}"#).is_err());
        assert!(DeviceOptionsRequest::parse("not json").is_err());
    }
}
