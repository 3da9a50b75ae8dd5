//! Bridge-wide settings exposed through the configuration plane

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;

/// Log threshold applied to every attached log sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    #[default]
    Info,
    /// Everything including debug output
    Debug,
}

impl LogLevel {
    /// All accepted levels, in increasing verbosity
    pub const ALL: [LogLevel; 4] = [LogLevel::Error, LogLevel::Warn, LogLevel::Info, LogLevel::Debug];

    /// Lowercase name, also used as a tracing filter directive
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    fn allowed() -> String {
        Self::ALL.iter().map(LogLevel::as_str).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = CommandError;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == lowered)
            .ok_or_else(|| CommandError::InvalidEnumValue {
                field: "log level",
                value: s.to_string(),
                allowed: LogLevel::allowed(),
            })
    }
}

/// How the last-seen timestamp is attached to device state messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LastSeenPolicy {
    /// Do not report last-seen
    #[default]
    #[serde(rename = "disabled")]
    Disabled,
    /// ISO 8601 in UTC
    #[serde(rename = "ISO_8601")]
    Iso8601,
    /// Milliseconds since the Unix epoch
    #[serde(rename = "epoch")]
    Epoch,
    /// ISO 8601 in the bridge's local timezone
    #[serde(rename = "ISO_8601_local")]
    Iso8601Local,
}

impl LastSeenPolicy {
    /// All accepted policies
    pub const ALL: [LastSeenPolicy; 4] = [
        LastSeenPolicy::Disabled,
        LastSeenPolicy::Iso8601,
        LastSeenPolicy::Epoch,
        LastSeenPolicy::Iso8601Local,
    ];

    /// Literal used on the wire and in the settings file
    pub fn as_str(&self) -> &'static str {
        match self {
            LastSeenPolicy::Disabled => "disabled",
            LastSeenPolicy::Iso8601 => "ISO_8601",
            LastSeenPolicy::Epoch => "epoch",
            LastSeenPolicy::Iso8601Local => "ISO_8601_local",
        }
    }
}

impl fmt::Display for LastSeenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LastSeenPolicy {
    type Err = CommandError;

    /// Exact, case-sensitive match
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LastSeenPolicy::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| CommandError::InvalidEnumValue {
                field: "last_seen policy",
                value: s.to_string(),
                allowed: LastSeenPolicy::ALL
                    .iter()
                    .map(LastSeenPolicy::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Retained bridge status snapshot, rebuilt on every publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Current log threshold
    pub log_level: LogLevel,
    /// Whether new devices may join the mesh
    pub permit_join: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_level_is_case_insensitive() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("trace".parse::<LogLevel>().is_err());
        assert!("".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_last_seen_is_case_sensitive() {
        for policy in LastSeenPolicy::ALL {
            assert_eq!(policy.as_str().parse::<LastSeenPolicy>().unwrap(), policy);
        }
        assert!("iso_8601".parse::<LastSeenPolicy>().is_err());
        assert!("Disabled".parse::<LastSeenPolicy>().is_err());
        assert!("EPOCH".parse::<LastSeenPolicy>().is_err());
    }

    #[test]
    fn test_last_seen_rejection_lists_allowed() {
        let err = "never".parse::<LastSeenPolicy>().unwrap_err();
        assert!(err.to_string().contains("disabled, ISO_8601, epoch, ISO_8601_local"));
    }

    #[test]
    fn test_status_wire_format() {
        let status = BridgeStatus {
            log_level: LogLevel::Warn,
            permit_join: true,
        };
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            json!({"log_level": "warn", "permit_join": true})
        );
    }
}
