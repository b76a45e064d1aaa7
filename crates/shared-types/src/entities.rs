//! # Core Equipment Entities
//!
//! Identity and link-level state of a configured tool.
//!
//! ## Clusters
//!
//! - **Identity**: `EquipmentIdentity`, `ConnectMode`
//! - **Link state**: `ConnectionState`
//! - **Publication**: `StatusField`, `UNKNOWN_STATE`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload published for a status field whose value is not known
/// (session not communicating, or never queried).
pub const UNKNOWN_STATE: &str = "Unknown";

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Which side opens the TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectMode {
    /// The host connects out to the tool.
    #[default]
    #[serde(alias = "active")]
    Active,
    /// The host listens and the tool connects in.
    #[serde(alias = "passive")]
    Passive,
}

/// One configured tool, as persisted in the equipment list.
///
/// Field names match the persisted JSON document exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentIdentity {
    /// Unique session name; also the last segment of every status topic.
    pub equipment_name: String,
    /// Model tag used to select the static model tables.
    pub equipment_model: String,
    /// Network address of the tool (or bind address in passive mode).
    pub address: String,
    /// TCP port.
    pub port: u16,
    /// Session / device id carried in every message header.
    pub session_id: u16,
    /// Active or passive connect.
    #[serde(default)]
    pub connect_mode: ConnectMode,
    /// Free-form device classification (e.g. `"EQUIPMENT"`).
    #[serde(default)]
    pub device_type: String,
    /// Administrative intent, independent of the link.
    #[serde(default)]
    pub enable: bool,
}

impl EquipmentIdentity {
    /// Create an identity with default connect mode, enabled.
    pub fn new(
        equipment_name: impl Into<String>,
        equipment_model: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        session_id: u16,
    ) -> Self {
        Self {
            equipment_name: equipment_name.into(),
            equipment_model: equipment_model.into(),
            address: address.into(),
            port,
            session_id,
            connect_mode: ConnectMode::Active,
            device_type: "EQUIPMENT".to_string(),
            enable: true,
        }
    }
}

// =============================================================================
// CLUSTER B: LINK STATE
// =============================================================================

/// HSMS-style link state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// No TCP connection.
    #[default]
    NotCommunicating,
    /// Connected (or listening), waiting for the select handshake.
    WaitSelected,
    /// Selected; data messages may flow.
    Communicating,
}

impl ConnectionState {
    /// Wire/bus representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotCommunicating => "NOT_COMMUNICATING",
            Self::WaitSelected => "WAIT_SELECTED",
            Self::Communicating => "COMMUNICATING",
        }
    }

    /// True only for the selected state.
    #[must_use]
    pub fn is_communicating(&self) -> bool {
        matches!(self, Self::Communicating)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CLUSTER C: PUBLICATION
// =============================================================================

/// Session fields that are republished on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusField {
    /// Administrative enable flag.
    Enable,
    /// Link state.
    ConnectionState,
    /// Business control state ("On-Line/Remote", ...).
    ControlState,
    /// Model-specific processing phase.
    ProcessState,
    /// Currently selected process program.
    Program,
    /// Lot currently open on the tool.
    ActiveLot,
}

impl StatusField {
    /// Topic segment for this field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::ConnectionState => "connection_state",
            Self::ControlState => "control_state",
            Self::ProcessState => "process_state",
            Self::Program => "program",
            Self::ActiveLot => "active_lot",
        }
    }
}

impl fmt::Display for StatusField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_parses_persisted_shape() {
        let json = r#"{
            "equipment_name": "DB01",
            "equipment_model": "DIE_BONDER",
            "address": "10.0.0.5",
            "port": 5000,
            "session_id": 1,
            "connect_mode": "ACTIVE",
            "device_type": "EQUIPMENT",
            "enable": true
        }"#;
        let identity: EquipmentIdentity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.equipment_name, "DB01");
        assert_eq!(identity.connect_mode, ConnectMode::Active);
        assert!(identity.enable);
    }

    #[test]
    fn test_connect_mode_accepts_lowercase() {
        let mode: ConnectMode = serde_json::from_str("\"passive\"").unwrap();
        assert_eq!(mode, ConnectMode::Passive);
    }

    #[test]
    fn test_connection_state_strings() {
        assert_eq!(ConnectionState::WaitSelected.to_string(), "WAIT_SELECTED");
        assert!(ConnectionState::Communicating.is_communicating());
        assert!(!ConnectionState::NotCommunicating.is_communicating());
    }

    #[test]
    fn test_status_field_segments() {
        assert_eq!(StatusField::ControlState.as_str(), "control_state");
        assert_eq!(StatusField::ActiveLot.as_str(), "active_lot");
    }
}
