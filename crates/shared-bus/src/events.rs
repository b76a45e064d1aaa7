//! # Equipment Events
//!
//! Defines all event types that flow through the shared bus and the topic
//! convention external consumers subscribe to:
//!
//! ```text
//! equipments/status/{field}/{sessionName}      (retained)
//! equipments/lot_validation/{sessionName}      (not retained)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::entities::{StatusField, UNKNOWN_STATE};
use uuid::Uuid;

/// Root of every status topic.
pub const STATUS_TOPIC_ROOT: &str = "equipments/status";

/// Root of every lot-validation topic.
pub const VALIDATION_TOPIC_ROOT: &str = "equipments/lot_validation";

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EquipmentEvent {
    // =========================================================================
    // SESSION STATUS
    // =========================================================================
    /// A tracked session field was (re)written.
    ///
    /// Published on every setter call, including when the value is unchanged.
    StatusChanged {
        /// Session name.
        equipment: String,
        /// Which field.
        field: StatusField,
        /// New value; `None` means unknown.
        value: Option<String>,
    },

    // =========================================================================
    // LOT VALIDATION
    // =========================================================================
    /// A lot-scan report was decided and the decision sent to the tool.
    LotValidated {
        /// Correlates log lines of one validation run.
        correlation_id: Uuid,
        /// Session name.
        equipment: String,
        /// Normalized lot id.
        lot_id: String,
        /// Accept or reject.
        accepted: bool,
        /// Reject reason; always present when `accepted` is false.
        reason: Option<String>,
        /// Decision time.
        decided_at: DateTime<Utc>,
    },
}

impl EquipmentEvent {
    /// Build a status event.
    pub fn status(equipment: impl Into<String>, field: StatusField, value: Option<String>) -> Self {
        Self::StatusChanged {
            equipment: equipment.into(),
            field,
            value,
        }
    }

    /// Get the topic category for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::StatusChanged { .. } => EventTopic::Status,
            Self::LotValidated { .. } => EventTopic::LotValidation,
        }
    }

    /// Session name the event belongs to.
    #[must_use]
    pub fn equipment(&self) -> &str {
        match self {
            Self::StatusChanged { equipment, .. } | Self::LotValidated { equipment, .. } => {
                equipment
            }
        }
    }

    /// Full topic path on the external bus.
    #[must_use]
    pub fn topic_path(&self) -> String {
        match self {
            Self::StatusChanged {
                equipment, field, ..
            } => format!("{STATUS_TOPIC_ROOT}/{field}/{equipment}"),
            Self::LotValidated { equipment, .. } => {
                format!("{VALIDATION_TOPIC_ROOT}/{equipment}")
            }
        }
    }

    /// Message body as published on the external bus.
    ///
    /// Status values are sent as plain text (`"Unknown"` when absent);
    /// lot decisions as a JSON object.
    #[must_use]
    pub fn payload(&self) -> String {
        match self {
            Self::StatusChanged { value, .. } => {
                value.clone().unwrap_or_else(|| UNKNOWN_STATE.to_string())
            }
            Self::LotValidated {
                correlation_id,
                lot_id,
                accepted,
                reason,
                decided_at,
                ..
            } => serde_json::json!({
                "correlation_id": correlation_id.to_string(),
                "lot_id": lot_id,
                "accept": accepted,
                "reason": reason,
                "decided_at": decided_at.to_rfc3339(),
            })
            .to_string(),
        }
    }

    /// Status topics keep their last value for late subscribers.
    #[must_use]
    pub fn is_retained(&self) -> bool {
        matches!(self, Self::StatusChanged { .. })
    }
}

/// Event topic categories for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Session status fields.
    Status,
    /// Lot accept/reject decisions.
    LotValidation,
    /// Wildcard.
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topic categories to receive; empty means all.
    pub topics: Vec<EventTopic>,
    /// Restrict to one session; `None` means every session.
    pub equipment: Option<String>,
}

impl EventFilter {
    /// Subscribe to every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Subscribe to the given topic categories.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            equipment: None,
        }
    }

    /// Narrow the filter to one session.
    #[must_use]
    pub fn for_equipment(mut self, equipment: impl Into<String>) -> Self {
        self.equipment = Some(equipment.into());
        self
    }

    /// Check whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &EquipmentEvent) -> bool {
        let topic_ok = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());
        let equipment_ok = self
            .equipment
            .as_deref()
            .map_or(true, |name| name == event.equipment());
        topic_ok && equipment_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_topic_path() {
        let event = EquipmentEvent::status("DB01", StatusField::ControlState, None);
        assert_eq!(event.topic_path(), "equipments/status/control_state/DB01");
        assert_eq!(event.payload(), "Unknown");
        assert!(event.is_retained());
    }

    #[test]
    fn test_lot_validated_payload() {
        let event = EquipmentEvent::LotValidated {
            correlation_id: Uuid::nil(),
            equipment: "DB01".into(),
            lot_id: "LOT1".into(),
            accepted: false,
            reason: Some("lot is on hold".into()),
            decided_at: Utc::now(),
        };
        assert_eq!(event.topic_path(), "equipments/lot_validation/DB01");
        assert!(!event.is_retained());

        let body: serde_json::Value = serde_json::from_str(&event.payload()).unwrap();
        assert_eq!(body["lot_id"], "LOT1");
        assert_eq!(body["accept"], false);
        assert_eq!(body["reason"], "lot is on hold");
    }

    #[test]
    fn test_filter_all() {
        let filter = EventFilter::all();
        let event = EquipmentEvent::status("DB01", StatusField::Program, Some("P1".into()));
        assert!(filter.matches(&event));
    }

    #[test]
    fn test_filter_by_topic_and_equipment() {
        let filter = EventFilter::topics(vec![EventTopic::Status]).for_equipment("DB01");

        let mine = EquipmentEvent::status("DB01", StatusField::Program, None);
        let other = EquipmentEvent::status("WB02", StatusField::Program, None);
        let decision = EquipmentEvent::LotValidated {
            correlation_id: Uuid::nil(),
            equipment: "DB01".into(),
            lot_id: "L".into(),
            accepted: true,
            reason: None,
            decided_at: Utc::now(),
        };

        assert!(filter.matches(&mine));
        assert!(!filter.matches(&other));
        assert!(!filter.matches(&decision));
    }
}
