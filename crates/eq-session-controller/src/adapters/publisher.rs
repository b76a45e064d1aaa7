//! Outbound status publisher
//!
//! Maps session transitions onto bus events for one session. Status topics
//! are `equipments/status/{field}/{session}`; lot decisions go to
//! `equipments/lot_validation/{session}`.

use chrono::Utc;
use shared_bus::{EquipmentEvent, EventPublisher};
use shared_types::StatusField;
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

use crate::domain::lot::LotDecision;

/// Per-session view of the event bus.
#[derive(Clone)]
pub struct StatusPublisher {
    equipment: String,
    bus: Arc<dyn EventPublisher>,
}

impl StatusPublisher {
    pub fn new(equipment: impl Into<String>, bus: Arc<dyn EventPublisher>) -> Self {
        Self {
            equipment: equipment.into(),
            bus,
        }
    }

    /// Session name events are published under.
    #[must_use]
    pub fn equipment(&self) -> &str {
        &self.equipment
    }

    /// Publish one status field. `None` publishes the unknown sentinel.
    pub async fn status(&self, field: StatusField, value: Option<&str>) {
        let event = EquipmentEvent::status(&self.equipment, field, value.map(str::to_string));
        let receivers = self.bus.publish(event).await;
        trace!(equipment = %self.equipment, field = %field.as_str(), receivers, "status published");
    }

    /// Publish a lot decision.
    pub async fn lot_decision(&self, correlation_id: Uuid, lot_id: &str, decision: &LotDecision) {
        let event = EquipmentEvent::LotValidated {
            correlation_id,
            equipment: self.equipment.clone(),
            lot_id: lot_id.to_string(),
            accepted: decision.accept,
            reason: decision.reason_text().map(str::to_string),
            decided_at: Utc::now(),
        };
        self.bus.publish(event).await;
    }
}
