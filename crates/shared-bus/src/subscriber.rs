//! # Event Subscriber
//!
//! A filtered view of the bus. Every read path (`recv`, `try_recv`, `drain`)
//! skips non-matching events and counts the events lost to lag.

use crate::events::{EquipmentEvent, EventFilter};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// What one non-blocking read found.
enum Buffered {
    Event(EquipmentEvent),
    Empty,
    Closed,
}

/// A filtered subscription. Dropping it releases its slot in the bus's
/// subscriber count.
pub struct Subscription {
    receiver: broadcast::Receiver<EquipmentEvent>,
    filter: EventFilter,
    /// Live subscribers per filter key, shared with the bus.
    live: Arc<RwLock<HashMap<String, usize>>>,
    filter_key: String,
    lagged: u64,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<EquipmentEvent>,
        filter: EventFilter,
        live: Arc<RwLock<HashMap<String, usize>>>,
        filter_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            live,
            filter_key,
            lagged: 0,
        }
    }

    /// Wait for the next matching event; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EquipmentEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => self.note_lag(missed),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Result<Option<EquipmentEvent>, SubscriptionError> {
        match self.next_buffered() {
            Buffered::Event(event) => Ok(Some(event)),
            Buffered::Empty => Ok(None),
            Buffered::Closed => Err(SubscriptionError::Closed),
        }
    }

    /// Every matching event currently buffered, in publish order.
    pub fn drain(&mut self) -> Vec<EquipmentEvent> {
        std::iter::from_fn(|| match self.next_buffered() {
            Buffered::Event(event) => Some(event),
            Buffered::Empty | Buffered::Closed => None,
        })
        .collect()
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Events this subscriber missed because it fell behind the bus.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    fn next_buffered(&mut self) -> Buffered {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Buffered::Event(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(missed)) => self.note_lag(missed),
                Err(TryRecvError::Empty) => return Buffered::Empty,
                Err(TryRecvError::Closed) => return Buffered::Closed,
            }
        }
    }

    fn note_lag(&mut self, missed: u64) {
        self.lagged += missed;
        warn!(filter = %self.filter_key, missed, total = self.lagged, "subscriber lagged, events lost");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut live) = self.live.write() {
            let remaining = live.get_mut(&self.filter_key).map(|count| {
                *count = count.saturating_sub(1);
                *count
            });
            if remaining == Some(0) {
                live.remove(&self.filter_key);
            }
        }
        debug!(filter = %self.filter_key, lagged = self.lagged, "subscription closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use chrono::Utc;
    use shared_types::entities::StatusField;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    fn decision(equipment: &str) -> EquipmentEvent {
        EquipmentEvent::LotValidated {
            correlation_id: Uuid::new_v4(),
            equipment: equipment.to_string(),
            lot_id: "LOT1".to_string(),
            accepted: true,
            reason: None,
            decided_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscription_recv() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        bus.publish(decision("DB01")).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");

        assert!(matches!(received, EquipmentEvent::LotValidated { .. }));
    }

    #[tokio::test]
    async fn test_subscription_filter() {
        let bus = InMemoryEventBus::new();

        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::LotValidation]));

        // Status event should be filtered
        bus.publish(EquipmentEvent::status("DB01", StatusField::Program, None))
            .await;
        bus.publish(decision("DB01")).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");

        assert!(matches!(received, EquipmentEvent::LotValidated { .. }));
    }

    #[tokio::test]
    async fn test_subscription_drop_cleanup() {
        let bus = InMemoryEventBus::new();

        {
            let _sub1 = bus.subscribe(EventFilter::all());
            let _sub2 = bus.subscribe(EventFilter::all());
            assert_eq!(bus.subscriber_count(), 2);
        }

        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        let result = sub.try_recv();
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_drain_respects_equipment_filter() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all().for_equipment("WB02"));

        bus.publish(decision("DB01")).await;
        bus.publish(decision("WB02")).await;
        bus.publish(decision("WB02")).await;

        let events = sub.drain();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.equipment() == "WB02"));
    }

    #[tokio::test]
    async fn test_lag_is_counted_and_reading_resumes() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());

        for equipment in ["A", "B", "C", "D"] {
            bus.publish(decision(equipment)).await;
        }

        let events = sub.drain();
        assert_eq!(sub.lagged(), 2);
        let names: Vec<&str> = events.iter().map(EquipmentEvent::equipment).collect();
        assert_eq!(names, vec!["C", "D"]);
        assert!(matches!(sub.try_recv(), Ok(None)));
    }
}
