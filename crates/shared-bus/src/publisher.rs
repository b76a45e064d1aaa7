//! # Event Publisher
//!
//! Defines the publishing side of the event bus.

use crate::events::{EquipmentEvent, EventFilter};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Trait for publishing events to the bus.
///
/// This is the interface session controllers use to republish derived
/// equipment status for outside consumers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscribers that received the event.
    async fn publish(&self, event: EquipmentEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics
/// and keeps the last payload of every retained topic so late subscribers
/// (or a bridge to an external broker) can read the current status.
pub struct InMemoryEventBus {
    /// Broadcast sender for events.
    sender: broadcast::Sender<EquipmentEvent>,

    /// Last payload per retained topic path.
    retained: RwLock<HashMap<String, String>>,

    /// Active subscription count by filter.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total events published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            retained: RwLock::new(HashMap::new()),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let filter_key = format!("{:?}/{:?}", filter.topics, filter.equipment);

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(filter_key.clone()).or_insert(0) += 1;
        }

        debug!(topics = ?filter.topics, equipment = ?filter.equipment, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), filter_key)
    }

    /// Last retained payload published on `topic_path`.
    #[must_use]
    pub fn retained(&self, topic_path: &str) -> Option<String> {
        self.retained
            .read()
            .ok()
            .and_then(|map| map.get(topic_path).cloned())
    }

    /// Every retained topic with its last payload, sorted by topic.
    #[must_use]
    pub fn retained_snapshot(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .retained
            .read()
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        entries.sort();
        entries
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EquipmentEvent) -> usize {
        let topic_path = event.topic_path();

        // Always increment counter (event was attempted)
        self.events_published.fetch_add(1, Ordering::Relaxed);

        if event.is_retained() {
            if let Ok(mut map) = self.retained.write() {
                map.insert(topic_path.clone(), event.payload());
            }
        }

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(topic = %topic_path, receivers = receiver_count, "Event published");
                receiver_count
            }
            Err(_) => {
                // No live receivers; retained value is still recorded
                trace!(topic = %topic_path, "Event published with no receivers");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
