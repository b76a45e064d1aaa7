//! # Shared Bus - Equipment Status Event Bus
//!
//! Carries derived session status from the session controllers to outside
//! consumers.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Session     │                    │  Consumer    │
//! │  Controller  │    publish()       │  (bridge,    │
//! │              │ ──────┐            │   monitor)   │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │ ─────────┘
//!                  │  (retained)  │  subscribe()
//!                  └──────────────┘
//! ```
//!
//! Status topics are retained: the bus keeps the last payload per topic path
//! so a consumer attaching late still sees the current state.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EquipmentEvent, EventFilter, EventTopic, STATUS_TOPIC_ROOT, VALIDATION_TOPIC_ROOT};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
