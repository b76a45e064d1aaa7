//! # Equipment Session Controller
//!
//! One controller per factory tool. It tracks the link, control, process,
//! program and lot state of a SECS/GEM session, rebuilds the tool's event
//! subscriptions after every connect, validates scanned lots against the
//! package-code rule book, keeps process programs in sync between the local
//! store and the tool, and republishes derived status on the event bus.
//!
//! The wire protocol itself (framing, encoding, transaction matching) sits
//! behind the `SessionFacade` port and is not implemented here.
//!
//! ## Architecture
//!
//! - **Domain Layer:** model registry, session state, acknowledgement enums,
//!   selection keys, rules, typed event reports
//! - **Ports Layer:** facade callbacks and operator API (inbound); facade,
//!   lot lookup and recipe store (outbound)
//! - **Service Layer:** tracker, subscription handshake, status queries,
//!   lot validation, recipe sync, the per-session worker
//! - **Adapters Layer:** bus publisher, filesystem recipe store, rule file
//!   loader, in-memory lot lookup
//!
//! ## Concurrency
//!
//! Facade callbacks never issue requests themselves. Anything that needs a
//! request/response transaction is queued on the session's worker, which
//! runs one item at a time. Work created under one connection is dropped if
//! the link has moved on.
//!
//! ## Example
//!
//! ```rust,ignore
//! let controller = EquipmentController::builder(identity)
//!     .facade(facade)
//!     .lot_lookup(lookup)
//!     .rules(catalog.book_for("DB01"))
//!     .event_bus(bus)
//!     .build()?;
//! // the facade delivers its callbacks to `controller` (a SessionEventHandler)
//! controller.enable().await?;
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// FEATURE-GATED MODULES
// =============================================================================

/// Simulated equipment and polling helpers.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use adapters::{FsRecipeStore, InMemoryLotLookup, RuleCatalog, StatusPublisher};
pub use config::ControllerConfig;
pub use domain::{
    EquipmentModel, EquipmentSession, LookupError, LotDecision, LotInfo, ModelKind, ModelRegistry,
    RecipeError, RecipeStep, RejectReason, RuleBook, RuleError, SessionError, SubscriptionError,
    TransactionError,
};
pub use ports::{EquipmentControlApi, LotLookup, RecipeStore, SessionEventHandler, SessionFacade};
pub use service::{EquipmentController, EquipmentControllerBuilder};

#[cfg(any(test, feature = "test-utils"))]
pub use testing::{wait_until, SimulatedEquipment};
