//! Service layer
//!
//! ```text
//! facade callback ──► EquipmentController ──► StateTracker (direct updates)
//!                            │
//!                            └── mpsc ──► session worker
//!                                           ├── SubscriptionManager
//!                                           ├── StatusQueries
//!                                           ├── LotValidationPipeline ──► RecipeSync
//!                                           └── Transactor ──► SessionFacade
//! ```

pub mod controller;
pub mod recipe;
pub mod status;
pub mod subscription;
pub mod tracker;
pub mod transaction;
pub mod validation;
pub mod worker;

pub use controller::{EquipmentController, EquipmentControllerBuilder};
pub use recipe::RecipeSync;
pub use status::StatusQueries;
pub use subscription::SubscriptionManager;
pub use tracker::StateTracker;
pub use transaction::Transactor;
pub use validation::{LotValidationPipeline, ValidationOutcome};
