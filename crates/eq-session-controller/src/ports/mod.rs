//! Ports module for the Equipment Session Controller
//!
//! Defines inbound (API) and outbound (SPI) port traits.

pub mod inbound;
pub mod outbound;

pub use inbound::{EquipmentControlApi, SessionEventHandler};
pub use outbound::{LotLookup, RecipeKey, RecipeSlot, RecipeStore, SessionFacade};
