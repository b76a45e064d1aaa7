//! Adapters: concrete implementations behind the outbound ports, plus the
//! bus publisher that turns state changes into status topics.

pub mod lot_lookup;
pub mod publisher;
pub mod recipe_store;
pub mod rules_file;

pub use lot_lookup::InMemoryLotLookup;
pub use publisher::StatusPublisher;
pub use recipe_store::FsRecipeStore;
pub use rules_file::RuleCatalog;
