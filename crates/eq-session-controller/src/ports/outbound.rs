//! Outbound Ports (Driven Ports / SPI)
//!
//! Everything the controller consumes: the protocol session facade, lot
//! master data, and local recipe storage.

use async_trait::async_trait;
use shared_types::{SecsItem, StreamFunction};
use std::fmt;

use crate::domain::errors::{LookupError, RecipeError, TransactionError};
use crate::domain::lot::LotInfo;
use crate::domain::model::ModelKind;

/// Request/response access to one HSMS session.
///
/// Framing, encoding and transaction matching live behind this trait.
/// `send_and_wait` must not be called from inside a `SessionEventHandler`
/// callback; the controller hands such work to its session worker.
#[async_trait]
pub trait SessionFacade: Send + Sync {
    /// Send a primary with the W-bit set and wait for the reply body.
    ///
    /// `Ok(None)` is a header-only reply. Callers bound this with their own
    /// timeout.
    async fn send_and_wait(
        &self,
        sf: StreamFunction,
        body: Option<SecsItem>,
    ) -> Result<Option<SecsItem>, TransactionError>;

    /// Send a secondary echoing `system_bytes`.
    async fn send_response(
        &self,
        sf: StreamFunction,
        system_bytes: u32,
        body: Option<SecsItem>,
    ) -> Result<(), TransactionError>;

    /// Start connecting (active) or listening (passive).
    async fn enable(&self) -> Result<(), TransactionError>;

    /// Close the link and stop reconnecting.
    async fn disable(&self) -> Result<(), TransactionError>;
}

/// Lot master data.
#[async_trait]
pub trait LotLookup: Send + Sync {
    /// Fetch a lot by its normalised id.
    async fn lookup(&self, lot_id: &str) -> Result<LotInfo, LookupError>;
}

/// Which copy of a program a store slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeSlot {
    /// Pulled from the tool.
    Upload,
    /// Authoritative copy pushed to the tool.
    Current,
}

impl RecipeSlot {
    /// Directory name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Current => "current",
        }
    }
}

impl fmt::Display for RecipeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store key: one program of one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipeKey {
    pub model: ModelKind,
    pub session: String,
    pub program_id: String,
}

impl RecipeKey {
    pub fn new(model: ModelKind, session: impl Into<String>, program_id: impl Into<String>) -> Self {
        Self {
            model,
            session: session.into(),
            program_id: program_id.into(),
        }
    }
}

/// Local program storage.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Program body, or `Ok(None)` when absent.
    async fn read(&self, key: &RecipeKey, slot: RecipeSlot) -> Result<Option<Vec<u8>>, RecipeError>;

    /// Replace the program body.
    async fn write(&self, key: &RecipeKey, slot: RecipeSlot, body: &[u8]) -> Result<(), RecipeError>;
}
