//! In-memory lot master data
//!
//! Serves `LotLookup` from a JSON list of lots. Lot ids are matched after
//! uppercasing, the same normalisation scanned ids get.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::domain::errors::LookupError;
use crate::domain::lot::LotInfo;
use crate::ports::outbound::LotLookup;

#[derive(Debug, Default)]
pub struct InMemoryLotLookup {
    lots: RwLock<HashMap<String, LotInfo>>,
}

impl InMemoryLotLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from lot records.
    pub fn from_lots(lots: impl IntoIterator<Item = LotInfo>) -> Self {
        let lookup = Self::new();
        for lot in lots {
            lookup.insert(lot);
        }
        lookup
    }

    /// Parse a JSON array of lots.
    pub fn from_json(json: &str) -> Result<Self, LookupError> {
        let lots: Vec<LotInfo> =
            serde_json::from_str(json).map_err(|e| LookupError::Unavailable(e.to_string()))?;
        Ok(Self::from_lots(lots))
    }

    /// Read a JSON array of lots from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| LookupError::Unavailable(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Add or replace a lot.
    pub fn insert(&self, lot: LotInfo) {
        let key = lot.lot_id.trim().to_ascii_uppercase();
        self.lots.write().insert(key, lot);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lots.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lots.read().is_empty()
    }
}

#[async_trait]
impl LotLookup for InMemoryLotLookup {
    async fn lookup(&self, lot_id: &str) -> Result<LotInfo, LookupError> {
        let key = lot_id.trim().to_ascii_uppercase();
        let found = self.lots.read().get(&key).cloned();
        debug!(lot = %key, found = found.is_some(), "lot lookup");
        found.ok_or(LookupError::NotFound(key))
    }
}
