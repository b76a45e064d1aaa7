//! Validation rule file loader
//!
//! The rule document maps equipment names to prefix groups:
//!
//! ```json
//! { "DB01": [ { "package8digit": "SOIC-08U", "selection_code": "1001",
//!               "data_with_selection_code": [ { "package_selection_code": "SOIC-08UP", ... } ] } ] }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::RuleError;
use crate::domain::rules::{RuleBook, RuleGroupRecord};

/// Rule books by equipment name.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    books: HashMap<String, Arc<RuleBook>>,
}

impl RuleCatalog {
    /// Parse a rule document. Any bad group fails the whole document.
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        let raw: HashMap<String, Vec<RuleGroupRecord>> =
            serde_json::from_str(json).map_err(|e| RuleError::Parse(e.to_string()))?;

        let mut books = HashMap::with_capacity(raw.len());
        for (equipment, records) in raw {
            let book = RuleBook::from_records(records).map_err(|e| {
                warn!(%equipment, error = %e, "rejected rule groups");
                e
            })?;
            books.insert(equipment, Arc::new(book));
        }
        Ok(Self { books })
    }

    /// Read and parse a rule file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| RuleError::Io(format!("{}: {e}", path.display())))?;
        let catalog = Self::from_json(&json)?;
        info!(path = %path.display(), equipments = catalog.books.len(), "validation rules loaded");
        Ok(catalog)
    }

    /// Rules for `equipment`; an empty book when none are configured.
    #[must_use]
    pub fn book_for(&self, equipment: &str) -> Arc<RuleBook> {
        self.books.get(equipment).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.books.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
