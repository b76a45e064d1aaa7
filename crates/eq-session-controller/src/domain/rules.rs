//! Validation rules
//!
//! Rules are grouped by the 8-character package prefix. Each group carries
//! the selection mask used to reduce a full package code to a key, and the
//! rules keyed by that reduced form.
//!
//! ```json
//! [{ "package8digit": "SOIC-08U", "selection_code": "1001",
//!    "data_with_selection_code": [{ "package_selection_code": "SOIC-08UP", ... }] }]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::errors::{PackageCodeError, RuleError};
use super::selection::{derive_selection_key, package_prefix, SelectionMask, PACKAGE_PREFIX_LEN};

// =============================================================================
// PERSISTED FORM
// =============================================================================

/// Optional predicate switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOptions {
    pub use_operation_code: bool,
    pub use_on_operation: bool,
    pub use_lot_hold: bool,
}

/// What the recipe-name predicate compares against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValidateType {
    /// Compare the tool's program with `recipe_name`.
    Program,
    /// Any other value; recipe name is not checked.
    Other(String),
}

impl From<String> for ValidateType {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("program") {
            Self::Program
        } else {
            Self::Other(value)
        }
    }
}

impl From<ValidateType> for String {
    fn from(value: ValidateType) -> Self {
        match value {
            ValidateType::Program => "program".to_string(),
            ValidateType::Other(other) => other,
        }
    }
}

impl Default for ValidateType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

/// One rule as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleRecord {
    pub package_selection_code: String,
    pub operation_code: String,
    pub on_operation: String,
    pub validate_type: ValidateType,
    pub recipe_name: String,
    pub product_name: String,
    pub options: RuleOptions,
}

/// One prefix group as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroupRecord {
    pub package8digit: String,
    pub selection_code: String,
    #[serde(default)]
    pub data_with_selection_code: Vec<RuleRecord>,
}

// =============================================================================
// RUNTIME FORM
// =============================================================================

/// A loaded validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRule {
    /// Key within its group.
    pub selection_key: String,
    /// Expected operation code (checked when `options.use_operation_code`).
    pub operation_code: String,
    /// Expected on-operation (checked when `options.use_on_operation`).
    pub on_operation: String,
    /// Recipe predicate mode.
    pub validate_type: ValidateType,
    /// Target program on the tool.
    pub recipe_name: String,
    /// Product the rule covers.
    pub product_name: String,
    /// Predicate switches.
    pub options: RuleOptions,
}

impl ValidationRule {
    /// Whether the recipe-name predicate applies.
    #[must_use]
    pub fn checks_program(&self) -> bool {
        self.validate_type == ValidateType::Program
    }
}

impl From<RuleRecord> for ValidationRule {
    fn from(record: RuleRecord) -> Self {
        Self {
            selection_key: record.package_selection_code.trim().to_string(),
            operation_code: record.operation_code.trim().to_string(),
            on_operation: record.on_operation.trim().to_string(),
            validate_type: record.validate_type,
            recipe_name: record.recipe_name.trim().to_string(),
            product_name: record.product_name,
            options: record.options,
        }
    }
}

/// Rules for one 8-character package prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleGroup {
    mask: SelectionMask,
    rules: Vec<ValidationRule>,
}

impl RuleGroup {
    /// Selection mask for this prefix.
    #[must_use]
    pub fn mask(&self) -> SelectionMask {
        self.mask
    }

    /// Rules in file order.
    #[must_use]
    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }
}

/// Read-only rule set of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleBook {
    groups: HashMap<String, RuleGroup>,
}

impl RuleBook {
    /// An empty book; every lookup misses.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from stored groups. Later groups with the same prefix extend earlier ones.
    pub fn from_records(records: Vec<RuleGroupRecord>) -> Result<Self, RuleError> {
        let mut groups: HashMap<String, RuleGroup> = HashMap::new();

        for record in records {
            let prefix = record.package8digit.trim().to_string();
            if prefix.chars().count() != PACKAGE_PREFIX_LEN {
                return Err(RuleError::InvalidPrefix(prefix));
            }
            let mask: SelectionMask = record.selection_code.trim().parse().map_err(|()| {
                RuleError::InvalidSelectionCode {
                    prefix: prefix.clone(),
                    code: record.selection_code.clone(),
                }
            })?;

            let rules = record
                .data_with_selection_code
                .into_iter()
                .map(ValidationRule::from);

            match groups.get_mut(&prefix) {
                Some(group) if group.mask == mask => group.rules.extend(rules),
                Some(_) => {
                    return Err(RuleError::InvalidSelectionCode {
                        prefix,
                        code: record.selection_code,
                    })
                }
                None => {
                    groups.insert(
                        prefix,
                        RuleGroup {
                            mask,
                            rules: rules.collect(),
                        },
                    );
                }
            }
        }

        Ok(Self { groups })
    }

    /// Number of prefix groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when no groups are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group for a prefix.
    #[must_use]
    pub fn group(&self, prefix: &str) -> Option<&RuleGroup> {
        self.groups.get(prefix)
    }

    /// Rule matching a full package code.
    ///
    /// `Ok(None)` means the code is well formed but nothing matches.
    pub fn resolve(&self, package_code: &str) -> Result<Option<&ValidationRule>, PackageCodeError> {
        let code = package_code.trim();
        let prefix = package_prefix(code)?;
        let Some(group) = self.groups.get(&prefix) else {
            return Ok(None);
        };
        let key = derive_selection_key(code, group.mask)?;
        Ok(group.rules.iter().find(|rule| rule.selection_key == key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> RuleBook {
        let json = r#"[{
            "package8digit": "SOIC-08U",
            "selection_code": "1001",
            "data_with_selection_code": [{
                "package_selection_code": "SOIC-08UP",
                "operation_code": "DA100",
                "on_operation": "DA",
                "validate_type": "program",
                "recipe_name": "PGM-A",
                "product_name": "SOIC8",
                "options": { "use_operation_code": true, "use_on_operation": true, "use_lot_hold": true }
            }]
        }]"#;
        let records: Vec<RuleGroupRecord> = serde_json::from_str(json).unwrap();
        RuleBook::from_records(records).unwrap()
    }

    #[test]
    fn test_resolve_matching_rule() {
        let book = book();
        let rule = book.resolve("SOIC-08USDPNSDP").unwrap().unwrap();
        assert_eq!(rule.recipe_name, "PGM-A");
        assert!(rule.checks_program());
        assert!(rule.options.use_lot_hold);
    }

    #[test]
    fn test_resolve_key_mismatch_is_none() {
        // last character differs, so the derived key is SOIC-08UQ
        assert!(book().resolve("SOIC-08USDPNSDQ").unwrap().is_none());
        assert!(book().resolve("QFN-032USDPNSDP").unwrap().is_none());
    }

    #[test]
    fn test_resolve_short_code_is_error() {
        assert!(book().resolve("SOIC-08").is_err());
    }

    #[test]
    fn test_invalid_selection_code_fails_load() {
        let records = vec![RuleGroupRecord {
            package8digit: "SOIC-08U".into(),
            selection_code: "10x1".into(),
            data_with_selection_code: vec![],
        }];
        assert!(matches!(
            RuleBook::from_records(records),
            Err(RuleError::InvalidSelectionCode { .. })
        ));
    }

    #[test]
    fn test_invalid_prefix_fails_load() {
        let records = vec![RuleGroupRecord {
            package8digit: "SOIC".into(),
            selection_code: "1000".into(),
            data_with_selection_code: vec![],
        }];
        assert_eq!(
            RuleBook::from_records(records),
            Err(RuleError::InvalidPrefix("SOIC".into()))
        );
    }

    #[test]
    fn test_validate_type_parsing() {
        assert_eq!(ValidateType::from("PROGRAM".to_string()), ValidateType::Program);
        assert_eq!(
            ValidateType::from("product".to_string()),
            ValidateType::Other("product".into())
        );
    }
}
