//! Lot master data and decisions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::errors::RecipeStep;

/// Lot master data returned by the lookup port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LotInfo {
    pub lot_id: String,
    /// Lot status, e.g. `RUN`, `HOLD`.
    pub status: String,
    /// Full 15-character package code.
    pub package_code: String,
    pub operation_code: String,
    pub on_operation: String,
    /// Any further master-data fields.
    pub fields: HashMap<String, String>,
}

impl LotInfo {
    /// `HOLD` or `HELD`, case-insensitive.
    #[must_use]
    pub fn is_on_hold(&self) -> bool {
        let status = self.status.trim();
        status.eq_ignore_ascii_case("HOLD") || status.eq_ignore_ascii_case("HELD")
    }
}

/// A scanned lot id, normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotRequest {
    /// Uppercase lot id without any suffix.
    pub lot_id: String,
    /// The scan carried the program-request suffix.
    pub program_request: bool,
}

impl LotRequest {
    /// Uppercase `raw` and split it on commas.
    ///
    /// The first field is the lot id. `"lot123,pr"` with token `"PR"` is a
    /// program request for `LOT123`; the token may sit in any later field
    /// (`"LOT123,X,PR"`). Other fields are dropped.
    #[must_use]
    pub fn parse(raw: &str, token: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        let token = token.trim().to_ascii_uppercase();
        let mut fields = upper.split(',').map(str::trim);
        let lot_id = fields.next().unwrap_or_default().to_string();
        let program_request = !token.is_empty() && fields.any(|field| field == token);
        Self {
            lot_id,
            program_request,
        }
    }
}

/// Why a lot was rejected. Each renders as a fixed string sent to the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    LookupFailed,
    NoRule,
    InvalidPackageCode,
    OnHold,
    OnOperationMismatch,
    OperationCodeMismatch,
    RecipeMismatch,
    RecipeSync(RecipeStep),
}

impl RejectReason {
    /// Reason text.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LookupFailed => "lot lookup failed",
            Self::NoRule => "no validation rule for package",
            Self::InvalidPackageCode => "invalid package code",
            Self::OnHold => "lot is on hold",
            Self::OnOperationMismatch => "on-operation mismatch",
            Self::OperationCodeMismatch => "operation code mismatch",
            Self::RecipeMismatch => "recipe mismatch",
            Self::RecipeSync(RecipeStep::Send) => "recipe send failed",
            Self::RecipeSync(RecipeStep::Select) => "recipe select failed",
            Self::RecipeSync(RecipeStep::Delete) => "recipe delete failed",
            Self::RecipeSync(RecipeStep::Pull) => "recipe pull failed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotDecision {
    pub accept: bool,
    pub reason: Option<RejectReason>,
}

impl LotDecision {
    /// Accept.
    #[must_use]
    pub fn accept() -> Self {
        Self {
            accept: true,
            reason: None,
        }
    }

    /// Reject with a reason.
    #[must_use]
    pub fn reject(reason: RejectReason) -> Self {
        Self {
            accept: false,
            reason: Some(reason),
        }
    }

    /// Reason text, if rejected.
    #[must_use]
    pub fn reason_text(&self) -> Option<&'static str> {
        self.reason.map(|r| r.as_str())
    }
}
