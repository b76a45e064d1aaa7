//! Error types for the Equipment Session Controller
//!
//! Taxonomy:
//! - transaction failure: timeout or malformed reply from the facade
//! - acknowledgement failure: well-formed reply with a non-zero code
//! - lookup / config failure: missing rule, missing file, lookup error
//! - programming / config error: unknown model, bad rule file

use shared_types::{ItemError, StreamFunction};
use std::fmt;
use thiserror::Error;

use super::acks::{HostCommandAck, ProgramAck};

/// Failure of one request/response transaction through the facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// No reply within the bounded timeout.
    #[error("no reply to {sf} within timeout")]
    Timeout { sf: StreamFunction },

    /// The session dropped before or during the transaction.
    #[error("session disconnected")]
    Disconnected,

    /// A reply arrived but its body does not have the expected shape.
    #[error("malformed reply to {sf}: {detail}")]
    Malformed { sf: StreamFunction, detail: String },

    /// The facade refused or aborted the transaction.
    #[error("facade error: {0}")]
    Facade(String),
}

impl TransactionError {
    /// Build a malformed-reply error.
    pub fn malformed(sf: StreamFunction, detail: impl fmt::Display) -> Self {
        Self::Malformed {
            sf,
            detail: detail.to_string(),
        }
    }
}

/// Session-level errors surfaced by the control API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session is not in COMMUNICATING; no request was issued.
    #[error("equipment {equipment} is not online")]
    NotOnline { equipment: String },

    /// Transport-level failure.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// The tool answered with a non-zero acknowledgement.
    #[error("{operation} rejected by equipment: {reason} ({code})")]
    Rejected {
        operation: &'static str,
        code: u8,
        reason: &'static str,
    },

    /// The configured model tag has no registry entry.
    #[error("unknown equipment model: {0}")]
    UnknownModel(String),

    /// The session worker is gone (controller shut down).
    #[error("session worker stopped")]
    WorkerStopped,

    /// A required collaborator was not supplied to the builder.
    #[error("controller builder missing {0}")]
    Incomplete(&'static str),
}

// =============================================================================
// SUBSCRIPTION HANDSHAKE
// =============================================================================

/// Steps of the event-subscription handshake, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStep {
    /// S2F37 CEED=false for all events.
    DisableEvents,
    /// S2F33 with an empty report list.
    ClearReports,
    /// S2F37 CEED=true for all events.
    EnableAllEvents,
    /// S2F33 for one report.
    DefineReport,
    /// S2F35 for one event.
    LinkReport,
    /// S2F37 for one event.
    EnableEvent,
}

impl HandshakeStep {
    /// Log/step name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisableEvents => "disable_events",
            Self::ClearReports => "clear_reports",
            Self::EnableAllEvents => "enable_all_events",
            Self::DefineReport => "define_report",
            Self::LinkReport => "link_report",
            Self::EnableEvent => "enable_event",
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a handshake step failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepFailure {
    /// Transport-level failure.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Non-zero acknowledgement.
    #[error("{reason} (code {code})")]
    Ack { code: u8, reason: &'static str },
}

impl StepFailure {
    /// Numeric code, when the tool answered.
    #[must_use]
    pub fn code(&self) -> Option<u8> {
        match self {
            Self::Ack { code, .. } => Some(*code),
            Self::Transaction(_) => None,
        }
    }
}

/// A handshake step failed; the remaining steps were not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subscription step {step} failed (ceid={ceid:?}, rptid={report_id:?}): {failure}")]
pub struct SubscriptionError {
    /// Failed step.
    pub step: HandshakeStep,
    /// Collection event of the failing entry, if per-entry.
    pub ceid: Option<u32>,
    /// Report of the failing entry, if per-entry.
    pub report_id: Option<u32>,
    /// Cause.
    pub failure: StepFailure,
}

// =============================================================================
// RECIPE SYNC
// =============================================================================

/// Recipe operations, named in reject reasons and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeStep {
    /// S7F3 process program send.
    Send,
    /// S2F41 select command.
    Select,
    /// S7F17 delete.
    Delete,
    /// S7F5 request (upload from tool).
    Pull,
}

impl RecipeStep {
    /// Step name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Select => "select",
            Self::Delete => "delete",
            Self::Pull => "pull",
        }
    }
}

impl fmt::Display for RecipeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recipe sync and recipe store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecipeError {
    /// No local file for the program.
    #[error("recipe not found: {0}")]
    NotFound(String),

    /// Program id is empty or sanitizes to nothing.
    #[error("invalid program id: {0:?}")]
    InvalidProgramId(String),

    /// The tool returned an empty program body.
    #[error("empty program body for {0}")]
    EmptyBody(String),

    /// Non-zero ACKC7 on send or delete.
    #[error("recipe {step} rejected: {ack}")]
    Rejected { step: RecipeStep, ack: ProgramAck },

    /// Select command not accepted.
    #[error("recipe select rejected: {0}")]
    SelectRejected(HostCommandAck),

    /// Transport-level failure during a step.
    #[error("recipe {step} failed: {source}")]
    Transaction {
        step: RecipeStep,
        source: TransactionError,
    },

    /// The session is not in COMMUNICATING.
    #[error("equipment {0} is not online")]
    NotOnline(String),

    /// Local filesystem failure.
    #[error("recipe store I/O error: {0}")]
    Io(String),

    /// The session worker is gone (controller shut down).
    #[error("session worker stopped")]
    WorkerStopped,
}

impl RecipeError {
    /// Which tool-side step failed, if any.
    #[must_use]
    pub fn step(&self) -> Option<RecipeStep> {
        match self {
            Self::Rejected { step, .. } | Self::Transaction { step, .. } => Some(*step),
            Self::SelectRejected(_) => Some(RecipeStep::Select),
            _ => None,
        }
    }
}

// =============================================================================
// LOOKUP, RULES, REPORTS
// =============================================================================

/// Lot master data lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The lot is unknown.
    #[error("lot not found: {0}")]
    NotFound(String),

    /// The lookup backend failed.
    #[error("lot lookup unavailable: {0}")]
    Unavailable(String),
}

/// Validation rule configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// `selection_code` is not four `0`/`1` characters.
    #[error("invalid selection code {code:?} for package {prefix}")]
    InvalidSelectionCode { prefix: String, code: String },

    /// `package8digit` is not eight characters.
    #[error("invalid package prefix {0:?}: expected 8 characters")]
    InvalidPrefix(String),

    /// Rule document could not be parsed.
    #[error("rule file parse error: {0}")]
    Parse(String),

    /// Rule document could not be read.
    #[error("rule file I/O error: {0}")]
    Io(String),
}

/// Package code cannot be reduced to a selection key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid package code {code:?}: expected 15 characters, got {len}")]
pub struct PackageCodeError {
    /// The offending code.
    pub code: String,
    /// Its character count.
    pub len: usize,
}

/// Event report could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// Item tree shape mismatch.
    #[error("malformed event report: {0}")]
    Item(#[from] ItemError),

    /// A typed report carried the wrong number of values.
    #[error("report {report_id}: expected {expected} values, got {actual}")]
    ValueCount {
        report_id: u32,
        expected: &'static str,
        actual: usize,
    },

    /// A value that must be text was not.
    #[error("report {report_id}: value {index} is not a scalar")]
    NotScalar { report_id: u32, index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_error_display() {
        let err = SubscriptionError {
            step: HandshakeStep::DefineReport,
            ceid: Some(100),
            report_id: Some(100),
            failure: StepFailure::Ack {
                code: 3,
                reason: "denied, RPTID already defined",
            },
        };
        assert_eq!(
            err.to_string(),
            "subscription step define_report failed (ceid=Some(100), rptid=Some(100)): \
             denied, RPTID already defined (code 3)"
        );
        assert_eq!(err.failure.code(), Some(3));
    }

    #[test]
    fn test_recipe_error_step() {
        let err = RecipeError::Rejected {
            step: RecipeStep::Send,
            ack: ProgramAck::PpidNotFound,
        };
        assert_eq!(err.step(), Some(RecipeStep::Send));
        assert_eq!(err.to_string(), "recipe send rejected: PPID not found (4)");
        assert_eq!(RecipeError::NotFound("P1".into()).step(), None);
    }

    #[test]
    fn test_timeout_display() {
        let err = TransactionError::Timeout {
            sf: StreamFunction::new(1, 3),
        };
        assert_eq!(err.to_string(), "no reply to S1F3 within timeout");
    }
}
