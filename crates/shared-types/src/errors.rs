//! # Error Types
//!
//! Errors raised while reading decoded SECS-II items.

use thiserror::Error;

/// Shape mismatch while walking a decoded item tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// A list was expected.
    #[error("expected list item")]
    ExpectedList,

    /// An ASCII item was expected.
    #[error("expected ASCII item")]
    ExpectedAscii,

    /// An integer (or single-byte binary) item was expected.
    #[error("expected numeric item")]
    ExpectedNumeric,

    /// A list had the wrong number of children.
    #[error("wrong list length: expected {expected}, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    /// The message carried no body.
    #[error("missing message body")]
    MissingBody,
}
