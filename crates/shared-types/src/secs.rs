//! # SECS-II Items
//!
//! Decoded SECS-II data items and the inbound message shape delivered by the
//! protocol session facade. Encoding and framing are the facade's concern.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ItemError;

/// One decoded SECS-II data item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SecsItem {
    /// `L` - ordered list of items.
    List(Vec<SecsItem>),
    /// `A` - ASCII text.
    Ascii(String),
    /// `B` - raw bytes.
    Binary(Vec<u8>),
    /// `BOOLEAN`
    Boolean(bool),
    /// `U1`
    U1(u8),
    /// `U2`
    U2(u16),
    /// `U4`
    U4(u32),
    /// `U8`
    U8(u64),
    /// `I1`
    I1(i8),
    /// `I2`
    I2(i16),
    /// `I4`
    I4(i32),
    /// `I8`
    I8(i64),
    /// `F4`
    F4(f32),
    /// `F8`
    F8(f64),
}

impl SecsItem {
    /// Build a list item.
    #[must_use]
    pub fn list(items: Vec<SecsItem>) -> Self {
        Self::List(items)
    }

    /// Build an empty list (`L,0`).
    #[must_use]
    pub fn empty_list() -> Self {
        Self::List(Vec::new())
    }

    /// Build an ASCII item.
    pub fn ascii(text: impl Into<String>) -> Self {
        Self::Ascii(text.into())
    }

    /// Build a single-byte binary item (the usual shape of an ack code).
    #[must_use]
    pub fn ack(code: u8) -> Self {
        Self::Binary(vec![code])
    }

    /// Borrow the children of a list item.
    #[must_use]
    pub fn as_list(&self) -> Option<&[SecsItem]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the text of an ASCII item.
    #[must_use]
    pub fn as_ascii(&self) -> Option<&str> {
        match self {
            Self::Ascii(text) => Some(text),
            _ => None,
        }
    }

    /// Numeric value of an integer item, or of a single-byte binary item.
    ///
    /// Negative signed values and floats yield `None`.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U1(v) => Some(u64::from(*v)),
            Self::U2(v) => Some(u64::from(*v)),
            Self::U4(v) => Some(u64::from(*v)),
            Self::U8(v) => Some(*v),
            Self::I1(v) => u64::try_from(*v).ok(),
            Self::I2(v) => u64::try_from(*v).ok(),
            Self::I4(v) => u64::try_from(*v).ok(),
            Self::I8(v) => u64::try_from(*v).ok(),
            Self::Binary(bytes) if bytes.len() == 1 => Some(u64::from(bytes[0])),
            _ => None,
        }
    }

    /// Ack-code view: a numeric item that fits in one byte.
    #[must_use]
    pub fn as_code(&self) -> Option<u8> {
        self.as_u64().and_then(|v| u8::try_from(v).ok())
    }

    /// Boolean view; single-byte binary is accepted (non-zero is true).
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Binary(bytes) if bytes.len() == 1 => Some(bytes[0] != 0),
            _ => None,
        }
    }

    /// Raw bytes of a binary or ASCII item.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            Self::Ascii(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    /// Text rendering of a scalar item; lists and binary yield `None`.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Ascii(text) => Some(text.clone()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::F4(v) => Some(v.to_string()),
            Self::F8(v) => Some(v.to_string()),
            Self::List(_) | Self::Binary(_) => None,
            other => other.as_u64().map(|v| v.to_string()).or_else(|| match other {
                Self::I1(v) => Some(v.to_string()),
                Self::I2(v) => Some(v.to_string()),
                Self::I4(v) => Some(v.to_string()),
                Self::I8(v) => Some(v.to_string()),
                _ => None,
            }),
        }
    }

    /// Children of a list item that must have exactly `len` entries.
    pub fn expect_list(&self, len: usize) -> Result<&[SecsItem], ItemError> {
        let items = self.as_list().ok_or(ItemError::ExpectedList)?;
        if items.len() != len {
            return Err(ItemError::WrongLength {
                expected: len,
                actual: items.len(),
            });
        }
        Ok(items)
    }
}

impl fmt::Display for SecsItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(items) => {
                write!(f, "L[{}]{{", items.len())?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Self::Ascii(text) => write!(f, "A\"{text}\""),
            Self::Binary(bytes) => write!(f, "B{bytes:?}"),
            Self::Boolean(b) => write!(f, "BOOLEAN {b}"),
            Self::U1(v) => write!(f, "U1 {v}"),
            Self::U2(v) => write!(f, "U2 {v}"),
            Self::U4(v) => write!(f, "U4 {v}"),
            Self::U8(v) => write!(f, "U8 {v}"),
            Self::I1(v) => write!(f, "I1 {v}"),
            Self::I2(v) => write!(f, "I2 {v}"),
            Self::I4(v) => write!(f, "I4 {v}"),
            Self::I8(v) => write!(f, "I8 {v}"),
            Self::F4(v) => write!(f, "F4 {v}"),
            Self::F8(v) => write!(f, "F8 {v}"),
        }
    }
}

/// Stream/function pair identifying a message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFunction {
    /// Stream number (1..=127).
    pub stream: u8,
    /// Function number; odd for primaries, even for replies.
    pub function: u8,
}

impl StreamFunction {
    /// Create a stream/function pair.
    #[must_use]
    pub const fn new(stream: u8, function: u8) -> Self {
        Self { stream, function }
    }

    /// The reply function for this primary.
    #[must_use]
    pub const fn reply(&self) -> Self {
        Self {
            stream: self.stream,
            function: self.function + 1,
        }
    }
}

impl fmt::Display for StreamFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}F{}", self.stream, self.function)
    }
}

/// A decoded primary message received from the tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message type.
    pub sf: StreamFunction,
    /// Transaction id to echo in the reply.
    pub system_bytes: u32,
    /// W-bit: the tool expects a reply.
    pub reply_expected: bool,
    /// Decoded body, if any.
    pub body: Option<SecsItem>,
}

impl InboundMessage {
    /// Create an inbound primary that expects a reply.
    #[must_use]
    pub fn new(stream: u8, function: u8, system_bytes: u32, body: Option<SecsItem>) -> Self {
        Self {
            sf: StreamFunction::new(stream, function),
            system_bytes,
            reply_expected: true,
            body,
        }
    }
}
