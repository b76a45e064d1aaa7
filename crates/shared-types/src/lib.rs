//! # Shared Types Crate
//!
//! This crate contains the types every other crate in the workspace agrees on:
//! the identity of a configured tool, its link-level connection state, the
//! names of the published status fields, and the decoded SECS-II item tree
//! that crosses the protocol session facade.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: cross-crate types are defined here only.
//! - **Decoded, not encoded**: framing and byte-level encoding belong to the
//!   protocol facade; everything in this crate is already decoded.

pub mod entities;
pub mod errors;
pub mod secs;

pub use entities::*;
pub use errors::*;
pub use secs::*;
