//! # Equipment Host Test Suite
//!
//! End-to-end scenarios driven through the simulated tool.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs       # Session wiring, lot and rule fixtures
//!     ├── session_flows.rs  # Handshake, status queries, disconnect
//!     └── lot_flows.rs      # Lot validation and recipe sync
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fab-tests
//! cargo test -p fab-tests integration::lot_flows::
//! ```

pub mod integration;
