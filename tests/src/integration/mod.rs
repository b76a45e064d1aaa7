//! Cross-crate session scenarios.

#[cfg(test)]
pub mod fixtures;
pub mod lot_flows;
pub mod session_flows;
