//! Configuration for the Equipment Session Controller

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Controller configuration, shared by every session in a process.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Delay between the communicating callback and the subscription
    /// handshake, so no request is issued from inside the callback.
    pub settle_delay_ms: u64,
    /// Upper bound on every request/response transaction (HSMS T3).
    pub reply_timeout_ms: u64,
    /// Pending work items per session. Inbound routing never waits for
    /// room: work arriving at a full queue is dropped and counted.
    pub work_queue_capacity: usize,
    /// Comma-delimited lot id suffix marking a program request
    /// (`"LOT123,PR"`).
    pub program_request_token: String,
    /// Root of the local recipe store.
    pub recipe_root: PathBuf,
}

impl ControllerConfig {
    /// Settle delay as a `Duration`.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Reply timeout as a `Duration`.
    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 50,
            reply_timeout_ms: 45_000,
            work_queue_capacity: 64,
            program_request_token: "PR".to_string(),
            recipe_root: PathBuf::from("./recipes"),
        }
    }
}
