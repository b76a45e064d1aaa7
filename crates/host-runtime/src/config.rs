//! # Host Configuration
//!
//! File locations and controller tuning, with environment overrides:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `FAB_EQUIPMENT_FILE` | `equipment_file` |
//! | `FAB_RULES_FILE` | `rules_file` |
//! | `FAB_LOTS_FILE` | `lots_file` |
//! | `FAB_RECIPE_ROOT` | `controller.recipe_root` |
//! | `FAB_SETTLE_DELAY_MS` | `controller.settle_delay_ms` |
//! | `FAB_REPLY_TIMEOUT_MS` | `controller.reply_timeout_ms` |

use eq_session_controller::ControllerConfig;
use std::path::PathBuf;
use tracing::{info, warn};

/// Complete host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Persisted equipment list.
    pub equipment_file: PathBuf,
    /// Validation rules keyed by equipment name.
    pub rules_file: PathBuf,
    /// Lot master data.
    pub lots_file: PathBuf,
    /// Shared by every session controller.
    pub controller: ControllerConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            equipment_file: PathBuf::from("./config/equipments.json"),
            rules_file: PathBuf::from("./config/validation_rules.json"),
            lots_file: PathBuf::from("./config/lots.json"),
            controller: ControllerConfig::default(),
        }
    }
}

impl HostConfig {
    /// Defaults overridden from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Unparseable numbers are logged and ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup("FAB_EQUIPMENT_FILE") {
            self.equipment_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("FAB_RULES_FILE") {
            self.rules_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("FAB_LOTS_FILE") {
            self.lots_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("FAB_RECIPE_ROOT") {
            self.controller.recipe_root = PathBuf::from(path);
        }
        if let Some(ms) = parse_ms(&lookup, "FAB_SETTLE_DELAY_MS") {
            self.controller.settle_delay_ms = ms;
        }
        if let Some(ms) = parse_ms(&lookup, "FAB_REPLY_TIMEOUT_MS") {
            self.controller.reply_timeout_ms = ms;
        }
        self
    }

    /// Log the effective configuration.
    pub fn log_summary(&self) {
        info!("Equipment list: {:?}", self.equipment_file);
        info!("Rules file: {:?}", self.rules_file);
        info!("Lots file: {:?}", self.lots_file);
        info!("Recipe root: {:?}", self.controller.recipe_root);
        info!(
            settle_delay_ms = self.controller.settle_delay_ms,
            reply_timeout_ms = self.controller.reply_timeout_ms,
            "controller timing"
        );
    }
}

fn parse_ms(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(ms) => Some(ms),
        Err(_) => {
            warn!(key, value = %raw, "ignoring non-numeric override");
            None
        }
    }
}
