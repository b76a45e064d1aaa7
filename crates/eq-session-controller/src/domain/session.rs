//! Equipment session state
//!
//! One `EquipmentSession` per configured tool. Control state, process state
//! and active program are only held while the link is COMMUNICATING; every
//! transition away from COMMUNICATING resets them. The active lot is owned by
//! lot-open / lot-close events alone.

use serde::Serialize;
use shared_types::{ConnectionState, EquipmentIdentity};

use super::errors::SessionError;
use super::model::ModelKind;

/// In-memory state of one tool session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquipmentSession {
    identity: EquipmentIdentity,
    #[serde(skip)]
    model: ModelKind,
    enabled: bool,
    connection_state: ConnectionState,
    control_state: Option<String>,
    process_state: Option<String>,
    active_program: Option<String>,
    active_lot: Option<String>,
}

impl EquipmentSession {
    /// New session, not communicating, administrative flag from `identity`.
    #[must_use]
    pub fn new(identity: EquipmentIdentity, model: ModelKind) -> Self {
        let enabled = identity.enable;
        Self {
            identity,
            model,
            enabled,
            connection_state: ConnectionState::NotCommunicating,
            control_state: None,
            process_state: None,
            active_program: None,
            active_lot: None,
        }
    }

    /// Session name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.equipment_name
    }

    /// Configured identity.
    #[must_use]
    pub fn identity(&self) -> &EquipmentIdentity {
        &self.identity
    }

    /// Model tag.
    #[must_use]
    pub fn model(&self) -> ModelKind {
        self.model
    }

    /// Administrative intent.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Link state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    /// Control state, if communicating and known.
    #[must_use]
    pub fn control_state(&self) -> Option<&str> {
        self.control_state.as_deref()
    }

    /// Process state, if communicating and known.
    #[must_use]
    pub fn process_state(&self) -> Option<&str> {
        self.process_state.as_deref()
    }

    /// Selected program, if communicating and known.
    #[must_use]
    pub fn active_program(&self) -> Option<&str> {
        self.active_program.as_deref()
    }

    /// Lot currently open on the tool.
    #[must_use]
    pub fn active_lot(&self) -> Option<&str> {
        self.active_lot.as_deref()
    }

    /// True while the link is selected.
    #[must_use]
    pub fn is_communicating(&self) -> bool {
        self.connection_state.is_communicating()
    }

    /// Set the administrative flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Move the link state.
    ///
    /// Leaving (or not being in) COMMUNICATING resets control state,
    /// process state and active program. The active lot is kept.
    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.connection_state = state;
        if !state.is_communicating() {
            self.control_state = None;
            self.process_state = None;
            self.active_program = None;
        }
    }

    /// Store the control state; refused unless communicating.
    pub fn set_control_state(&mut self, value: impl Into<String>) -> Result<(), SessionError> {
        self.require_communicating()?;
        self.control_state = Some(value.into());
        Ok(())
    }

    /// Store the process state; refused unless communicating.
    pub fn set_process_state(&mut self, value: impl Into<String>) -> Result<(), SessionError> {
        self.require_communicating()?;
        self.process_state = Some(value.into());
        Ok(())
    }

    /// Store the selected program; refused unless communicating.
    pub fn set_active_program(&mut self, value: impl Into<String>) -> Result<(), SessionError> {
        self.require_communicating()?;
        self.active_program = Some(value.into());
        Ok(())
    }

    /// Open (`Some`) or close (`None`) the active lot.
    pub fn set_active_lot(&mut self, value: Option<String>) {
        self.active_lot = value;
    }

    /// State fields are empty whenever the link is not COMMUNICATING.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        self.is_communicating()
            || (self.control_state.is_none()
                && self.process_state.is_none()
                && self.active_program.is_none())
    }

    fn require_communicating(&self) -> Result<(), SessionError> {
        if self.is_communicating() {
            Ok(())
        } else {
            Err(SessionError::NotOnline {
                equipment: self.name().to_string(),
            })
        }
    }
}
