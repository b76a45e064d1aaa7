//! Connection/State Tracker
//!
//! Owns the `EquipmentSession` of one tool. Every setter holds the publish
//! lock across "mutate, then publish", so retained topics land in the same
//! order the session changed. The session lock itself is never held across
//! an await. Re-setting an unchanged value still publishes. Each connection
//! transition bumps an epoch so queued work from a previous link can
//! recognise itself as stale.

use parking_lot::RwLock;
use shared_types::{ConnectionState, StatusField};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::info;

use crate::adapters::publisher::StatusPublisher;
use crate::domain::errors::SessionError;
use crate::domain::session::EquipmentSession;

pub struct StateTracker {
    session: RwLock<EquipmentSession>,
    epoch: AtomicU64,
    publisher: StatusPublisher,
    publishing: Mutex<()>,
}

impl StateTracker {
    pub fn new(session: EquipmentSession, publisher: StatusPublisher) -> Self {
        Self {
            session: RwLock::new(session),
            epoch: AtomicU64::new(0),
            publisher,
            publishing: Mutex::new(()),
        }
    }

    /// Session name.
    #[must_use]
    pub fn name(&self) -> String {
        self.session.read().name().to_string()
    }

    /// Copy of the session state.
    #[must_use]
    pub fn snapshot(&self) -> EquipmentSession {
        self.session.read().clone()
    }

    /// The bus view of this session.
    #[must_use]
    pub fn publisher(&self) -> &StatusPublisher {
        &self.publisher
    }

    /// Current connection epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Whether work created under `epoch` still belongs to the live link.
    #[must_use]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch && self.is_communicating()
    }

    #[must_use]
    pub fn is_communicating(&self) -> bool {
        self.session.read().is_communicating()
    }

    /// Fail closed unless COMMUNICATING.
    pub fn require_online(&self) -> Result<(), SessionError> {
        let session = self.session.read();
        if session.is_communicating() {
            Ok(())
        } else {
            Err(SessionError::NotOnline {
                equipment: session.name().to_string(),
            })
        }
    }

    /// Link selected. Returns the new epoch.
    pub async fn on_connection_established(&self) -> u64 {
        let _order = self.publishing.lock().await;
        let epoch = {
            let mut session = self.session.write();
            session.set_connection_state(ConnectionState::Communicating);
            self.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!(equipment = %self.publisher.equipment(), epoch, "communicating");
        self.publish_connection(ConnectionState::Communicating).await;
        epoch
    }

    /// Link lost. Control state, process state and program become unknown;
    /// the active lot is kept.
    pub async fn on_connection_lost(&self, state: ConnectionState) {
        let state = if state.is_communicating() {
            ConnectionState::NotCommunicating
        } else {
            state
        };
        let _order = self.publishing.lock().await;
        {
            let mut session = self.session.write();
            session.set_connection_state(state);
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
        info!(equipment = %self.publisher.equipment(), state = %state, "connection lost");

        self.publish_connection(state).await;
        self.publisher.status(StatusField::ControlState, None).await;
        self.publisher.status(StatusField::ProcessState, None).await;
        self.publisher.status(StatusField::Program, None).await;
    }

    /// Set the administrative flag.
    pub async fn set_enabled(&self, enabled: bool) {
        let _order = self.publishing.lock().await;
        self.session.write().set_enabled(enabled);
        let value = if enabled { "true" } else { "false" };
        self.publisher.status(StatusField::Enable, Some(value)).await;
    }

    pub async fn set_control_state(&self, value: &str) -> Result<(), SessionError> {
        let _order = self.publishing.lock().await;
        self.session.write().set_control_state(value)?;
        self.publisher.status(StatusField::ControlState, Some(value)).await;
        Ok(())
    }

    pub async fn set_process_state(&self, value: &str) -> Result<(), SessionError> {
        let _order = self.publishing.lock().await;
        self.session.write().set_process_state(value)?;
        self.publisher.status(StatusField::ProcessState, Some(value)).await;
        Ok(())
    }

    pub async fn set_active_program(&self, value: &str) -> Result<(), SessionError> {
        let _order = self.publishing.lock().await;
        self.session.write().set_active_program(value)?;
        self.publisher.status(StatusField::Program, Some(value)).await;
        Ok(())
    }

    /// Open (`Some`) or close (`None`) the active lot.
    pub async fn set_active_lot(&self, value: Option<&str>) {
        let _order = self.publishing.lock().await;
        self.session.write().set_active_lot(value.map(str::to_string));
        self.publisher.status(StatusField::ActiveLot, value).await;
    }

    async fn publish_connection(&self, state: ConnectionState) {
        self.publisher
            .status(StatusField::ConnectionState, Some(state.as_str()))
            .await;
    }
}
