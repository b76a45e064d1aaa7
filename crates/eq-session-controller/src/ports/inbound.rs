//! Inbound Ports (Driving Ports / API)

use async_trait::async_trait;
use shared_types::{ConnectionState, InboundMessage};

use crate::domain::errors::{RecipeError, SessionError};
use crate::domain::session::EquipmentSession;

/// Callbacks raised by the protocol session facade.
///
/// Implementations return promptly: anything that needs a new request/response
/// transaction is queued, never awaited here.
#[async_trait]
pub trait SessionEventHandler: Send + Sync {
    /// The link reached COMMUNICATING (selected).
    async fn on_communicating(&self);

    /// The link left COMMUNICATING; `state` is where it is now.
    async fn on_disconnected(&self, state: ConnectionState);

    /// A primary arrived from the tool.
    async fn on_message(&self, message: InboundMessage);
}

/// Operator surface of one session.
#[async_trait]
pub trait EquipmentControlApi: Send + Sync {
    /// Set the administrative flag and enable the facade.
    async fn enable(&self) -> Result<(), SessionError>;

    /// Clear the administrative flag and disable the facade.
    async fn disable(&self) -> Result<(), SessionError>;

    /// S1F17 request online.
    async fn go_online(&self) -> Result<(), SessionError>;

    /// S1F15 request offline.
    async fn go_offline(&self) -> Result<(), SessionError>;

    /// Query, store and publish the control state.
    async fn query_control_state(&self) -> Result<String, SessionError>;

    /// Query, store and publish the process state.
    async fn query_process_state(&self) -> Result<String, SessionError>;

    /// Query, store and publish the selected program.
    async fn query_active_program(&self) -> Result<String, SessionError>;

    /// Push a program from the local store.
    async fn send_recipe(&self, program_id: &str) -> Result<(), RecipeError>;

    /// Make a program the selected one.
    async fn select_recipe(&self, program_id: &str) -> Result<(), RecipeError>;

    /// Delete a program on the tool.
    async fn delete_recipe(&self, program_id: &str) -> Result<(), RecipeError>;

    /// Fetch a program from the tool into the local store.
    async fn pull_recipe(&self, program_id: &str) -> Result<(), RecipeError>;

    /// Copy of the current session state.
    fn snapshot(&self) -> EquipmentSession;
}
