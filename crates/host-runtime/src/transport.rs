//! # Equipment Transport
//!
//! The link layer each session's controller talks through. The host only
//! links a transport chosen at build time:
//!
//! - `simulation` feature: in-process simulated tools, logged loudly at
//!   startup
//! - otherwise: none, and the host refuses to start
//!
//! A wire (HSMS) transport plugs in here as another `Transport`.

use std::sync::Arc;

use eq_session_controller::{EquipmentController, ModelKind, SessionFacade};
use shared_types::EquipmentIdentity;
use thiserror::Error;

/// Routes a link's callbacks to the controller built on top of it.
pub type Binder = Box<dyn FnOnce(&Arc<EquipmentController>) + Send>;

/// One opened link.
pub struct Link {
    pub facade: Arc<dyn SessionFacade>,
    pub bind: Binder,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no equipment transport is linked into this build (rebuild with `--features simulation` to run against simulated tools)")]
    NotLinked,
}

/// Supplies the link for each configured tool.
pub trait Transport: Send + Sync {
    /// Name shown in the startup log.
    fn name(&self) -> &'static str;

    /// Whether sessions talk to simulated tools rather than equipment.
    fn is_simulated(&self) -> bool {
        false
    }

    fn open(&self, identity: &EquipmentIdentity, kind: ModelKind) -> Link;
}

/// The transport this build links.
#[cfg(feature = "simulation")]
pub fn linked_transport() -> Result<Arc<dyn Transport>, TransportError> {
    Ok(Arc::new(simulation::SimulatedTransport))
}

/// The transport this build links.
#[cfg(not(feature = "simulation"))]
pub fn linked_transport() -> Result<Arc<dyn Transport>, TransportError> {
    Err(TransportError::NotLinked)
}

#[cfg(any(test, feature = "simulation"))]
pub mod simulation {
    use super::{Link, Transport};
    use std::sync::Arc;

    use eq_session_controller::{ModelKind, SimulatedEquipment};
    use shared_types::EquipmentIdentity;

    /// Every session gets its own in-process `SimulatedEquipment`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SimulatedTransport;

    impl Transport for SimulatedTransport {
        fn name(&self) -> &'static str {
            "simulated"
        }

        fn is_simulated(&self) -> bool {
            true
        }

        fn open(&self, _identity: &EquipmentIdentity, kind: ModelKind) -> Link {
            let tool = Arc::new(SimulatedEquipment::new(kind));
            Link {
                facade: tool.clone(),
                bind: Box::new(move |controller| tool.attach(controller)),
            }
        }
    }
}
