//! # Session Container
//!
//! Holds one controller per enabled equipment. Each is wired to a link from
//! the host's transport, plus the shared event bus and lot lookup and the
//! rule book configured for its name.

use std::sync::Arc;

use eq_session_controller::{
    ControllerConfig, EquipmentControlApi, EquipmentController, LotLookup, ModelKind, RuleCatalog,
};
use shared_bus::InMemoryEventBus;
use shared_types::EquipmentIdentity;
use tracing::{info, warn};

use crate::equipment_list::EquipmentList;
use crate::transport::Transport;

/// One running session.
pub struct ManagedSession {
    pub controller: Arc<EquipmentController>,
}

/// Every session of the host.
pub struct SessionContainer {
    sessions: Vec<ManagedSession>,
}

impl SessionContainer {
    /// Build controllers for the enabled equipments. Entries whose model is
    /// unknown or whose controller cannot be built are logged and skipped.
    ///
    /// Must run inside a Tokio runtime.
    pub fn build(
        list: &EquipmentList,
        transport: &dyn Transport,
        config: &ControllerConfig,
        rules: &RuleCatalog,
        lookup: Arc<dyn LotLookup>,
        bus: Arc<InMemoryEventBus>,
    ) -> Self {
        let mut sessions = Vec::new();
        for identity in list.enabled() {
            if let Some(session) = build_session(identity, transport, config, rules, lookup.clone(), bus.clone()) {
                sessions.push(session);
            }
        }
        info!(sessions = sessions.len(), "session container ready");
        Self { sessions }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ManagedSession> {
        self.sessions.iter().find(|s| s.controller.name() == name)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &ManagedSession> {
        self.sessions.iter()
    }

    /// Enable every session; failures are logged per session.
    pub async fn enable_all(&self) {
        for session in &self.sessions {
            if let Err(e) = session.controller.enable().await {
                warn!(equipment = %session.controller.name(), error = %e, "enable failed");
            }
        }
    }

    /// Disable every session and stop its worker.
    pub async fn shutdown(&self) {
        for session in &self.sessions {
            if let Err(e) = session.controller.disable().await {
                warn!(equipment = %session.controller.name(), error = %e, "disable failed");
            }
            session.controller.shutdown().await;
        }
    }
}

fn build_session(
    identity: &EquipmentIdentity,
    transport: &dyn Transport,
    config: &ControllerConfig,
    rules: &RuleCatalog,
    lookup: Arc<dyn LotLookup>,
    bus: Arc<InMemoryEventBus>,
) -> Option<ManagedSession> {
    let name = &identity.equipment_name;
    let kind = match identity.equipment_model.parse::<ModelKind>() {
        Ok(kind) => kind,
        Err(e) => {
            warn!(equipment = %name, error = %e, "skipping equipment");
            return None;
        }
    };

    let link = transport.open(identity, kind);
    let built = EquipmentController::builder(identity.clone())
        .model(kind)
        .config(config.clone())
        .facade(link.facade)
        .lot_lookup(lookup)
        .rules(rules.book_for(name))
        .event_bus(bus)
        .build();

    match built {
        Ok(controller) => {
            (link.bind)(&controller);
            info!(
                equipment = %name,
                model = %kind,
                address = %identity.address,
                port = identity.port,
                transport = transport.name(),
                "session registered"
            );
            Some(ManagedSession { controller })
        }
        Err(e) => {
            warn!(equipment = %name, error = %e, "skipping equipment");
            None
        }
    }
}
