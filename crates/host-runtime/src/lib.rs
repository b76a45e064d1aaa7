//! # Equipment Host Runtime
//!
//! Wires the session controllers into a running host.
//!
//! ## Startup Sequence
//!
//! 1. Load host configuration (defaults + environment)
//! 2. Load the equipment list, validation rules and lot master data
//! 3. Build one controller per enabled equipment over the linked transport
//!    (unknown models are skipped)
//! 4. Start the bus monitor
//! 5. Enable every session
//!
//! Builds without the `simulation` feature link no transport and refuse to
//! start.
//!
//! Shutdown disables every session, drains the session workers and stops the
//! monitor.

pub mod config;
pub mod container;
pub mod equipment_list;
pub mod monitor;
pub mod transport;

use std::sync::Arc;

use anyhow::{Context, Result};
use eq_session_controller::{InMemoryLotLookup, RuleCatalog};
use parking_lot::Mutex;
use shared_bus::InMemoryEventBus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub use config::HostConfig;
pub use container::{ManagedSession, SessionContainer};
pub use equipment_list::{EquipmentList, EquipmentListFile, ListError};
pub use monitor::spawn_bus_monitor;
pub use transport::{linked_transport, Link, Transport, TransportError};

/// The running host.
pub struct HostRuntime {
    config: HostConfig,
    transport: Arc<dyn Transport>,
    bus: Arc<InMemoryEventBus>,
    container: SessionContainer,
    monitor: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl HostRuntime {
    /// Load every input and build the sessions over the transport this build
    /// links. Must run inside a Tokio runtime.
    pub fn new(config: HostConfig) -> Result<Self> {
        let transport = linked_transport()?;
        Self::with_transport(config, transport)
    }

    /// Like `new`, over an explicit transport.
    pub fn with_transport(config: HostConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let equipments = EquipmentListFile::open(&config.equipment_file)
            .with_context(|| format!("loading equipment list {:?}", config.equipment_file))?;

        let rules = if config.rules_file.exists() {
            RuleCatalog::load(&config.rules_file)
                .with_context(|| format!("loading validation rules {:?}", config.rules_file))?
        } else {
            warn!(path = ?config.rules_file, "no validation rules, every lot will be rejected");
            RuleCatalog::default()
        };

        let lookup = if config.lots_file.exists() {
            InMemoryLotLookup::load(&config.lots_file)
                .with_context(|| format!("loading lot master {:?}", config.lots_file))?
        } else {
            warn!(path = ?config.lots_file, "no lot master data, every lookup will fail");
            InMemoryLotLookup::new()
        };

        let bus = Arc::new(InMemoryEventBus::new());
        let container = SessionContainer::build(
            equipments.list(),
            transport.as_ref(),
            &config.controller,
            &rules,
            Arc::new(lookup),
            bus.clone(),
        );
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            transport,
            bus,
            container,
            monitor: Mutex::new(None),
            shutdown_tx,
        })
    }

    /// Start the monitor and enable every session.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Equipment Host Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        self.config.log_summary();
        if self.transport.is_simulated() {
            warn!("===========================================");
            warn!("  SIMULATION MODE: sessions talk to in-process");
            warn!("  simulated tools, not to real equipment");
            warn!("===========================================");
        } else {
            info!(transport = self.transport.name(), "equipment transport linked");
        }

        let monitor = spawn_bus_monitor(&self.bus, self.shutdown_tx.subscribe());
        *self.monitor.lock() = Some(monitor);

        self.container.enable_all().await;
        info!(sessions = self.container.len(), "all sessions enabled");
        Ok(())
    }

    /// Disable sessions, drain workers, stop the monitor.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.container.shutdown().await;

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            let _ = monitor.await;
        }
        info!("Shutdown complete");
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    #[must_use]
    pub fn container(&self) -> &SessionContainer {
        &self.container
    }
}
