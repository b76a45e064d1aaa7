//! # Test Fixtures
//!
//! One controller wired to a simulated tool, the in-memory bus, an in-memory
//! lot master and a recipe store rooted in a temporary directory.

use std::sync::Arc;
use std::time::Duration;

use eq_session_controller::domain::{ReportRole, SubscriptionEntry};
use eq_session_controller::testing::HostCommand;
use eq_session_controller::{
    wait_until, ControllerConfig, EquipmentController, FsRecipeStore, InMemoryLotLookup, LotInfo,
    ModelKind, RuleCatalog, SimulatedEquipment,
};
use shared_bus::InMemoryEventBus;
use shared_types::{EquipmentIdentity, SecsItem};
use tempfile::TempDir;

/// Session name used by every fixture.
pub const EQUIPMENT: &str = "WB01";

/// Package code of the fixture lots.
pub const PACKAGE: &str = "SOIC-08USDPNSDP";

pub struct Session {
    pub tool: Arc<SimulatedEquipment>,
    pub bus: Arc<InMemoryEventBus>,
    pub lots: Arc<InMemoryLotLookup>,
    pub store: Arc<FsRecipeStore>,
    pub controller: Arc<EquipmentController>,
    _recipes: TempDir,
}

/// Build a wire bonder session whose rule book is `rules_json` (the group
/// list for `EQUIPMENT`).
pub fn session(rules_json: &str) -> Session {
    session_for(ModelKind::WireBonder, rules_json)
}

pub fn session_for(kind: ModelKind, rules_json: &str) -> Session {
    let recipes = tempfile::tempdir().unwrap();
    let catalog = RuleCatalog::from_json(&format!(r#"{{ "{EQUIPMENT}": {rules_json} }}"#)).unwrap();

    let tool = Arc::new(SimulatedEquipment::new(kind));
    let bus = Arc::new(InMemoryEventBus::new());
    let lots = Arc::new(InMemoryLotLookup::new());
    let store = Arc::new(FsRecipeStore::new(recipes.path()));
    let config = ControllerConfig {
        settle_delay_ms: 5,
        reply_timeout_ms: 500,
        ..ControllerConfig::default()
    };

    let controller = EquipmentController::builder(EquipmentIdentity::new(
        EQUIPMENT,
        kind.as_str(),
        "127.0.0.1",
        5000,
        1,
    ))
    .config(config)
    .facade(tool.clone())
    .lot_lookup(lots.clone())
    .recipe_store(store.clone())
    .rules(catalog.book_for(EQUIPMENT))
    .event_bus(bus.clone())
    .build()
    .unwrap();
    tool.attach(&controller);

    Session {
        tool,
        bus,
        lots,
        store,
        controller,
        _recipes: recipes,
    }
}

impl Session {
    /// Connect and wait until the handshake and the baseline queries ran.
    pub async fn online(&self) {
        self.tool.connect().await;
        let controller = self.controller.clone();
        assert!(wait_until(Duration::from_secs(2), || controller.last_handshake().is_some()).await);
        self.controller.flush().await.unwrap();
    }

    pub fn entry(&self, role: ReportRole) -> &'static SubscriptionEntry {
        self.tool.model().subscription_for_role(role).unwrap()
    }

    /// Raise the event of `role` with `values` and wait for the worker.
    pub async fn report(&self, role: ReportRole, values: Vec<SecsItem>) {
        let entry = self.entry(role);
        self.tool.emit_event(entry.ceid, vec![(entry.report_id, values)]).await;
        self.controller.flush().await.unwrap();
    }

    /// Scan `lot_id` while the tool reports `program`.
    pub async fn scan(&self, lot_id: &str, program: &str) {
        self.report(
            ReportRole::LotScan,
            vec![SecsItem::ascii(lot_id), SecsItem::ascii(program)],
        )
        .await;
    }

    /// The last host command the tool received.
    pub fn last_command(&self) -> HostCommand {
        self.tool.host_commands().pop().unwrap()
    }

    /// `REASON` parameter of the last host command, if any.
    pub fn last_reason(&self) -> Option<String> {
        self.last_command()
            .1
            .into_iter()
            .find(|(name, _)| name == "REASON")
            .map(|(_, value)| value)
    }
}

pub fn lot(lot_id: &str, status: &str) -> LotInfo {
    LotInfo {
        lot_id: lot_id.to_string(),
        status: status.to_string(),
        package_code: PACKAGE.to_string(),
        operation_code: "WB200".to_string(),
        on_operation: "WB".to_string(),
        ..LotInfo::default()
    }
}

/// One group for `SOIC-08U` with mask `1001` and a single rule keyed
/// `selection_key`.
pub fn rules(selection_key: &str, recipe: &str, options: &str) -> String {
    format!(
        r#"[{{
            "package8digit": "SOIC-08U",
            "selection_code": "1001",
            "data_with_selection_code": [{{
                "package_selection_code": "{selection_key}",
                "operation_code": "WB200",
                "on_operation": "WB",
                "validate_type": "program",
                "recipe_name": "{recipe}",
                "product_name": "SOIC8",
                "options": {options}
            }}]
        }}]"#
    )
}

pub const ALL_CHECKS: &str = r#"{ "use_operation_code": true, "use_on_operation": true, "use_lot_hold": true }"#;
