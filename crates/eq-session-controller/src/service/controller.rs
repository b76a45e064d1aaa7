//! Equipment Session Controller
//!
//! One controller per configured tool. It receives the facade's callbacks,
//! updates state directly where no request is needed, and queues everything
//! else on the session worker.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_bus::EventPublisher;
use shared_types::{ConnectionState, EquipmentIdentity, InboundMessage, SecsItem};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::recipe::RecipeSync;
use super::status::StatusQueries;
use super::subscription::SubscriptionManager;
use super::tracker::StateTracker;
use super::transaction::Transactor;
use super::validation::LotValidationPipeline;
use super::worker::{run_worker, QueryKind, SessionCore, WorkItem};
use crate::adapters::publisher::StatusPublisher;
use crate::adapters::recipe_store::FsRecipeStore;
use crate::config::ControllerConfig;
use crate::domain::errors::{RecipeError, RecipeStep, SessionError, SubscriptionError};
use crate::domain::model::{EquipmentModel, ModelKind, ModelRegistry, ReportRole};
use crate::domain::reports::{EventReport, TypedReport};
use crate::domain::rules::RuleBook;
use crate::domain::session::EquipmentSession;
use crate::ports::inbound::{EquipmentControlApi, SessionEventHandler};
use crate::ports::outbound::{LotLookup, RecipeStore, SessionFacade};

// =============================================================================
// BUILDER
// =============================================================================

/// Assembles a controller from its collaborators.
///
/// `build` spawns the session worker and must run inside a Tokio runtime.
#[derive(Default)]
pub struct EquipmentControllerBuilder {
    identity: Option<EquipmentIdentity>,
    model: Option<&'static EquipmentModel>,
    config: ControllerConfig,
    facade: Option<Arc<dyn SessionFacade>>,
    lookup: Option<Arc<dyn LotLookup>>,
    store: Option<Arc<dyn RecipeStore>>,
    rules: Option<Arc<RuleBook>>,
    bus: Option<Arc<dyn EventPublisher>>,
}

impl EquipmentControllerBuilder {
    #[must_use]
    pub fn new(identity: EquipmentIdentity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    /// Override the model resolved from the identity's model tag.
    #[must_use]
    pub fn model(mut self, model: ModelKind) -> Self {
        self.model = Some(ModelRegistry::standard().get(model));
        self
    }

    /// Use a model table outside the built-in registry.
    #[must_use]
    pub fn model_table(mut self, model: &'static EquipmentModel) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn facade(mut self, facade: Arc<dyn SessionFacade>) -> Self {
        self.facade = Some(facade);
        self
    }

    #[must_use]
    pub fn lot_lookup(mut self, lookup: Arc<dyn LotLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Recipe store; defaults to the filesystem store at `config.recipe_root`.
    #[must_use]
    pub fn recipe_store(mut self, store: Arc<dyn RecipeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Rule book; defaults to empty (every lot is rejected for lack of a rule).
    #[must_use]
    pub fn rules(mut self, rules: Arc<RuleBook>) -> Self {
        self.rules = Some(rules);
        self
    }

    #[must_use]
    pub fn event_bus(mut self, bus: Arc<dyn EventPublisher>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> Result<Arc<EquipmentController>, SessionError> {
        let identity = self.identity.ok_or(SessionError::Incomplete("identity"))?;
        let facade = self.facade.ok_or(SessionError::Incomplete("facade"))?;
        let lookup = self.lookup.ok_or(SessionError::Incomplete("lot lookup"))?;
        let bus = self.bus.ok_or(SessionError::Incomplete("event bus"))?;

        let model = match self.model {
            Some(model) => model,
            None => ModelRegistry::standard().resolve(&identity.equipment_model)?,
        };
        let store: Arc<dyn RecipeStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FsRecipeStore::new(&self.config.recipe_root)),
        };
        let rules = self.rules.unwrap_or_default();

        let name = identity.equipment_name.clone();
        let publisher = StatusPublisher::new(&name, bus);
        let tracker = Arc::new(StateTracker::new(EquipmentSession::new(identity, model.kind), publisher));
        let transactor = Transactor::new(facade, self.config.reply_timeout());
        let recipes = RecipeSync::new(&name, model, transactor.clone(), store);

        let core = Arc::new(SessionCore {
            tracker: tracker.clone(),
            transactor: transactor.clone(),
            subscriptions: SubscriptionManager::new(&name, model, transactor.clone()),
            status: StatusQueries::new(tracker.clone(), model, transactor.clone()),
            pipeline: LotValidationPipeline::new(
                &name,
                model,
                transactor.clone(),
                lookup,
                rules,
                recipes.clone(),
                self.config.program_request_token.clone(),
            ),
            recipes,
            last_handshake: RwLock::new(None),
        });

        let (queue, receiver) = mpsc::channel(self.config.work_queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(core.clone(), receiver));
        info!(equipment = %name, model = %model.kind, "session controller created");

        Ok(Arc::new(EquipmentController {
            name,
            model,
            config: self.config,
            core,
            queue,
            dropped: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
        }))
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct EquipmentController {
    name: String,
    model: &'static EquipmentModel,
    config: ControllerConfig,
    core: Arc<SessionCore>,
    queue: mpsc::Sender<WorkItem>,
    dropped: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EquipmentController {
    #[must_use]
    pub fn builder(identity: EquipmentIdentity) -> EquipmentControllerBuilder {
        EquipmentControllerBuilder::new(identity)
    }

    /// Session name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn model(&self) -> &'static EquipmentModel {
        self.model
    }

    /// Outcome of the handshake for the current connection; `None` until it
    /// has run.
    #[must_use]
    pub fn last_handshake(&self) -> Option<Result<usize, SubscriptionError>> {
        self.core.last_handshake.read().clone()
    }

    /// Wait until everything queued so far has been processed.
    pub async fn flush(&self) -> Result<(), SessionError> {
        self.call(WorkItem::Barrier).await.ok_or(SessionError::WorkerStopped)
    }

    /// Stop the worker after the work already queued.
    pub async fn shutdown(&self) {
        let _ = self.queue.send(WorkItem::Shutdown).await;
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(equipment = %self.name, error = %e, "session worker ended abnormally");
            }
        }
        info!(equipment = %self.name, "session controller stopped");
    }

    /// Work items dropped because the queue was full when they arrived.
    #[must_use]
    pub fn dropped_work(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queue work from a facade callback. Never waits for room: the worker
    /// may itself be waiting on a reply this callback has to deliver.
    fn enqueue(&self, item: WorkItem) {
        match self.queue.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(item)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(equipment = %self.name, work = ?item, dropped, "session queue full, work dropped");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(equipment = %self.name, "session worker stopped, work dropped");
            }
        }
    }

    /// Queue an item carrying a reply channel and wait for the reply.
    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> WorkItem) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.queue.send(make(tx)).await.ok()?;
        rx.await.ok()
    }

    async fn query(&self, kind: QueryKind) -> Result<String, SessionError> {
        self.call(|reply| WorkItem::Query { kind, reply })
            .await
            .unwrap_or(Err(SessionError::WorkerStopped))
    }

    async fn recipe(&self, step: RecipeStep, program_id: &str) -> Result<(), RecipeError> {
        let program_id = program_id.to_string();
        self.call(|reply| WorkItem::Recipe {
            step,
            program_id,
            reply,
        })
        .await
        .unwrap_or(Err(RecipeError::WorkerStopped))
    }

    async fn set_online(&self, online: bool) -> Result<(), SessionError> {
        self.call(|reply| WorkItem::SetOnline { online, reply })
            .await
            .unwrap_or(Err(SessionError::WorkerStopped))
    }

    async fn route_event_report(&self, body: &SecsItem) {
        let tracker = &self.core.tracker;
        let report = match EventReport::parse(body) {
            Ok(report) => report,
            Err(e) => {
                warn!(equipment = %self.name, error = %e, "undecodable event report");
                return;
            }
        };
        debug!(equipment = %self.name, ceid = report.ceid, reports = report.reports.len(), "event report");

        // control and process maps are independent; both may fire
        if let Some(state) = self.model.control_state_for_event(report.ceid) {
            if let Err(e) = tracker.set_control_state(state).await {
                debug!(equipment = %self.name, ceid = report.ceid, error = %e, "control state event ignored");
            }
        }
        if let Some(state) = self.model.process_state_for_event(report.ceid) {
            if let Err(e) = tracker.set_process_state(state).await {
                debug!(equipment = %self.name, ceid = report.ceid, error = %e, "process state event ignored");
            }
        }

        let mut program_reported = false;
        for data in &report.reports {
            let typed = match TypedReport::classify(self.model, data) {
                Ok(typed) => typed,
                Err(e) => {
                    warn!(equipment = %self.name, ceid = report.ceid, rptid = data.report_id, error = %e, "bad report");
                    continue;
                }
            };
            match typed {
                TypedReport::LotScan(scan) => {
                    self.enqueue(WorkItem::ValidateLot {
                        epoch: tracker.epoch(),
                        scan,
                    });
                }
                TypedReport::LotOpen { lot_id } => tracker.set_active_lot(Some(&lot_id)).await,
                TypedReport::LotClose { lot_id } => {
                    let snapshot = tracker.snapshot();
                    if let Some(active) = snapshot.active_lot().filter(|active| *active != lot_id) {
                        debug!(equipment = %self.name, %active, closed = %lot_id, "closing lot differs from active lot");
                    }
                    tracker.set_active_lot(None).await;
                }
                TypedReport::ProgramChange { program } => {
                    program_reported = true;
                    if let Err(e) = tracker.set_active_program(&program).await {
                        debug!(equipment = %self.name, error = %e, "program event ignored");
                    }
                }
                TypedReport::Unrecognized { report_id } => {
                    debug!(equipment = %self.name, rptid = report_id, "unsubscribed report ignored");
                }
            }
        }

        let has_program_report = self.model.subscription_for_role(ReportRole::ProgramChange).is_some();
        if report.ceid == self.model.program_change_ceid && !program_reported && !has_program_report {
            self.enqueue(WorkItem::RefreshProgram { epoch: tracker.epoch() });
        }
    }

    async fn reply(&self, message: &InboundMessage, body: Option<SecsItem>) {
        if !message.reply_expected {
            return;
        }
        if let Err(e) = self
            .core
            .transactor
            .reply(message.sf.reply(), message.system_bytes, body)
            .await
        {
            warn!(equipment = %self.name, sf = %message.sf, error = %e, "reply not sent");
        }
    }
}

// =============================================================================
// FACADE CALLBACKS
// =============================================================================

#[async_trait]
impl SessionEventHandler for EquipmentController {
    async fn on_communicating(&self) {
        let epoch = self.core.tracker.on_connection_established().await;
        *self.core.last_handshake.write() = None;

        // the handshake issues requests, so it must not start inside this callback
        let queue = self.queue.clone();
        let delay = self.config.settle_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = queue.send(WorkItem::Handshake { epoch }).await;
        });
    }

    async fn on_disconnected(&self, state: ConnectionState) {
        self.core.tracker.on_connection_lost(state).await;
    }

    async fn on_message(&self, message: InboundMessage) {
        match (message.sf.stream, message.sf.function) {
            (6, 11) => {
                self.reply(&message, Some(SecsItem::ack(0))).await;
                match &message.body {
                    Some(body) => self.route_event_report(body).await,
                    None => warn!(equipment = %self.name, "S6F11 without body"),
                }
            }
            (5, 1) => {
                let alarm = message.body.as_ref().and_then(|b| b.expect_list(3).ok());
                match alarm {
                    Some([alcd, alid, altx]) => warn!(
                        equipment = %self.name,
                        alcd = ?alcd.as_bytes(),
                        alid = ?alid.as_u64(),
                        text = altx.as_ascii().unwrap_or_default(),
                        "alarm report"
                    ),
                    _ => warn!(equipment = %self.name, "malformed alarm report"),
                }
                self.reply(&message, Some(SecsItem::ack(0))).await;
            }
            (1, 1) => self.reply(&message, Some(SecsItem::empty_list())).await,
            _ => debug!(equipment = %self.name, sf = %message.sf, "unhandled message"),
        }
    }
}

// =============================================================================
// CONTROL API
// =============================================================================

#[async_trait]
impl EquipmentControlApi for EquipmentController {
    async fn enable(&self) -> Result<(), SessionError> {
        self.core.tracker.set_enabled(true).await;
        self.core.transactor.facade().enable().await?;
        info!(equipment = %self.name, "enabled");
        Ok(())
    }

    async fn disable(&self) -> Result<(), SessionError> {
        self.core.tracker.set_enabled(false).await;
        self.core.transactor.facade().disable().await?;
        info!(equipment = %self.name, "disabled");
        Ok(())
    }

    async fn go_online(&self) -> Result<(), SessionError> {
        self.set_online(true).await
    }

    async fn go_offline(&self) -> Result<(), SessionError> {
        self.set_online(false).await
    }

    async fn query_control_state(&self) -> Result<String, SessionError> {
        self.query(QueryKind::ControlState).await
    }

    async fn query_process_state(&self) -> Result<String, SessionError> {
        self.query(QueryKind::ProcessState).await
    }

    async fn query_active_program(&self) -> Result<String, SessionError> {
        self.query(QueryKind::ActiveProgram).await
    }

    async fn send_recipe(&self, program_id: &str) -> Result<(), RecipeError> {
        self.recipe(RecipeStep::Send, program_id).await
    }

    async fn select_recipe(&self, program_id: &str) -> Result<(), RecipeError> {
        self.recipe(RecipeStep::Select, program_id).await
    }

    async fn delete_recipe(&self, program_id: &str) -> Result<(), RecipeError> {
        self.recipe(RecipeStep::Delete, program_id).await
    }

    async fn pull_recipe(&self, program_id: &str) -> Result<(), RecipeError> {
        self.recipe(RecipeStep::Pull, program_id).await
    }

    fn snapshot(&self) -> EquipmentSession {
        self.core.tracker.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{HostCommands, LotScanShape};
    use crate::domain::rules::RuleGroupRecord;
    use crate::ports::outbound::mocks::{MapLotLookup, MemoryRecipeStore};
    use crate::testing::{wait_until, SimulatedEquipment};
    use shared_bus::{EquipmentEvent, EventFilter, EventTopic, InMemoryEventBus};
    use shared_types::StreamFunction;
    use std::time::Duration;

    /// Die bonder tables where CEID 12 is both a control and a process
    /// transition.
    static SHARED_STATE_CEID: EquipmentModel = EquipmentModel {
        kind: ModelKind::DieBonder,
        control_state_vid: 1,
        control_states: &[(4, "On-Line/Local"), (5, "On-Line/Remote")],
        control_state_events: &[(12, "On-Line/Local")],
        process_state_vid: 2,
        process_states: &[(1, "Idle"), (4, "Executing")],
        process_state_events: &[(12, "Executing")],
        program_vid: 3,
        program_change_ceid: 20,
        subscriptions: &[],
        lot_scan_shape: LotScanShape::FourValue,
        commands: HostCommands {
            accept: "LOT_ACCEPT",
            reject: "LOT_REJECT",
            select: "PP-SELECT",
            lot_param: "LOTID",
            reason_param: "REASON",
            program_param: "PPID",
        },
    };

    struct Harness {
        tool: Arc<SimulatedEquipment>,
        bus: Arc<InMemoryEventBus>,
        controller: Arc<EquipmentController>,
    }

    fn harness(kind: ModelKind) -> Harness {
        harness_with(kind, |builder| builder)
    }

    fn harness_with(
        kind: ModelKind,
        configure: impl FnOnce(EquipmentControllerBuilder) -> EquipmentControllerBuilder,
    ) -> Harness {
        let tool = Arc::new(SimulatedEquipment::new(kind));
        let bus = Arc::new(InMemoryEventBus::new());
        let config = ControllerConfig {
            settle_delay_ms: 5,
            reply_timeout_ms: 200,
            ..ControllerConfig::default()
        };
        let builder = EquipmentController::builder(EquipmentIdentity::new(
            "EQ1",
            kind.as_str(),
            "127.0.0.1",
            5000,
            1,
        ))
        .config(config)
        .facade(tool.clone())
        .lot_lookup(Arc::new(MapLotLookup::default()))
        .recipe_store(Arc::new(MemoryRecipeStore::default()))
        .event_bus(bus.clone());
        let controller = configure(builder).build().unwrap();
        tool.attach(&controller);
        Harness { tool, bus, controller }
    }

    impl Harness {
        /// Connect and wait for the handshake and baseline queries.
        async fn online(&self) {
            self.tool.connect().await;
            let controller = self.controller.clone();
            assert!(wait_until(Duration::from_secs(2), || controller.last_handshake().is_some()).await);
            self.controller.flush().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_builder_rejects_unknown_model() {
        let tool = Arc::new(SimulatedEquipment::new(ModelKind::DieBonder));
        let result = EquipmentController::builder(EquipmentIdentity::new("X", "OVEN", "h", 1, 1))
            .facade(tool)
            .lot_lookup(Arc::new(MapLotLookup::default()))
            .event_bus(Arc::new(InMemoryEventBus::new()))
            .build();
        assert!(matches!(result, Err(SessionError::UnknownModel(_))));
    }

    #[tokio::test]
    async fn test_builder_requires_facade() {
        let result = EquipmentController::builder(EquipmentIdentity::new("X", "DIE_BONDER", "h", 1, 1))
            .lot_lookup(Arc::new(MapLotLookup::default()))
            .event_bus(Arc::new(InMemoryEventBus::new()))
            .build();
        assert!(matches!(result, Err(SessionError::Incomplete("facade"))));
    }

    #[tokio::test]
    async fn test_connect_runs_handshake_and_baseline() {
        let h = harness(ModelKind::DieBonder);
        h.tool.set_process_code(4);
        h.tool.set_program("PGM-A");

        h.tool.connect().await;
        let controller = h.controller.clone();
        assert!(wait_until(Duration::from_secs(2), || controller.snapshot().active_program().is_some()).await);

        assert_eq!(h.controller.last_handshake(), Some(Ok(4)));
        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.control_state(), Some("On-Line/Remote"));
        assert_eq!(snapshot.process_state(), Some("Executing"));
        assert_eq!(
            h.bus.retained("equipments/status/connection_state/EQ1").as_deref(),
            Some("COMMUNICATING")
        );
    }

    #[tokio::test]
    async fn test_event_report_is_acknowledged_and_routed() {
        let h = harness(ModelKind::DieBonder);
        h.online().await;

        // CEID 12 is a process-state event; report 101 opens a lot
        h.tool
            .emit_event(12, vec![(101, vec![SecsItem::ascii("LOT9")])])
            .await;

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.process_state(), Some("Executing"));
        assert_eq!(snapshot.active_lot(), Some("LOT9"));
        assert_eq!(h.tool.responses_for(StreamFunction::new(6, 12)), 1);
    }

    #[tokio::test]
    async fn test_one_event_updates_control_and_process_state() {
        let h = harness_with(ModelKind::DieBonder, |builder| builder.model_table(&SHARED_STATE_CEID));
        h.online().await;
        assert_eq!(h.controller.snapshot().control_state(), Some("On-Line/Remote"));
        assert_eq!(h.controller.snapshot().process_state(), Some("Idle"));

        h.tool.emit_event(12, vec![]).await;

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.control_state(), Some("On-Line/Local"));
        assert_eq!(snapshot.process_state(), Some("Executing"));
        assert_eq!(
            h.bus.retained("equipments/status/control_state/EQ1").as_deref(),
            Some("On-Line/Local")
        );
        assert_eq!(
            h.bus.retained("equipments/status/process_state/EQ1").as_deref(),
            Some("Executing")
        );
    }

    #[tokio::test]
    async fn test_program_ceid_without_report_queries_program() {
        let h = harness(ModelKind::WireBonder);
        h.online().await;

        h.tool.set_program("WB-2");
        h.tool.emit_event(230, vec![]).await;
        h.controller.flush().await.unwrap();

        assert_eq!(h.controller.snapshot().active_program(), Some("WB-2"));
    }

    #[tokio::test]
    async fn test_lot_decision_published() {
        let h = harness(ModelKind::WireBonder);
        let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::LotValidation]));
        h.online().await;

        h.tool
            .emit_event(300, vec![(30, vec![SecsItem::ascii("unknown"), SecsItem::ascii("P")])])
            .await;
        h.controller.flush().await.unwrap();

        match sub.try_recv() {
            Ok(Some(EquipmentEvent::LotValidated { lot_id, accepted, reason, .. })) => {
                assert_eq!(lot_id, "UNKNOWN");
                assert!(!accepted);
                assert_eq!(reason.as_deref(), Some("lot lookup failed"));
            }
            other => panic!("expected lot decision, got {other:?}"),
        }
        assert_eq!(h.tool.host_commands()[0].0, "REJECT");
    }

    /// The worker is stuck on a silent tool; inbound scans must still return.
    #[tokio::test]
    async fn test_full_queue_never_blocks_inbound_callback() {
        let h = harness_with(ModelKind::WireBonder, |builder| {
            builder.config(ControllerConfig {
                settle_delay_ms: 5,
                reply_timeout_ms: 2_000,
                work_queue_capacity: 1,
                ..ControllerConfig::default()
            })
        });
        h.online().await;
        h.tool.set_silent(true);

        for lot in ["LOT1", "LOT2", "LOT3"] {
            let scan = vec![(30, vec![SecsItem::ascii(lot), SecsItem::ascii("P")])];
            let delivered = tokio::time::timeout(Duration::from_millis(500), h.tool.emit_event(300, scan)).await;
            assert!(delivered.is_ok(), "callback for {lot} blocked on the queue");
        }

        assert!(h.controller.dropped_work() >= 1);
        assert_eq!(h.tool.responses_for(StreamFunction::new(6, 12)), 3);
    }

    #[tokio::test]
    async fn test_queries_fail_closed_when_offline() {
        let h = harness(ModelKind::DieBonder);
        assert!(matches!(
            h.controller.query_control_state().await,
            Err(SessionError::NotOnline { .. })
        ));
        assert_eq!(
            h.controller.pull_recipe("P").await,
            Err(RecipeError::NotOnline("EQ1".into()))
        );
    }

    #[tokio::test]
    async fn test_go_offline_then_online() {
        let h = harness(ModelKind::DieBonder);
        h.online().await;

        h.controller.go_offline().await.unwrap();
        assert_eq!(h.controller.snapshot().control_state(), Some("Off-Line/Host Off-Line"));
        h.controller.go_online().await.unwrap();
        assert_eq!(h.controller.snapshot().control_state(), Some("On-Line/Remote"));
    }

    #[tokio::test]
    async fn test_rules_are_used() {
        let records: Vec<RuleGroupRecord> = serde_json::from_str(
            r#"[{"package8digit":"SOIC-08U","selection_code":"1000","data_with_selection_code":[]}]"#,
        )
        .unwrap();
        let rules = Arc::new(RuleBook::from_records(records).unwrap());
        let tool = Arc::new(SimulatedEquipment::new(ModelKind::DieBonder));
        let controller = EquipmentController::builder(EquipmentIdentity::new("EQ2", "DIE_BONDER", "h", 1, 1))
            .facade(tool)
            .lot_lookup(Arc::new(MapLotLookup::default()))
            .recipe_store(Arc::new(MemoryRecipeStore::default()))
            .rules(rules)
            .event_bus(Arc::new(InMemoryEventBus::new()))
            .build()
            .unwrap();
        assert_eq!(controller.name(), "EQ2");
        controller.shutdown().await;
        assert_eq!(controller.flush().await, Err(SessionError::WorkerStopped));
    }
}
