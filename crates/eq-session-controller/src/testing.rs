//! Simulated Equipment
//!
//! An in-process tool that implements `SessionFacade`. It answers the
//! message catalogue the controller uses from a small state model (control
//! and process codes, a program library, report/link/enable tables) and keeps
//! a transcript of every request for assertions.
//!
//! Available with the `test-utils` feature flag.
//!
//! ```text
//! controller ──send_and_wait──► SimulatedEquipment ──► scripted or natural reply
//!      ▲                               │
//!      └──── on_communicating / on_message (connect, emit_event)
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{ConnectionState, InboundMessage, SecsItem, StreamFunction};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::domain::errors::TransactionError;
use crate::domain::model::{EquipmentModel, ModelKind, ModelRegistry};
use crate::ports::inbound::SessionEventHandler;
use crate::ports::outbound::SessionFacade;

const S2F41: StreamFunction = StreamFunction::new(2, 41);

/// GEM control state code for On-Line/Remote.
const ONLINE_REMOTE: u64 = 5;
/// GEM control state code for Off-Line/Host Off-Line.
const HOST_OFFLINE: u64 = 3;

/// A recorded host command: RCMD plus `(CPNAME, CPVAL)` pairs.
pub type HostCommand = (String, Vec<(String, String)>);

#[derive(Default)]
struct ToolState {
    silent: bool,
    control_code: u64,
    process_code: u64,
    selected: String,
    programs: BTreeMap<String, Vec<u8>>,
    reports: HashMap<u32, Vec<u32>>,
    links: HashMap<u32, Vec<u32>>,
    enabled_events: HashSet<u32>,
    all_events_enabled: bool,
    forced: HashMap<StreamFunction, SecsItem>,
    sequences: HashMap<StreamFunction, VecDeque<u8>>,
    requests: Vec<(StreamFunction, Option<SecsItem>)>,
    responses: Vec<(StreamFunction, u32)>,
    host_commands: Vec<HostCommand>,
}

/// Scriptable tool answering the controller's requests.
pub struct SimulatedEquipment {
    model: &'static EquipmentModel,
    state: Mutex<ToolState>,
    handler: Mutex<Option<Weak<dyn SessionEventHandler>>>,
    gates: Mutex<HashMap<StreamFunction, watch::Sender<bool>>>,
    system_bytes: AtomicU32,
}

impl SimulatedEquipment {
    /// A tool of `kind`, On-Line/Remote, first process state, no programs.
    #[must_use]
    pub fn new(kind: ModelKind) -> Self {
        let model = ModelRegistry::standard().get(kind);
        let state = ToolState {
            control_code: ONLINE_REMOTE,
            process_code: 1,
            ..ToolState::default()
        };
        Self {
            model,
            state: Mutex::new(state),
            handler: Mutex::new(None),
            gates: Mutex::new(HashMap::new()),
            system_bytes: AtomicU32::new(1),
        }
    }

    #[must_use]
    pub fn model(&self) -> &'static EquipmentModel {
        self.model
    }

    // =========================================================================
    // LINK
    // =========================================================================

    /// Route connection callbacks and inbound messages to `handler`.
    pub fn attach<H: SessionEventHandler + 'static>(&self, handler: &Arc<H>) {
        let weak = Arc::downgrade(handler);
        let weak: Weak<dyn SessionEventHandler> = weak;
        *self.handler.lock() = Some(weak);
    }

    fn handler(&self) -> Option<Arc<dyn SessionEventHandler>> {
        self.handler.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Raise the communicating callback.
    pub async fn connect(&self) {
        if let Some(handler) = self.handler() {
            handler.on_communicating().await;
        }
    }

    /// Raise the disconnected callback.
    pub async fn drop_link(&self, state: ConnectionState) {
        if let Some(handler) = self.handler() {
            handler.on_disconnected(state).await;
        }
    }

    /// Deliver an S6F11 for `ceid` carrying `(rptid, values)` reports.
    pub async fn emit_event(&self, ceid: u32, reports: Vec<(u32, Vec<SecsItem>)>) {
        let reports = reports
            .into_iter()
            .map(|(rptid, values)| SecsItem::list(vec![SecsItem::U4(rptid), SecsItem::list(values)]))
            .collect();
        let system_bytes = self.next_system_bytes();
        let body = SecsItem::list(vec![
            SecsItem::U4(system_bytes),
            SecsItem::U4(ceid),
            SecsItem::list(reports),
        ]);
        self.deliver(InboundMessage::new(6, 11, system_bytes, Some(body))).await;
    }

    /// Deliver an arbitrary primary.
    pub async fn deliver(&self, message: InboundMessage) {
        if let Some(handler) = self.handler() {
            handler.on_message(message).await;
        }
    }

    fn next_system_bytes(&self) -> u32 {
        self.system_bytes.fetch_add(1, Ordering::Relaxed)
    }

    // =========================================================================
    // SCRIPTING
    // =========================================================================

    /// Record requests but never answer them.
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Record `sf` requests as they arrive but hold their replies until
    /// `release`.
    pub fn hold(&self, sf: StreamFunction) {
        self.gates.lock().insert(sf, watch::channel(false).0);
    }

    /// Answer held `sf` requests and stop holding new ones.
    pub fn release(&self, sf: StreamFunction) {
        if let Some(gate) = self.gates.lock().remove(&sf) {
            gate.send_replace(true);
        }
    }

    /// Answer every `sf` with `reply`.
    pub fn force_reply(&self, sf: StreamFunction, reply: SecsItem) {
        self.state.lock().forced.insert(sf, reply);
    }

    /// Answer every `sf` with acknowledgement `code`.
    pub fn force_ack(&self, sf: StreamFunction, code: u8) {
        self.force_reply(sf, ack_reply(sf, code));
    }

    /// Answer the next `sf` requests with `codes`, in order, then resume.
    pub fn force_ack_sequence(&self, sf: StreamFunction, codes: Vec<u8>) {
        self.state.lock().sequences.entry(sf).or_default().extend(codes);
    }

    pub fn set_control_code(&self, code: u64) {
        self.state.lock().control_code = code;
    }

    pub fn set_process_code(&self, code: u64) {
        self.state.lock().process_code = code;
    }

    /// Set the selected program name.
    pub fn set_program(&self, program: &str) {
        self.state.lock().selected = program.to_string();
    }

    /// Put a program in the tool's library.
    pub fn add_program(&self, program: &str, body: &[u8]) {
        self.state.lock().programs.insert(program.to_string(), body.to_vec());
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Requests of type `sf` received so far.
    #[must_use]
    pub fn count(&self, sf: StreamFunction) -> usize {
        self.state.lock().requests.iter().filter(|(s, _)| *s == sf).count()
    }

    /// Every request body of type `sf`, in order.
    #[must_use]
    pub fn requests_for(&self, sf: StreamFunction) -> Vec<Option<SecsItem>> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(s, _)| *s == sf)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Secondaries of type `sf` the host has sent.
    #[must_use]
    pub fn responses_for(&self, sf: StreamFunction) -> usize {
        self.state.lock().responses.iter().filter(|(s, _)| *s == sf).count()
    }

    #[must_use]
    pub fn host_commands(&self) -> Vec<HostCommand> {
        self.state.lock().host_commands.clone()
    }

    /// Reports linked to `ceid`.
    #[must_use]
    pub fn linked_reports(&self, ceid: u32) -> Vec<u32> {
        self.state.lock().links.get(&ceid).cloned().unwrap_or_default()
    }

    /// VIDs of a defined report.
    #[must_use]
    pub fn report_definition(&self, report_id: u32) -> Option<Vec<u32>> {
        self.state.lock().reports.get(&report_id).cloned()
    }

    #[must_use]
    pub fn is_event_enabled(&self, ceid: u32) -> bool {
        let state = self.state.lock();
        state.all_events_enabled || state.enabled_events.contains(&ceid)
    }

    #[must_use]
    pub fn has_program(&self, program: &str) -> bool {
        self.state.lock().programs.contains_key(program)
    }

    #[must_use]
    pub fn selected_program(&self) -> String {
        self.state.lock().selected.clone()
    }

    #[must_use]
    pub fn control_code(&self) -> u64 {
        self.state.lock().control_code
    }

    // =========================================================================
    // REPLIES
    // =========================================================================

    fn answer(&self, state: &mut ToolState, sf: StreamFunction, body: Option<&SecsItem>) -> Result<Option<SecsItem>, TransactionError> {
        if sf == S2F41 {
            if let Some(command) = body.and_then(parse_host_command) {
                state.host_commands.push(command);
            }
        }
        if let Some(code) = state.sequences.get_mut(&sf).and_then(VecDeque::pop_front) {
            return Ok(Some(ack_reply(sf, code)));
        }
        if let Some(reply) = state.forced.get(&sf) {
            return Ok(Some(reply.clone()));
        }

        let reply = match (sf.stream, sf.function) {
            (1, 3) => self.status_values(state, body),
            (1, 15) => {
                state.control_code = HOST_OFFLINE;
                SecsItem::ack(0)
            }
            (1, 17) => {
                if matches!(state.control_code, 4 | ONLINE_REMOTE) {
                    SecsItem::ack(2)
                } else {
                    state.control_code = ONLINE_REMOTE;
                    SecsItem::ack(0)
                }
            }
            (2, 33) => SecsItem::ack(define_reports(state, body)),
            (2, 35) => SecsItem::ack(link_reports(state, body)),
            (2, 37) => SecsItem::ack(enable_events(state, body)),
            (2, 41) => ack_reply(sf, self.host_command(state)),
            (7, 3) => SecsItem::ack(store_program(state, body)),
            (7, 5) => {
                let ppid = body.and_then(SecsItem::as_ascii).unwrap_or_default();
                match state.programs.get(ppid) {
                    Some(program) => SecsItem::list(vec![SecsItem::ascii(ppid), SecsItem::Binary(program.clone())]),
                    None => SecsItem::empty_list(),
                }
            }
            (7, 17) => SecsItem::ack(delete_programs(state, body)),
            _ => return Err(TransactionError::Facade(format!("{sf} not supported by simulated equipment"))),
        };
        Ok(Some(reply))
    }

    fn status_values(&self, state: &ToolState, body: Option<&SecsItem>) -> SecsItem {
        let vids = body.and_then(SecsItem::as_list).unwrap_or_default();
        SecsItem::list(
            vids.iter()
                .map(|vid| match vid.as_u64().and_then(|v| u32::try_from(v).ok()) {
                    Some(v) if v == self.model.control_state_vid => SecsItem::U8(state.control_code),
                    Some(v) if v == self.model.process_state_vid => SecsItem::U8(state.process_code),
                    Some(v) if v == self.model.program_vid => SecsItem::ascii(&state.selected),
                    _ => SecsItem::empty_list(),
                })
                .collect(),
        )
    }

    /// HCACK for the most recently recorded command.
    fn host_command(&self, state: &mut ToolState) -> u8 {
        let Some((rcmd, params)) = state.host_commands.last().cloned() else {
            return 3;
        };
        let commands = &self.model.commands;
        if rcmd != commands.select {
            return 0;
        }
        let program = params
            .iter()
            .find(|(name, _)| name == commands.program_param)
            .map(|(_, value)| value.clone());
        match program {
            Some(program) if state.programs.contains_key(&program) => {
                state.selected = program;
                0
            }
            _ => 3,
        }
    }
}

/// Acknowledgement reply shape for `sf`: S2F42 wraps HCACK in a list.
fn ack_reply(sf: StreamFunction, code: u8) -> SecsItem {
    if sf == S2F41 {
        SecsItem::list(vec![SecsItem::ack(code), SecsItem::empty_list()])
    } else {
        SecsItem::ack(code)
    }
}

fn ids(item: &SecsItem) -> Option<Vec<u32>> {
    item.as_list()?
        .iter()
        .map(|i| i.as_u64().and_then(|v| u32::try_from(v).ok()))
        .collect()
}

fn id(item: &SecsItem) -> Option<u32> {
    item.as_u64().and_then(|v| u32::try_from(v).ok())
}

/// S2F33 `L{DATAID, L{L{RPTID, L{VID…}}…}}`; an empty report list deletes everything.
fn define_reports(state: &mut ToolState, body: Option<&SecsItem>) -> u8 {
    let Some([_, reports]) = body.and_then(|b| b.expect_list(2).ok()) else {
        return 2;
    };
    let Some(reports) = reports.as_list() else {
        return 2;
    };
    if reports.is_empty() {
        state.reports.clear();
        state.links.clear();
        return 0;
    }

    let mut parsed = Vec::with_capacity(reports.len());
    for report in reports {
        let Some([rptid, vids]) = report.expect_list(2).ok() else {
            return 2;
        };
        let (Some(rptid), Some(vids)) = (id(rptid), ids(vids)) else {
            return 2;
        };
        if state.reports.contains_key(&rptid) {
            return 3;
        }
        parsed.push((rptid, vids));
    }
    state.reports.extend(parsed);
    0
}

/// S2F35 `L{DATAID, L{L{CEID, L{RPTID…}}…}}`.
fn link_reports(state: &mut ToolState, body: Option<&SecsItem>) -> u8 {
    let Some([_, links]) = body.and_then(|b| b.expect_list(2).ok()) else {
        return 2;
    };
    let Some(links) = links.as_list() else {
        return 2;
    };

    let mut parsed = Vec::with_capacity(links.len());
    for link in links {
        let Some([ceid, rptids]) = link.expect_list(2).ok() else {
            return 2;
        };
        let (Some(ceid), Some(rptids)) = (id(ceid), ids(rptids)) else {
            return 2;
        };
        if state.links.get(&ceid).is_some_and(|r| !r.is_empty()) {
            return 3;
        }
        if rptids.iter().any(|r| !state.reports.contains_key(r)) {
            return 5;
        }
        parsed.push((ceid, rptids));
    }
    state.links.extend(parsed);
    0
}

/// S2F37 `L{CEED, L{CEID…}}`; an empty CEID list means every event.
fn enable_events(state: &mut ToolState, body: Option<&SecsItem>) -> u8 {
    let Some([ceed, ceids]) = body.and_then(|b| b.expect_list(2).ok()) else {
        return 1;
    };
    let (Some(enable), Some(ceids)) = (ceed.as_bool(), ids(ceids)) else {
        return 1;
    };
    if ceids.is_empty() {
        state.all_events_enabled = enable;
        if !enable {
            state.enabled_events.clear();
        }
        return 0;
    }
    for ceid in ceids {
        if enable {
            state.enabled_events.insert(ceid);
        } else {
            state.enabled_events.remove(&ceid);
        }
    }
    0
}

/// S7F3 `L{PPID, PPBODY}`.
fn store_program(state: &mut ToolState, body: Option<&SecsItem>) -> u8 {
    let Some([ppid, ppbody]) = body.and_then(|b| b.expect_list(2).ok()) else {
        return 2;
    };
    match (ppid.as_ascii(), ppbody.as_bytes()) {
        (Some(ppid), Some(bytes)) if !ppid.is_empty() => {
            state.programs.insert(ppid.to_string(), bytes.to_vec());
            0
        }
        _ => 2,
    }
}

/// S7F17 `L{PPID…}`; fails with 4 if any program is missing.
fn delete_programs(state: &mut ToolState, body: Option<&SecsItem>) -> u8 {
    let ppids: Vec<&str> = body
        .and_then(SecsItem::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(SecsItem::as_ascii)
        .collect();
    if ppids.iter().any(|p| !state.programs.contains_key(*p)) {
        return 4;
    }
    for ppid in ppids {
        state.programs.remove(ppid);
    }
    0
}

fn parse_host_command(body: &SecsItem) -> Option<HostCommand> {
    let [rcmd, params] = body.expect_list(2).ok()? else {
        return None;
    };
    let params = params
        .as_list()?
        .iter()
        .map(|pair| match pair.expect_list(2).ok()? {
            [name, value] => Some((name.as_ascii()?.to_string(), value.to_text()?)),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some((rcmd.as_ascii()?.to_string(), params))
}

#[async_trait]
impl SessionFacade for SimulatedEquipment {
    async fn send_and_wait(
        &self,
        sf: StreamFunction,
        body: Option<SecsItem>,
    ) -> Result<Option<SecsItem>, TransactionError> {
        self.state.lock().requests.push((sf, body.clone()));

        let gate = self.gates.lock().get(&sf).map(watch::Sender::subscribe);
        if let Some(mut gate) = gate {
            trace!(%sf, "simulated request held");
            let _ = gate.wait_for(|open| *open).await;
        }

        let reply = {
            let mut state = self.state.lock();
            if state.silent {
                None
            } else {
                Some(self.answer(&mut state, sf, body.as_ref()))
            }
        };
        trace!(%sf, answered = reply.is_some(), "simulated request");

        match reply {
            Some(reply) => reply,
            None => std::future::pending().await,
        }
    }

    async fn send_response(
        &self,
        sf: StreamFunction,
        system_bytes: u32,
        _body: Option<SecsItem>,
    ) -> Result<(), TransactionError> {
        self.state.lock().responses.push((sf, system_bytes));
        Ok(())
    }

    async fn enable(&self) -> Result<(), TransactionError> {
        debug!(model = %self.model.kind, "simulated link up");
        if let Some(handler) = self.handler() {
            handler.on_communicating().await;
        }
        Ok(())
    }

    async fn disable(&self) -> Result<(), TransactionError> {
        debug!(model = %self.model.kind, "simulated link down");
        if let Some(handler) = self.handler() {
            handler.on_disconnected(ConnectionState::NotCommunicating).await;
        }
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
