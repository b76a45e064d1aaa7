//! Per-session worker
//!
//! Every request/response transaction a session issues runs here, one at a
//! time, off the facade's callback stack. Work created for a connection
//! carries that connection's epoch and is dropped once the epoch moves on.

use parking_lot::RwLock;
use shared_types::StreamFunction;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::recipe::RecipeSync;
use super::status::StatusQueries;
use super::subscription::SubscriptionManager;
use super::tracker::StateTracker;
use super::transaction::Transactor;
use super::validation::LotValidationPipeline;
use crate::domain::acks::{OfflineAck, OnlineAck};
use crate::domain::errors::{RecipeError, RecipeStep, SessionError, SubscriptionError};
use crate::domain::reports::LotScanReport;

const S1F15: StreamFunction = StreamFunction::new(1, 15);
const S1F17: StreamFunction = StreamFunction::new(1, 17);

/// Which status variable to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    ControlState,
    ProcessState,
    ActiveProgram,
}

/// A unit of queued work.
#[derive(Debug)]
pub enum WorkItem {
    /// Subscription handshake followed by the baseline status queries.
    Handshake { epoch: u64 },
    /// Validate a scanned lot and send the decision.
    ValidateLot { epoch: u64, scan: LotScanReport },
    /// Re-read the selected program after a program-change event.
    RefreshProgram { epoch: u64 },
    /// Operator status query.
    Query {
        kind: QueryKind,
        reply: oneshot::Sender<Result<String, SessionError>>,
    },
    /// Operator recipe operation.
    Recipe {
        step: RecipeStep,
        program_id: String,
        reply: oneshot::Sender<Result<(), RecipeError>>,
    },
    /// Operator online/offline request.
    SetOnline {
        online: bool,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Completes once everything queued before it has run.
    Barrier(oneshot::Sender<()>),
    /// Stop the worker.
    Shutdown,
}

/// Services owned by one session.
pub struct SessionCore {
    pub tracker: Arc<StateTracker>,
    pub transactor: Transactor,
    pub subscriptions: SubscriptionManager,
    pub status: StatusQueries,
    pub recipes: RecipeSync,
    pub pipeline: LotValidationPipeline,
    pub last_handshake: RwLock<Option<Result<usize, SubscriptionError>>>,
}

/// Serve the queue until `Shutdown` or until every sender is gone.
pub async fn run_worker(core: Arc<SessionCore>, mut queue: mpsc::Receiver<WorkItem>) {
    let equipment = core.tracker.name();
    debug!(%equipment, "session worker started");

    while let Some(item) = queue.recv().await {
        match item {
            WorkItem::Handshake { epoch } => core.handshake(epoch).await,
            WorkItem::ValidateLot { epoch, scan } => core.validate(epoch, scan).await,
            WorkItem::RefreshProgram { epoch } => {
                if core.tracker.is_current(epoch) {
                    let _ = core.status.query_active_program().await;
                }
            }
            WorkItem::Query { kind, reply } => {
                let result = match kind {
                    QueryKind::ControlState => core.status.query_control_state().await,
                    QueryKind::ProcessState => core.status.query_process_state().await,
                    QueryKind::ActiveProgram => core.status.query_active_program().await,
                };
                let _ = reply.send(result);
            }
            WorkItem::Recipe {
                step,
                program_id,
                reply,
            } => {
                let _ = reply.send(core.recipe(step, &program_id).await);
            }
            WorkItem::SetOnline { online, reply } => {
                let _ = reply.send(core.set_online(online).await);
            }
            WorkItem::Barrier(done) => {
                let _ = done.send(());
            }
            WorkItem::Shutdown => break,
        }
    }

    debug!(%equipment, "session worker stopped");
}

impl SessionCore {
    async fn handshake(&self, epoch: u64) {
        if !self.tracker.is_current(epoch) {
            debug!(equipment = %self.tracker.name(), epoch, "stale handshake dropped");
            return;
        }

        let result = self.subscriptions.run().await;
        let subscribed = result.is_ok();
        *self.last_handshake.write() = Some(result);

        if subscribed && self.tracker.is_current(epoch) {
            // failures are logged by the queries themselves
            let _ = self.status.query_control_state().await;
            let _ = self.status.query_process_state().await;
            let _ = self.status.query_active_program().await;
        }
    }

    async fn validate(&self, epoch: u64, scan: LotScanReport) {
        let equipment = self.tracker.name();
        if !self.tracker.is_current(epoch) {
            warn!(%equipment, lot = %scan.lot_id, "lot scan from a previous connection dropped");
            return;
        }

        let correlation_id = Uuid::new_v4();
        let current_program = self.tracker.snapshot().active_program().map(str::to_string);
        let outcome = self.pipeline.decide(&scan, current_program.as_deref()).await;

        if !self.tracker.is_current(epoch) {
            warn!(
                %equipment,
                %correlation_id,
                lot = %outcome.request.lot_id,
                "connection changed during validation, decision not delivered"
            );
            return;
        }

        if let Some(program) = &outcome.selected_program {
            let _ = self.tracker.set_active_program(program).await;
        }
        let _ = self.pipeline.issue(&outcome.request.lot_id, &outcome.decision).await;
        self.tracker
            .publisher()
            .lot_decision(correlation_id, &outcome.request.lot_id, &outcome.decision)
            .await;
    }

    async fn recipe(&self, step: RecipeStep, program_id: &str) -> Result<(), RecipeError> {
        if !self.tracker.is_communicating() {
            return Err(RecipeError::NotOnline(self.tracker.name()));
        }
        match step {
            RecipeStep::Send => self.recipes.send(program_id).await,
            RecipeStep::Select => {
                self.recipes.select(program_id).await?;
                let _ = self.tracker.set_active_program(program_id.trim()).await;
                Ok(())
            }
            RecipeStep::Delete => self.recipes.delete(program_id).await,
            RecipeStep::Pull => self.recipes.pull(program_id).await,
        }
    }

    async fn set_online(&self, online: bool) -> Result<(), SessionError> {
        self.tracker.require_online()?;
        let equipment = self.tracker.name();

        let result = if online {
            let ack = OnlineAck::from_code(self.transactor.request_code(S1F17, None).await?);
            match ack {
                OnlineAck::Accepted | OnlineAck::AlreadyOnline => Ok(()),
                other => Err(SessionError::Rejected {
                    operation: "go online",
                    code: other.code(),
                    reason: other.description(),
                }),
            }
        } else {
            let ack = OfflineAck::from_code(self.transactor.request_code(S1F15, None).await?);
            if ack.is_ok() {
                Ok(())
            } else {
                Err(SessionError::Rejected {
                    operation: "go offline",
                    code: ack.code(),
                    reason: ack.description(),
                })
            }
        };

        match &result {
            Ok(()) => {
                info!(%equipment, online, "control state change accepted");
                let _ = self.status.query_control_state().await;
            }
            Err(e) => warn!(%equipment, online, error = %e, "control state change refused"),
        }
        result
    }
}
