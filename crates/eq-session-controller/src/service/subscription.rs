//! Subscription Manager
//!
//! Rebuilds the tool's report/event subscriptions after every connect:
//!
//! 1. S2F37 CEED=false for all events, then S2F33 with no reports
//! 2. S2F37 CEED=true for all events
//! 3. per table entry: S2F33 define → S2F35 link → S2F37 enable
//!
//! Steps run strictly in order. The first non-zero acknowledgement or
//! transaction failure stops the run and is returned.

use shared_types::{SecsItem, StreamFunction};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, error, info};

use super::transaction::Transactor;
use crate::domain::acks::{DefineReportAck, EnableEventAck, LinkReportAck};
use crate::domain::errors::{HandshakeStep, StepFailure, SubscriptionError};
use crate::domain::model::{EquipmentModel, SubscriptionEntry};

const S2F33: StreamFunction = StreamFunction::new(2, 33);
const S2F35: StreamFunction = StreamFunction::new(2, 35);
const S2F37: StreamFunction = StreamFunction::new(2, 37);

pub struct SubscriptionManager {
    equipment: String,
    model: &'static EquipmentModel,
    transactor: Transactor,
    data_id: AtomicU32,
}

impl SubscriptionManager {
    pub fn new(equipment: impl Into<String>, model: &'static EquipmentModel, transactor: Transactor) -> Self {
        Self {
            equipment: equipment.into(),
            model,
            transactor,
            data_id: AtomicU32::new(1),
        }
    }

    /// Run the whole handshake. Returns the number of entries subscribed.
    pub async fn run(&self) -> Result<usize, SubscriptionError> {
        info!(equipment = %self.equipment, model = %self.model.kind, "subscription handshake started");

        self.guard(HandshakeStep::DisableEvents, None, self.enable_events(false, &[]))
            .await?;
        self.guard(HandshakeStep::ClearReports, None, self.define_reports(&[]))
            .await?;
        self.guard(HandshakeStep::EnableAllEvents, None, self.enable_events(true, &[]))
            .await?;

        for entry in self.model.subscriptions {
            self.subscribe(entry).await?;
        }

        info!(
            equipment = %self.equipment,
            entries = self.model.subscriptions.len(),
            "subscription handshake complete"
        );
        Ok(self.model.subscriptions.len())
    }

    async fn subscribe(&self, entry: &SubscriptionEntry) -> Result<(), SubscriptionError> {
        debug!(equipment = %self.equipment, ceid = entry.ceid, rptid = entry.report_id, "subscribing");
        self.guard(
            HandshakeStep::DefineReport,
            Some(entry),
            self.define_reports(&[(entry.report_id, entry.vids)]),
        )
        .await?;
        self.guard(
            HandshakeStep::LinkReport,
            Some(entry),
            self.link_report(entry.ceid, entry.report_id),
        )
        .await?;
        self.guard(
            HandshakeStep::EnableEvent,
            Some(entry),
            self.enable_events(true, &[entry.ceid]),
        )
        .await
    }

    /// Await one step and attach context to its failure.
    async fn guard(
        &self,
        step: HandshakeStep,
        entry: Option<&SubscriptionEntry>,
        fut: impl std::future::Future<Output = Result<(), StepFailure>>,
    ) -> Result<(), SubscriptionError> {
        fut.await.map_err(|failure| {
            let err = SubscriptionError {
                step,
                ceid: entry.map(|e| e.ceid),
                report_id: entry.map(|e| e.report_id),
                failure,
            };
            error!(
                equipment = %self.equipment,
                step = %step,
                code = ?err.failure.code(),
                ceid = ?err.ceid,
                rptid = ?err.report_id,
                error = %err.failure,
                "subscription step failed"
            );
            err
        })
    }

    fn next_data_id(&self) -> SecsItem {
        SecsItem::U4(self.data_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn define_reports(&self, reports: &[(u32, &[u32])]) -> Result<(), StepFailure> {
        let body = SecsItem::list(vec![
            self.next_data_id(),
            SecsItem::list(
                reports
                    .iter()
                    .map(|(rptid, vids)| {
                        SecsItem::list(vec![
                            SecsItem::U4(*rptid),
                            SecsItem::list(vids.iter().map(|v| SecsItem::U4(*v)).collect()),
                        ])
                    })
                    .collect(),
            ),
        ]);
        let ack = DefineReportAck::from_code(self.transactor.request_code(S2F33, Some(body)).await?);
        check(ack.is_ok(), ack.code(), ack.description())
    }

    async fn link_report(&self, ceid: u32, report_id: u32) -> Result<(), StepFailure> {
        let body = SecsItem::list(vec![
            self.next_data_id(),
            SecsItem::list(vec![SecsItem::list(vec![
                SecsItem::U4(ceid),
                SecsItem::list(vec![SecsItem::U4(report_id)]),
            ])]),
        ]);
        let ack = LinkReportAck::from_code(self.transactor.request_code(S2F35, Some(body)).await?);
        check(ack.is_ok(), ack.code(), ack.description())
    }

    async fn enable_events(&self, enable: bool, ceids: &[u32]) -> Result<(), StepFailure> {
        let body = SecsItem::list(vec![
            SecsItem::Boolean(enable),
            SecsItem::list(ceids.iter().map(|c| SecsItem::U4(*c)).collect()),
        ]);
        let ack = EnableEventAck::from_code(self.transactor.request_code(S2F37, Some(body)).await?);
        check(ack.is_ok(), ack.code(), ack.description())
    }
}

fn check(ok: bool, code: u8, reason: &'static str) -> Result<(), StepFailure> {
    if ok {
        Ok(())
    } else {
        Err(StepFailure::Ack { code, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ModelKind, ModelRegistry};
    use crate::testing::SimulatedEquipment;
    use std::sync::Arc;
    use std::time::Duration;

    fn manager(tool: Arc<SimulatedEquipment>, kind: ModelKind) -> SubscriptionManager {
        SubscriptionManager::new(
            "DB01",
            ModelRegistry::standard().get(kind),
            Transactor::new(tool, Duration::from_millis(200)),
        )
    }

    #[tokio::test]
    async fn test_full_handshake_links_every_entry() {
        let tool = Arc::new(SimulatedEquipment::new(ModelKind::DieBonder));
        let count = manager(tool.clone(), ModelKind::DieBonder).run().await.unwrap();

        assert_eq!(count, 4);
        assert_eq!(tool.linked_reports(100), vec![100]);
        assert_eq!(tool.linked_reports(20), vec![120]);
        assert!(tool.is_event_enabled(101));
    }

    #[tokio::test]
    async fn test_define_failure_skips_link_and_enable() {
        let tool = Arc::new(SimulatedEquipment::new(ModelKind::WireBonder));
        // first S2F33 clears reports, second defines RPTID 30
        tool.force_ack_sequence(S2F33, vec![0, 3]);

        let err = manager(tool.clone(), ModelKind::WireBonder).run().await.unwrap_err();

        assert_eq!(err.step, HandshakeStep::DefineReport);
        assert_eq!(err.ceid, Some(300));
        assert_eq!(err.report_id, Some(30));
        assert_eq!(err.failure.code(), Some(3));
        assert_eq!(tool.count(S2F35), 0);
        // disable-all and enable-all only
        assert_eq!(tool.count(S2F37), 2);
    }

    #[tokio::test]
    async fn test_timeout_stops_handshake() {
        let tool = Arc::new(SimulatedEquipment::new(ModelKind::DieBonder));
        tool.set_silent(true);

        let err = manager(tool.clone(), ModelKind::DieBonder).run().await.unwrap_err();

        assert_eq!(err.step, HandshakeStep::DisableEvents);
        assert!(matches!(err.failure, StepFailure::Transaction(_)));
        assert_eq!(err.failure.code(), None);
    }
}
