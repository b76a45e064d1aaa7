//! Status query helpers (S1F3 / S1F4).
//!
//! All three queries fail closed when the link is not COMMUNICATING and
//! never map a missing or malformed answer onto a state value.

use shared_types::{SecsItem, StreamFunction};
use std::sync::Arc;
use tracing::{debug, warn};

use super::tracker::StateTracker;
use super::transaction::Transactor;
use crate::domain::errors::{SessionError, TransactionError};
use crate::domain::model::EquipmentModel;

const S1F3: StreamFunction = StreamFunction::new(1, 3);

#[derive(Clone)]
pub struct StatusQueries {
    tracker: Arc<StateTracker>,
    model: &'static EquipmentModel,
    transactor: Transactor,
}

impl StatusQueries {
    pub fn new(tracker: Arc<StateTracker>, model: &'static EquipmentModel, transactor: Transactor) -> Self {
        Self {
            tracker,
            model,
            transactor,
        }
    }

    /// Query the control state code and store its mapped name.
    pub async fn query_control_state(&self) -> Result<String, SessionError> {
        let result = async {
            let code = self.numeric_status(self.model.control_state_vid).await?;
            let name = self.model.control_state_name(code);
            self.tracker.set_control_state(&name).await?;
            Ok::<_, SessionError>(name)
        }
        .await;
        self.log_outcome("control_state", &result);
        result
    }

    /// Query the process state code and store its mapped name.
    pub async fn query_process_state(&self) -> Result<String, SessionError> {
        let result = async {
            let code = self.numeric_status(self.model.process_state_vid).await?;
            let name = self.model.process_state_name(code);
            self.tracker.set_process_state(&name).await?;
            Ok::<_, SessionError>(name)
        }
        .await;
        self.log_outcome("process_state", &result);
        result
    }

    /// Query and store the selected program name.
    pub async fn query_active_program(&self) -> Result<String, SessionError> {
        let result = async {
            let value = self.status_value(self.model.program_vid).await?;
            let program = value
                .to_text()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| TransactionError::malformed(S1F3.reply(), format!("program is not text: {value}")))?;
            self.tracker.set_active_program(&program).await?;
            Ok::<_, SessionError>(program)
        }
        .await;
        self.log_outcome("active_program", &result);
        result
    }

    async fn numeric_status(&self, vid: u32) -> Result<u64, SessionError> {
        let value = self.status_value(vid).await?;
        value
            .as_u64()
            .ok_or_else(|| TransactionError::malformed(S1F3.reply(), format!("SV {vid} is not numeric: {value}")).into())
    }

    /// One S1F3 round trip for a single SVID.
    async fn status_value(&self, vid: u32) -> Result<SecsItem, SessionError> {
        self.tracker.require_online()?;
        let reply = self
            .transactor
            .request(S1F3, Some(SecsItem::list(vec![SecsItem::U4(vid)])))
            .await?;
        let values = reply
            .expect_list(1)
            .map_err(|e| TransactionError::malformed(S1F3.reply(), e))?;
        // An empty list in the SV slot is the tool's "unknown SVID".
        if values[0].as_list().is_some_and(|items| items.is_empty()) {
            return Err(TransactionError::malformed(S1F3.reply(), format!("SVID {vid} unknown to equipment")).into());
        }
        Ok(values[0].clone())
    }

    fn log_outcome(&self, query: &'static str, result: &Result<String, SessionError>) {
        match result {
            Ok(value) => debug!(equipment = %self.tracker.publisher().equipment(), query, %value, "status query"),
            Err(e) => warn!(equipment = %self.tracker.publisher().equipment(), query, error = %e, "status query failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::publisher::StatusPublisher;
    use crate::domain::model::{ModelKind, ModelRegistry};
    use crate::domain::session::EquipmentSession;
    use crate::testing::SimulatedEquipment;
    use shared_bus::InMemoryEventBus;
    use shared_types::EquipmentIdentity;
    use std::time::Duration;

    fn setup(kind: ModelKind) -> (Arc<SimulatedEquipment>, Arc<StateTracker>, StatusQueries) {
        let tool = Arc::new(SimulatedEquipment::new(kind));
        let bus = Arc::new(InMemoryEventBus::new());
        let session = EquipmentSession::new(
            EquipmentIdentity::new("EQ1", kind.as_str(), "127.0.0.1", 5000, 1),
            kind,
        );
        let tracker = Arc::new(StateTracker::new(session, StatusPublisher::new("EQ1", bus)));
        let queries = StatusQueries::new(
            tracker.clone(),
            ModelRegistry::standard().get(kind),
            Transactor::new(tool.clone(), Duration::from_millis(100)),
        );
        (tool, tracker, queries)
    }

    #[tokio::test]
    async fn test_not_online_issues_no_request() {
        let (tool, _tracker, queries) = setup(ModelKind::DieBonder);
        assert!(matches!(
            queries.query_control_state().await,
            Err(SessionError::NotOnline { .. })
        ));
        assert_eq!(tool.count(S1F3), 0);
    }

    #[tokio::test]
    async fn test_control_state_is_mapped() {
        let (tool, tracker, queries) = setup(ModelKind::DieBonder);
        tracker.on_connection_established().await;
        tool.set_control_code(5);

        assert_eq!(queries.query_control_state().await.unwrap(), "On-Line/Remote");
        assert_eq!(tracker.snapshot().control_state(), Some("On-Line/Remote"));
    }

    #[tokio::test]
    async fn test_unmapped_process_code() {
        let (tool, tracker, queries) = setup(ModelKind::WireBonder);
        tracker.on_connection_established().await;
        tool.set_process_code(9);

        assert_eq!(queries.query_process_state().await.unwrap(), "Unknown State (9)");
    }

    #[tokio::test]
    async fn test_malformed_reply_leaves_state() {
        let (tool, tracker, queries) = setup(ModelKind::DieBonder);
        tracker.on_connection_established().await;
        tracker.set_control_state("On-Line/Local").await.unwrap();
        tool.force_reply(S1F3, SecsItem::ascii("garbage"));

        assert!(matches!(
            queries.query_control_state().await,
            Err(SessionError::Transaction(TransactionError::Malformed { .. }))
        ));
        assert_eq!(tracker.snapshot().control_state(), Some("On-Line/Local"));
    }

    #[tokio::test]
    async fn test_active_program() {
        let (tool, tracker, queries) = setup(ModelKind::DieBonder);
        tracker.on_connection_established().await;
        tool.set_program("PGM-A");

        assert_eq!(queries.query_active_program().await.unwrap(), "PGM-A");
        assert_eq!(tracker.snapshot().active_program(), Some("PGM-A"));
    }
}
