//! # Session Flows
//!
//! Connection lifecycle against the simulated tool:
//!
//! 1. **Handshake**: clear, enable all, then define → link → enable per entry
//! 2. **Baseline**: control/process/program queried after the handshake
//! 3. **Disconnect**: state fields cleared, active lot kept
//! 4. **CEID state events**: control and process state from bare events

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use eq_session_controller::domain::errors::HandshakeStep;
    use eq_session_controller::domain::ReportRole;
    use eq_session_controller::{wait_until, EquipmentControlApi, SessionError};
    use shared_types::{ConnectionState, SecsItem, StreamFunction};

    use crate::integration::fixtures::{rules, session, ALL_CHECKS, EQUIPMENT};

    const S1F3: StreamFunction = StreamFunction::new(1, 3);
    const S2F33: StreamFunction = StreamFunction::new(2, 33);
    const S2F35: StreamFunction = StreamFunction::new(2, 35);
    const S2F37: StreamFunction = StreamFunction::new(2, 37);

    fn topic(field: &str) -> String {
        format!("equipments/status/{field}/{EQUIPMENT}")
    }

    // =========================================================================
    // HANDSHAKE
    // =========================================================================

    /// Communicating → every subscription entry acknowledged → control state
    /// query returns a mapped name.
    #[tokio::test]
    async fn test_handshake_completes_and_control_state_is_mapped() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        s.tool.set_program("WB-1");
        s.online().await;

        let entries = s.tool.model().subscriptions;
        assert_eq!(s.controller.last_handshake(), Some(Ok(entries.len())));
        assert_eq!(s.tool.count(S2F33), 1 + entries.len());
        assert_eq!(s.tool.count(S2F35), entries.len());
        assert_eq!(s.tool.count(S2F37), 2 + entries.len());
        for entry in entries {
            assert_eq!(s.tool.linked_reports(entry.ceid), vec![entry.report_id]);
            assert!(s.tool.is_event_enabled(entry.ceid));
        }

        let snapshot = s.controller.snapshot();
        assert_eq!(snapshot.connection_state(), ConnectionState::Communicating);
        assert_eq!(snapshot.control_state(), Some("On-Line/Remote"));
        assert_eq!(snapshot.process_state(), Some("Idle"));
        assert_eq!(snapshot.active_program(), Some("WB-1"));

        s.tool.set_control_code(4);
        assert_eq!(s.controller.query_control_state().await.unwrap(), "On-Line/Local");
        s.tool.set_control_code(9);
        assert_eq!(s.controller.query_control_state().await.unwrap(), "Unknown State (9)");
        assert_eq!(s.bus.retained(&topic("control_state")).as_deref(), Some("Unknown State (9)"));
    }

    #[tokio::test]
    async fn test_define_failure_stops_link_and_enable() {
        let s = session("[]");
        // clear-all succeeds, the first per-entry define is a duplicate
        s.tool.force_ack_sequence(S2F33, vec![0, 3]);
        s.online().await;

        let failure = match s.controller.last_handshake() {
            Some(Err(e)) => e,
            other => panic!("expected handshake failure, got {other:?}"),
        };
        let first = s.tool.model().subscriptions[0];
        assert_eq!(failure.step, HandshakeStep::DefineReport);
        assert_eq!(failure.report_id, Some(first.report_id));

        assert_eq!(s.tool.count(S2F35), 0);
        // disable-all and enable-all only
        assert_eq!(s.tool.count(S2F37), 2);
        // no baseline after a failed handshake
        assert_eq!(s.tool.count(S1F3), 0);
        assert_eq!(s.controller.snapshot().control_state(), None);
    }

    #[tokio::test]
    async fn test_reconnect_rebuilds_subscriptions() {
        let s = session("[]");
        s.online().await;
        let entries = s.tool.model().subscriptions.len();

        s.tool.drop_link(ConnectionState::NotCommunicating).await;
        s.online().await;

        assert_eq!(s.tool.count(S2F33), 2 * (1 + entries));
        assert_eq!(s.controller.last_handshake(), Some(Ok(entries)));
    }

    // =========================================================================
    // DISCONNECT
    // =========================================================================

    #[tokio::test]
    async fn test_disconnect_clears_state_but_keeps_active_lot() {
        let s = session("[]");
        s.tool.set_program("WB-1");
        s.online().await;
        s.report(ReportRole::LotOpen, vec![SecsItem::ascii("LOT7")]).await;
        assert_eq!(s.controller.snapshot().active_lot(), Some("LOT7"));

        s.tool.drop_link(ConnectionState::NotCommunicating).await;

        let snapshot = s.controller.snapshot();
        assert!(snapshot.invariant_holds());
        assert_eq!(snapshot.connection_state(), ConnectionState::NotCommunicating);
        assert_eq!(snapshot.control_state(), None);
        assert_eq!(snapshot.process_state(), None);
        assert_eq!(snapshot.active_program(), None);
        assert_eq!(snapshot.active_lot(), Some("LOT7"));
        assert_eq!(s.bus.retained(&topic("control_state")).as_deref(), Some("Unknown"));
        assert_eq!(s.bus.retained(&topic("active_lot")).as_deref(), Some("LOT7"));

        assert!(matches!(
            s.controller.query_control_state().await,
            Err(SessionError::NotOnline { .. })
        ));

        s.online().await;
        let snapshot = s.controller.snapshot();
        assert_eq!(snapshot.control_state(), Some("On-Line/Remote"));
        assert_eq!(snapshot.active_lot(), Some("LOT7"));

        s.report(ReportRole::LotClose, vec![SecsItem::ascii("LOT7")]).await;
        assert_eq!(s.controller.snapshot().active_lot(), None);
    }

    #[tokio::test]
    async fn test_wait_selected_is_not_communicating() {
        let s = session("[]");
        s.online().await;

        s.tool.drop_link(ConnectionState::WaitSelected).await;

        let snapshot = s.controller.snapshot();
        assert_eq!(snapshot.connection_state(), ConnectionState::WaitSelected);
        assert!(!snapshot.is_communicating());
        assert_eq!(snapshot.control_state(), None);
        assert!(snapshot.invariant_holds());
    }

    // =========================================================================
    // STATE EVENTS
    // =========================================================================

    #[tokio::test]
    async fn test_state_ceids_update_tracker() {
        let s = session("[]");
        s.online().await;

        // wire bonder: 201 equipment off-line, 211 run
        s.tool.emit_event(201, vec![]).await;
        s.tool.emit_event(211, vec![]).await;

        let controller = s.controller.clone();
        assert!(
            wait_until(Duration::from_secs(1), || {
                controller.snapshot().process_state() == Some("Run")
            })
            .await
        );
        assert_eq!(
            s.controller.snapshot().control_state(),
            Some("Off-Line/Equipment Off-Line")
        );
        assert_eq!(s.bus.retained(&topic("process_state")).as_deref(), Some("Run"));
        assert_eq!(s.tool.responses_for(StreamFunction::new(6, 12)), 2);
    }

    #[tokio::test]
    async fn test_go_offline_requeries_control_state() {
        let s = session("[]");
        s.online().await;

        s.controller.go_offline().await.unwrap();
        assert_eq!(
            s.controller.snapshot().control_state(),
            Some("Off-Line/Host Off-Line")
        );

        s.controller.go_online().await.unwrap();
        assert_eq!(s.controller.snapshot().control_state(), Some("On-Line/Remote"));
    }
}
