//! # Lot Flows
//!
//! Lot-scan events through validation, recipe sync and the accept/reject
//! host command:
//!
//! ```text
//! S6F11 lot scan ─→ lookup ─→ selection key ─→ rule ─→ [recipe sync] ─→ predicates
//!                                                                          │
//!                                                     S2F41 ACCEPT / REJECT ┘
//! ```

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use eq_session_controller::domain::ReportRole;
    use eq_session_controller::ports::{RecipeKey, RecipeSlot};
    use eq_session_controller::{wait_until, EquipmentControlApi, ModelKind, RecipeStore};
    use shared_bus::{EquipmentEvent, EventFilter, EventTopic};
    use shared_types::{ConnectionState, SecsItem, StreamFunction};

    use crate::integration::fixtures::{lot, rules, session, ALL_CHECKS, EQUIPMENT};

    const S2F41: StreamFunction = StreamFunction::new(2, 41);
    const S7F3: StreamFunction = StreamFunction::new(7, 3);
    const S7F17: StreamFunction = StreamFunction::new(7, 17);

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    // =========================================================================
    // SELECTION KEY
    // =========================================================================

    /// Mask `1001` keeps chars [0:8] and char [14].
    #[tokio::test]
    async fn test_masked_package_code_matches_rule() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        s.lots.insert(lot("LOT1", "RUN"));
        s.online().await;

        s.scan("lot1", "WB-1").await;

        assert_eq!(
            s.last_command(),
            ("ACCEPT".to_string(), params(&[("LOT_ID", "LOT1")]))
        );
    }

    #[tokio::test]
    async fn test_key_mismatch_rejects_without_rule() {
        let s = session(&rules("SOIC-08P", "WB-1", ALL_CHECKS));
        s.lots.insert(lot("LOT1", "RUN"));
        s.online().await;

        s.scan("LOT1", "WB-1").await;

        assert_eq!(s.last_command().0, "REJECT");
        assert_eq!(s.last_reason().as_deref(), Some("no validation rule for package"));
    }

    #[tokio::test]
    async fn test_lookup_failure_never_accepts() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        s.online().await;

        for id in ["LOT404", "lot-x"] {
            s.scan(id, "WB-1").await;
            assert_eq!(s.last_command().0, "REJECT");
            assert_eq!(s.last_reason().as_deref(), Some("lot lookup failed"));
        }
        assert!(s.tool.host_commands().iter().all(|(rcmd, _)| rcmd != "ACCEPT"));
    }

    // =========================================================================
    // PREDICATES
    // =========================================================================

    /// Hold wins even when on-operation and recipe would both fail.
    #[tokio::test]
    async fn test_hold_short_circuits_other_predicates() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        let mut held = lot("LOT1", "HOLD");
        held.on_operation = "DA".into();
        held.operation_code = "DA100".into();
        s.lots.insert(held);
        s.online().await;

        s.scan("LOT1", "WB-9").await;

        assert_eq!(
            s.last_command(),
            (
                "REJECT".to_string(),
                params(&[("LOT_ID", "LOT1"), ("REASON", "lot is on hold")])
            )
        );
    }

    #[tokio::test]
    async fn test_predicate_order_after_hold() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        let mut moved = lot("LOT1", "RUN");
        moved.on_operation = "DA".into();
        moved.operation_code = "DA100".into();
        s.lots.insert(moved);
        let mut wrong_code = lot("LOT2", "RUN");
        wrong_code.operation_code = "DA100".into();
        s.lots.insert(wrong_code);
        s.lots.insert(lot("LOT3", "RUN"));
        s.online().await;

        s.scan("LOT1", "WB-9").await;
        assert_eq!(s.last_reason().as_deref(), Some("on-operation mismatch"));
        s.scan("LOT2", "WB-9").await;
        assert_eq!(s.last_reason().as_deref(), Some("operation code mismatch"));
        s.scan("LOT3", "WB-9").await;
        assert_eq!(s.last_reason().as_deref(), Some("recipe mismatch"));
    }

    #[tokio::test]
    async fn test_disabled_predicates_accept() {
        let s = session(&rules("SOIC-08UP", "WB-1", "{}"));
        let mut held = lot("LOT1", "HELD");
        held.on_operation = "DA".into();
        s.lots.insert(held);
        s.online().await;

        s.scan("LOT1", "WB-1").await;

        assert_eq!(s.last_command().0, "ACCEPT");
    }

    // =========================================================================
    // PROGRAM REQUEST
    // =========================================================================

    async fn store_recipe(s: &crate::integration::fixtures::Session, program: &str) {
        s.store
            .write(
                &RecipeKey::new(ModelKind::WireBonder, EQUIPMENT, program),
                RecipeSlot::Current,
                b"PPBODY",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_program_request_pushes_selects_and_retires() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        s.lots.insert(lot("LOT1", "RUN"));
        store_recipe(&s, "WB-1").await;
        s.tool.add_program("WB-OLD", b"OLD");
        s.tool.set_program("WB-OLD");
        s.online().await;

        s.scan("lot1,pr", "WB-OLD").await;

        let commands: Vec<String> = s.tool.host_commands().into_iter().map(|(rcmd, _)| rcmd).collect();
        assert_eq!(commands, vec!["PP_SELECT".to_string(), "ACCEPT".to_string()]);
        assert!(s.tool.has_program("WB-1"));
        assert!(!s.tool.has_program("WB-OLD"));
        assert_eq!(s.tool.selected_program(), "WB-1");
        assert_eq!(s.controller.snapshot().active_program(), Some("WB-1"));
    }

    /// PP send answered with ACKC7 4 (PPID not found).
    #[tokio::test]
    async fn test_send_failure_rejects_and_skips_select_and_delete() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        s.lots.insert(lot("LOT1", "RUN"));
        store_recipe(&s, "WB-1").await;
        s.tool.add_program("WB-OLD", b"OLD");
        s.tool.set_program("WB-OLD");
        s.tool.force_ack(S7F3, 4);
        s.online().await;

        s.scan("LOT1,PR", "WB-OLD").await;

        assert_eq!(s.tool.count(S7F3), 1);
        assert_eq!(s.tool.count(S2F41), 1);
        assert_eq!(s.tool.count(S7F17), 0);
        assert_eq!(s.last_command().0, "REJECT");
        assert_eq!(s.last_reason().as_deref(), Some("recipe send failed"));
        assert_eq!(s.tool.selected_program(), "WB-OLD");
    }

    #[tokio::test]
    async fn test_missing_local_recipe_rejects_without_sending() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        s.lots.insert(lot("LOT1", "RUN"));
        s.tool.set_program("WB-OLD");
        s.online().await;

        s.scan("LOT1,PR", "WB-OLD").await;

        assert_eq!(s.tool.count(S7F3), 0);
        assert_eq!(s.last_reason().as_deref(), Some("recipe send failed"));
    }

    // =========================================================================
    // PUBLICATION
    // =========================================================================

    #[tokio::test]
    async fn test_every_decision_is_published() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        s.lots.insert(lot("LOT1", "RUN"));
        let mut decisions = s.bus.subscribe(EventFilter::topics(vec![EventTopic::LotValidation]));
        s.online().await;

        s.scan("LOT1", "WB-1").await;
        s.scan("LOT2", "WB-1").await;

        let seen: Vec<_> = decisions
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                EquipmentEvent::LotValidated { lot_id, accepted, reason, .. } => Some((lot_id, accepted, reason)),
                _ => None,
            })
            .collect();
        assert_eq!(
            seen,
            vec![
                ("LOT1".to_string(), true, None),
                ("LOT2".to_string(), false, Some("lot lookup failed".to_string())),
            ]
        );
        assert!(s.bus.retained(&format!("equipments/lot_validation/{EQUIPMENT}")).is_none());
    }

    // =========================================================================
    // CONNECTION LOSS
    // =========================================================================

    /// The link drops while the old program is being deleted; the decision
    /// belongs to a dead connection and is neither sent nor published.
    #[tokio::test]
    async fn test_decision_dropped_when_link_lost_during_validation() {
        let s = session(&rules("SOIC-08UP", "WB-1", ALL_CHECKS));
        s.lots.insert(lot("LOT1", "RUN"));
        store_recipe(&s, "WB-1").await;
        s.tool.add_program("WB-OLD", b"OLD");
        s.tool.set_program("WB-OLD");
        let mut decisions = s.bus.subscribe(EventFilter::topics(vec![EventTopic::LotValidation]));
        s.online().await;

        s.tool.hold(S7F17);
        let entry = s.entry(ReportRole::LotScan);
        s.tool
            .emit_event(
                entry.ceid,
                vec![(entry.report_id, vec![SecsItem::ascii("LOT1,PR"), SecsItem::ascii("WB-OLD")])],
            )
            .await;
        let tool = s.tool.clone();
        assert!(wait_until(Duration::from_secs(2), || tool.count(S7F17) == 1).await);

        s.tool.drop_link(ConnectionState::NotCommunicating).await;
        s.tool.release(S7F17);
        s.controller.flush().await.unwrap();

        let commands: Vec<String> = s.tool.host_commands().into_iter().map(|(rcmd, _)| rcmd).collect();
        assert_eq!(commands, vec!["PP_SELECT".to_string()]);
        assert!(decisions.drain().is_empty());
        assert_eq!(s.controller.snapshot().active_program(), None);
        assert!(!s.controller.snapshot().is_communicating());
    }
}
