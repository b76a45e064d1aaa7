//! Lot Validation Pipeline
//!
//! Decides accept/reject for one lot-scan report:
//!
//! 1. normalise the lot id, detect a program request
//! 2. lot master lookup (failure rejects)
//! 3. rule from the package code (none rejects)
//! 4. program request: push/select/retire programs before going on
//! 5. predicates, first failure wins: hold → on-operation → operation code → recipe
//!
//! The decision is then sent to the tool as an accept or reject host command.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::recipe::RecipeSync;
use super::transaction::Transactor;
use crate::domain::acks::HostCommandAck;
use crate::domain::errors::{RecipeStep, TransactionError};
use crate::domain::lot::{LotDecision, LotInfo, LotRequest, RejectReason};
use crate::domain::model::EquipmentModel;
use crate::domain::reports::LotScanReport;
use crate::domain::rules::{RuleBook, ValidationRule};
use crate::ports::outbound::LotLookup;

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Normalised request.
    pub request: LotRequest,
    /// Accept or reject.
    pub decision: LotDecision,
    /// Program selected on the tool by recipe sync, if any.
    pub selected_program: Option<String>,
}

pub struct LotValidationPipeline {
    equipment: String,
    model: &'static EquipmentModel,
    transactor: Transactor,
    lookup: Arc<dyn LotLookup>,
    rules: Arc<RuleBook>,
    recipes: RecipeSync,
    program_request_token: String,
}

impl LotValidationPipeline {
    pub fn new(
        equipment: impl Into<String>,
        model: &'static EquipmentModel,
        transactor: Transactor,
        lookup: Arc<dyn LotLookup>,
        rules: Arc<RuleBook>,
        recipes: RecipeSync,
        program_request_token: impl Into<String>,
    ) -> Self {
        Self {
            equipment: equipment.into(),
            model,
            transactor,
            lookup,
            rules,
            recipes,
            program_request_token: program_request_token.into(),
        }
    }

    /// Decide a lot. `current_program` is the tracker's view, used when the
    /// report does not name one.
    pub async fn decide(&self, scan: &LotScanReport, current_program: Option<&str>) -> ValidationOutcome {
        let request = LotRequest::parse(&scan.lot_id, &self.program_request_token);
        let tool_program = Some(scan.program_name.trim())
            .filter(|p| !p.is_empty())
            .or(current_program)
            .map(str::to_string);

        let (decision, selected_program) = self.evaluate(&request, tool_program).await;
        match decision.reason {
            None => info!(equipment = %self.equipment, lot = %request.lot_id, "lot accepted"),
            Some(reason) => info!(equipment = %self.equipment, lot = %request.lot_id, %reason, "lot rejected"),
        }
        ValidationOutcome {
            request,
            decision,
            selected_program,
        }
    }

    async fn evaluate(&self, request: &LotRequest, tool_program: Option<String>) -> (LotDecision, Option<String>) {
        let lot = match self.lookup.lookup(&request.lot_id).await {
            Ok(lot) => lot,
            Err(e) => {
                warn!(equipment = %self.equipment, lot = %request.lot_id, error = %e, "lot lookup failed");
                return (LotDecision::reject(RejectReason::LookupFailed), None);
            }
        };

        let rule = match self.rules.resolve(&lot.package_code) {
            Ok(Some(rule)) => rule,
            Ok(None) => {
                debug!(equipment = %self.equipment, package = %lot.package_code, "no rule");
                return (LotDecision::reject(RejectReason::NoRule), None);
            }
            Err(e) => {
                warn!(equipment = %self.equipment, lot = %request.lot_id, error = %e, "bad package code");
                return (LotDecision::reject(RejectReason::InvalidPackageCode), None);
            }
        };

        let mut effective_program = tool_program;
        let mut selected_program = None;
        if request.program_request {
            let target = rule.recipe_name.as_str();
            if effective_program.as_deref() != Some(target) {
                if let Err(e) = self.recipes.replace(target, effective_program.as_deref()).await {
                    let step = e.step().unwrap_or(RecipeStep::Send);
                    warn!(
                        equipment = %self.equipment,
                        lot = %request.lot_id,
                        step = %step,
                        error = %e,
                        "recipe sync failed"
                    );
                    return (LotDecision::reject(RejectReason::RecipeSync(step)), None);
                }
                selected_program = Some(target.to_string());
            }
            effective_program = Some(target.to_string());
        }

        let decision = match check_predicates(rule, &lot, effective_program.as_deref()) {
            Some(reason) => LotDecision::reject(reason),
            None => LotDecision::accept(),
        };
        (decision, selected_program)
    }

    /// Send the accept or reject host command. An HCACK other than performed
    /// or initiated is logged, not retried.
    pub async fn issue(&self, lot_id: &str, decision: &LotDecision) -> Result<HostCommandAck, TransactionError> {
        let commands = &self.model.commands;
        let result = match decision.reason_text() {
            None => {
                self.transactor
                    .host_command(commands.accept, &[(commands.lot_param, lot_id)])
                    .await
            }
            Some(reason) => {
                self.transactor
                    .host_command(
                        commands.reject,
                        &[(commands.lot_param, lot_id), (commands.reason_param, reason)],
                    )
                    .await
            }
        };

        match &result {
            Ok(ack) if !ack.is_accepted() => warn!(
                equipment = %self.equipment,
                lot = %lot_id,
                accept = decision.accept,
                code = ack.code(),
                reason = ack.description(),
                "lot decision not acknowledged"
            ),
            Ok(_) => {}
            Err(e) => warn!(equipment = %self.equipment, lot = %lot_id, error = %e, "lot decision not delivered"),
        }
        result
    }
}

/// First failing predicate, in evaluation order.
fn check_predicates(rule: &ValidationRule, lot: &LotInfo, program: Option<&str>) -> Option<RejectReason> {
    let options = rule.options;
    if options.use_lot_hold && lot.is_on_hold() {
        return Some(RejectReason::OnHold);
    }
    if options.use_on_operation && lot.on_operation.trim() != rule.on_operation {
        return Some(RejectReason::OnOperationMismatch);
    }
    if options.use_operation_code && lot.operation_code.trim() != rule.operation_code {
        return Some(RejectReason::OperationCodeMismatch);
    }
    if rule.checks_program() && program.map(str::trim) != Some(rule.recipe_name.as_str()) {
        return Some(RejectReason::RecipeMismatch);
    }
    None
}
