//! Recipe Sync
//!
//! Moves process programs between the local store and the tool:
//! S7F3 send, S2F41 select, S7F17 delete, S7F5 pull.

use shared_types::{SecsItem, StreamFunction};
use std::sync::Arc;
use tracing::{info, warn};

use super::transaction::Transactor;
use crate::domain::acks::ProgramAck;
use crate::domain::errors::{RecipeError, RecipeStep, TransactionError};
use crate::domain::model::EquipmentModel;
use crate::ports::outbound::{RecipeKey, RecipeSlot, RecipeStore};

const S7F3: StreamFunction = StreamFunction::new(7, 3);
const S7F5: StreamFunction = StreamFunction::new(7, 5);
const S7F17: StreamFunction = StreamFunction::new(7, 17);

#[derive(Clone)]
pub struct RecipeSync {
    equipment: String,
    model: &'static EquipmentModel,
    transactor: Transactor,
    store: Arc<dyn RecipeStore>,
}

impl RecipeSync {
    pub fn new(
        equipment: impl Into<String>,
        model: &'static EquipmentModel,
        transactor: Transactor,
        store: Arc<dyn RecipeStore>,
    ) -> Self {
        Self {
            equipment: equipment.into(),
            model,
            transactor,
            store,
        }
    }

    /// Push the local `current` copy of `program_id` to the tool.
    pub async fn send(&self, program_id: &str) -> Result<(), RecipeError> {
        let key = self.key(program_id)?;
        let body = self
            .store
            .read(&key, RecipeSlot::Current)
            .await?
            .ok_or_else(|| RecipeError::NotFound(key.program_id.clone()))?;

        let request = SecsItem::list(vec![SecsItem::ascii(&key.program_id), SecsItem::Binary(body)]);
        let code = self
            .transactor
            .request_code(S7F3, Some(request))
            .await
            .map_err(|e| self.failed(RecipeStep::Send, e))?;
        self.program_ack(RecipeStep::Send, &key.program_id, code)
    }

    /// Make `program_id` the selected program.
    pub async fn select(&self, program_id: &str) -> Result<(), RecipeError> {
        let key = self.key(program_id)?;
        let commands = &self.model.commands;
        let ack = self
            .transactor
            .host_command(commands.select, &[(commands.program_param, key.program_id.as_str())])
            .await
            .map_err(|e| self.failed(RecipeStep::Select, e))?;

        if ack.is_accepted() {
            info!(equipment = %self.equipment, program = %key.program_id, code = ack.code(), "program selected");
            Ok(())
        } else {
            warn!(
                equipment = %self.equipment,
                step = %RecipeStep::Select,
                program = %key.program_id,
                code = ack.code(),
                reason = ack.description(),
                "recipe step rejected"
            );
            Err(RecipeError::SelectRejected(ack))
        }
    }

    /// Delete `program_id` on the tool.
    pub async fn delete(&self, program_id: &str) -> Result<(), RecipeError> {
        let key = self.key(program_id)?;
        let request = SecsItem::list(vec![SecsItem::ascii(&key.program_id)]);
        let code = self
            .transactor
            .request_code(S7F17, Some(request))
            .await
            .map_err(|e| self.failed(RecipeStep::Delete, e))?;
        self.program_ack(RecipeStep::Delete, &key.program_id, code)
    }

    /// Fetch `program_id` from the tool into the `upload` slot.
    pub async fn pull(&self, program_id: &str) -> Result<(), RecipeError> {
        let key = self.key(program_id)?;
        let reply = self
            .transactor
            .request(S7F5, Some(SecsItem::ascii(&key.program_id)))
            .await
            .map_err(|e| self.failed(RecipeStep::Pull, e))?;

        // S7F6 is L,2 {PPID, PPBODY}; L,0 means the tool refused
        let body = match reply.as_list() {
            Some([ppid, body]) => {
                let ppid = ppid.as_ascii().map(str::trim).unwrap_or_default();
                if ppid.is_empty() {
                    return Err(RecipeError::InvalidProgramId(ppid.to_string()));
                }
                body.as_bytes().map(<[u8]>::to_vec).unwrap_or_default()
            }
            Some([]) => Vec::new(),
            _ => {
                return Err(self.failed(
                    RecipeStep::Pull,
                    TransactionError::malformed(S7F5.reply(), format!("expected L,2 {{PPID, PPBODY}}, got {reply}")),
                ))
            }
        };
        if body.is_empty() {
            return Err(RecipeError::EmptyBody(key.program_id));
        }

        self.store.write(&key, RecipeSlot::Upload, &body).await?;
        info!(equipment = %self.equipment, program = %key.program_id, bytes = body.len(), "program pulled");
        Ok(())
    }

    /// Send and select `target`, then delete `previous` if it differs.
    pub async fn replace(&self, target: &str, previous: Option<&str>) -> Result<(), RecipeError> {
        self.send(target).await?;
        self.select(target).await?;
        match previous.map(str::trim).filter(|p| !p.is_empty() && *p != target) {
            Some(previous) => self.delete(previous).await,
            None => Ok(()),
        }
    }

    fn key(&self, program_id: &str) -> Result<RecipeKey, RecipeError> {
        let program_id = program_id.trim();
        if program_id.is_empty() {
            return Err(RecipeError::InvalidProgramId(program_id.to_string()));
        }
        Ok(RecipeKey::new(self.model.kind, &self.equipment, program_id))
    }

    fn program_ack(&self, step: RecipeStep, program_id: &str, code: u8) -> Result<(), RecipeError> {
        let ack = ProgramAck::from_code(code);
        if ack.is_ok() {
            info!(equipment = %self.equipment, step = %step, program = %program_id, "recipe step done");
            return Ok(());
        }
        warn!(
            equipment = %self.equipment,
            step = %step,
            program = %program_id,
            code,
            reason = ack.description(),
            "recipe step rejected"
        );
        Err(RecipeError::Rejected { step, ack })
    }

    fn failed(&self, step: RecipeStep, source: TransactionError) -> RecipeError {
        warn!(equipment = %self.equipment, step = %step, error = %source, "recipe step failed");
        RecipeError::Transaction { step, source }
    }
}
