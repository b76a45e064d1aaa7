//! Bounded request/response transactions over the session facade.

use shared_types::{SecsItem, StreamFunction};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::domain::acks::HostCommandAck;
use crate::domain::errors::TransactionError;
use crate::ports::outbound::SessionFacade;

const S2F41: StreamFunction = StreamFunction::new(2, 41);

/// Wraps the facade so every request carries the reply timeout and an absent
/// reply body is an error.
#[derive(Clone)]
pub struct Transactor {
    facade: Arc<dyn SessionFacade>,
    timeout: Duration,
}

impl Transactor {
    pub fn new(facade: Arc<dyn SessionFacade>, timeout: Duration) -> Self {
        Self { facade, timeout }
    }

    /// The wrapped facade.
    #[must_use]
    pub fn facade(&self) -> &Arc<dyn SessionFacade> {
        &self.facade
    }

    /// Send `sf` and return the reply body.
    pub async fn request(
        &self,
        sf: StreamFunction,
        body: Option<SecsItem>,
    ) -> Result<SecsItem, TransactionError> {
        trace!(%sf, "request");
        match tokio::time::timeout(self.timeout, self.facade.send_and_wait(sf, body)).await {
            Err(_) => Err(TransactionError::Timeout { sf }),
            Ok(Err(e)) => Err(e),
            Ok(Ok(None)) => Err(TransactionError::malformed(sf.reply(), "empty reply body")),
            Ok(Ok(Some(reply))) => Ok(reply),
        }
    }

    /// Send `sf` and read a single-byte acknowledgement from the reply.
    pub async fn request_code(
        &self,
        sf: StreamFunction,
        body: Option<SecsItem>,
    ) -> Result<u8, TransactionError> {
        let reply = self.request(sf, body).await?;
        reply
            .as_code()
            .ok_or_else(|| TransactionError::malformed(sf.reply(), format!("expected ack code, got {reply}")))
    }

    /// S2F41 remote command; returns the HCACK of the S2F42 reply.
    pub async fn host_command(
        &self,
        rcmd: &str,
        params: &[(&str, &str)],
    ) -> Result<HostCommandAck, TransactionError> {
        let body = SecsItem::list(vec![
            SecsItem::ascii(rcmd),
            SecsItem::list(
                params
                    .iter()
                    .map(|(name, value)| SecsItem::list(vec![SecsItem::ascii(*name), SecsItem::ascii(*value)]))
                    .collect(),
            ),
        ]);
        let reply = self.request(S2F41, Some(body)).await?;
        // L,2 {HCACK, L,n {CPNAME, CPACK}}; some tools answer a bare HCACK
        let code = match reply.as_list() {
            Some([hcack, ..]) => hcack.as_code(),
            Some([]) => None,
            None => reply.as_code(),
        };
        code.map(HostCommandAck::from_code)
            .ok_or_else(|| TransactionError::malformed(S2F41.reply(), format!("expected HCACK, got {reply}")))
    }

    /// Answer an inbound primary.
    pub async fn reply(
        &self,
        sf: StreamFunction,
        system_bytes: u32,
        body: Option<SecsItem>,
    ) -> Result<(), TransactionError> {
        self.facade.send_response(sf, system_bytes, body).await
    }
}
