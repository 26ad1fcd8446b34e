//! Session Lifecycle
//!
//! Leave and rematch sequencing. Leave is idempotent-intent with
//! optimistic local teardown: the host-side leave is requested, then
//! the session handle, cached snapshot and seat are cleared whether or
//! not the host acknowledged. The client proceeds without waiting.

use tracing::{debug, info, warn};

use crate::client::{MatchClient, Phase};
use crate::network::transport::{Transport, TransportError};

impl<T: Transport> MatchClient<T> {
    /// Leave the current match. No-op when there is no active session.
    pub async fn leave(&mut self) {
        let Some(handle) = self.session.take() else {
            debug!("leave ignored: no active session");
            return;
        };

        let result = self.transport.leave(&handle.match_id).await;

        // Local teardown is not gated on the host reply.
        self.snapshot = None;
        self.seat = None;
        self.ticket = None;
        self.pending_nickname = self.identity.nickname().unwrap_or_default().to_string();
        self.transition(Phase::Idle);
        self.set_note("Left match");

        match result {
            Ok(()) => info!("Left match {}", handle.match_id),
            Err(e) => warn!("Leave request failed, local state cleared anyway: {}", e),
        }
    }

    /// Leave the current match, then start a fresh search. The awaited
    /// leave is the ordering signal: the new request is only issued
    /// once leave-side cleanup has settled.
    pub async fn rematch(&mut self) -> Result<(), TransportError> {
        info!("Rematch requested");
        self.leave().await;
        self.search().await
    }
}
