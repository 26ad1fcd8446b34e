//! Matchmaking Client
//!
//! Issues and cancels the matchmaking request and handles the single
//! host-driven matched notification: `Idle -> Searching -> Joining ->
//! PreGameLobby`, with cancel only valid while still `Searching`.

use tracing::{debug, error, info};

use crate::client::{MatchClient, Phase};
use crate::network::protocol::MATCH_SIZE;
use crate::network::transport::{Transport, TransportError};

impl<T: Transport> MatchClient<T> {
    /// Submit a matchmaking request: party size exactly two, no filter
    /// criteria. Valid from `Idle` with an established identity; any
    /// other state is a silent no-op.
    pub async fn search(&mut self) -> Result<(), TransportError> {
        if self.phase != Phase::Idle {
            debug!("search ignored in phase {:?}", self.phase);
            return Ok(());
        }
        if self.session.is_some() {
            debug!("search ignored: match still active");
            return Ok(());
        }

        info!("Starting matchmaking...");
        self.transition(Phase::Searching);
        // The Searching status line already says so; only faults leave
        // a note here.
        self.clear_note();

        match self.transport.matchmaker_add(MATCH_SIZE, MATCH_SIZE).await {
            Ok(ticket) => {
                debug!("Added to matchmaker queue: {}", ticket);
                self.ticket = Some(ticket);
                Ok(())
            }
            Err(e) => {
                error!("Matchmaker submission failed: {}", e);
                self.set_note(format!("Matchmaking failed: {}", e));
                self.transition(Phase::Idle);
                Err(e)
            }
        }
    }

    /// Withdraw the outstanding matchmaking request. Only valid from
    /// `Searching`; once a join has begun the cancel is rejected. The
    /// host-side withdrawal is best-effort: the local reset to `Idle`
    /// happens regardless of the request outcome.
    pub async fn cancel(&mut self) {
        if self.phase != Phase::Searching {
            debug!("cancel ignored in phase {:?}", self.phase);
            return;
        }

        let ticket = self.ticket.take();
        self.transition(Phase::Idle);
        self.set_note("Search cancelled");
        info!("Cancelled matchmaking");

        if let Some(ticket) = ticket {
            if let Err(e) = self.transport.matchmaker_remove(&ticket).await {
                debug!("Matchmaker withdrawal failed (best-effort): {}", e);
            }
        }
    }

    /// Handle the matched notification: join the resulting match and
    /// hand the session handle to the lifecycle. Notifications that
    /// arrive outside `Searching` or for a stale ticket are ignored.
    pub async fn on_matched(
        &mut self,
        ticket: &str,
        match_ref: &str,
    ) -> Result<(), TransportError> {
        if self.phase != Phase::Searching {
            debug!("Matched notification ignored in phase {:?}", self.phase);
            return Ok(());
        }
        if self.ticket.as_deref() != Some(ticket) {
            debug!("Matched notification for stale ticket {}, ignored", ticket);
            return Ok(());
        }

        info!("Matchmaker found opponent, joining {}...", match_ref);
        self.ticket = None;
        self.transition(Phase::Joining);

        match self.transport.join(match_ref).await {
            Ok(handle) => {
                debug!("Joined match {}", handle.match_id);
                self.session = Some(handle);
                // Pre-fill the lobby buffer with the app-session nickname.
                self.pending_nickname =
                    self.identity.nickname().unwrap_or_default().to_string();
                self.set_note("Match found! Confirm your nickname...");
                self.transition(Phase::PreGameLobby);
                Ok(())
            }
            Err(e) => {
                error!("Failed to join matchmade game: {}", e);
                self.set_note("Failed to join match");
                self.transition(Phase::Idle);
                Err(e)
            }
        }
    }
}
