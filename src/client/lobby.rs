//! Lobby Handshake
//!
//! Per-match ready-up: edit and confirm the nickname for the joined
//! match, track opponent readiness, and let the host decide when play
//! actually starts. Readiness is only authoritative once it comes back
//! in a snapshot; the ready announcement itself is fire-and-forget.

use tracing::{debug, warn};

use crate::client::{MatchClient, Phase, NICKNAME_MAX_CHARS, NICKNAME_MIN_CHARS};
use crate::network::protocol::{OpCode, ReadyPayload};
use crate::network::transport::{Transport, TransportError};

impl<T: Transport> MatchClient<T> {
    /// Edit the lobby nickname. Pure local, no network effect. The
    /// trimmed name must be 1-20 chars; anything else is a no-op.
    pub fn set_pending_nickname(&mut self, name: &str) {
        let trimmed = name.trim();
        let chars = trimmed.chars().count();
        if !(NICKNAME_MIN_CHARS..=NICKNAME_MAX_CHARS).contains(&chars) {
            debug!("set_pending_nickname ignored: bad length {}", chars);
            return;
        }
        self.pending_nickname = trimmed.to_string();
    }

    /// Announce readiness with the pending nickname. Requires a joined
    /// match in the lobby phase and a non-empty pending nickname;
    /// otherwise a silent no-op. The announcement is fire-and-forget:
    /// local readiness only flips when a snapshot reflects it.
    pub async fn confirm_ready(&mut self) -> Result<(), TransportError> {
        if self.phase != Phase::PreGameLobby {
            debug!("confirm_ready ignored in phase {:?}", self.phase);
            return Ok(());
        }
        let Some(session) = &self.session else {
            debug!("confirm_ready ignored: no joined match");
            return Ok(());
        };
        let nickname = self.pending_nickname.trim();
        if nickname.is_empty() {
            debug!("confirm_ready ignored: empty nickname");
            return Ok(());
        }

        let payload = serde_json::to_string(&ReadyPayload {
            nickname: nickname.to_string(),
            user_id: self.identity.user_id.clone(),
        })?;

        let result = self
            .transport
            .send(&session.match_id, OpCode::Ready, payload)
            .await;

        match result {
            Ok(()) => {
                debug!("Sent ready with nickname: {}", nickname);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send ready: {}", e);
                self.set_note("Failed to send ready");
                Err(e)
            }
        }
    }

    /// Local readiness as reflected by the host.
    pub fn is_local_ready(&self) -> bool {
        self.snapshot
            .as_ref()
            .map(|s| s.is_ready(&self.identity.user_id))
            .unwrap_or(false)
    }

    /// Opponent readiness as reflected by the host.
    pub fn opponent_ready(&self) -> bool {
        self.snapshot
            .as_ref()
            .and_then(|s| {
                s.opponent_of(&self.identity.user_id)
                    .map(|opponent| s.is_ready(opponent))
            })
            .unwrap_or(false)
    }

    /// Opponent display name, once they confirmed it.
    pub fn opponent_nickname(&self) -> Option<&str> {
        let snapshot = self.snapshot.as_ref()?;
        let opponent = snapshot.opponent_of(&self.identity.user_id)?;
        snapshot.nickname_of(opponent)
    }
}
