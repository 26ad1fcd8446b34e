//! Match Session Controller
//!
//! Single source of truth for playable state. Every inbound snapshot is
//! ingested unconditionally (last one wins), the local seat is
//! recomputed per snapshot, and all display state is a pure function of
//! snapshot + seat. Move validation here is a courtesy guard against
//! wasted round trips; the host re-validates authoritatively and the
//! next snapshot is accepted whatever it says.

use tracing::{debug, warn};

use crate::client::{CellView, MatchClient, Phase};
use crate::network::protocol::{
    Cell, MatchSnapshot, MovePayload, OpCode, Outcome, Seat, BOARD_CELLS,
};
use crate::network::transport::{Transport, TransportError};

/// Derived match status. Exactly one per reachable snapshot shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// Lobby phase, not everyone has readied up.
    WaitingForReady,
    /// Lobby phase, all known participants ready; start is imminent.
    Starting,
    /// Match ended with no winner.
    Draw,
    /// Opponent abandoned the match.
    OpponentLeft,
    /// Local seat's mark won.
    Won,
    /// Other seat's mark won.
    Lost,
    /// Live match, host accepts the local seat's move.
    YourTurn,
    /// Live match, waiting on the opponent.
    OpponentTurn,
    /// Local identity absent from the player list. Error-display
    /// state, e.g. a late snapshot after leaving.
    NotSeated,
}

impl MatchStatus {
    /// Human-readable status line.
    pub fn message(self) -> &'static str {
        match self {
            MatchStatus::WaitingForReady => "Waiting for players to ready up...",
            MatchStatus::Starting => "Starting game...",
            MatchStatus::Draw => "Game ended in a draw!",
            MatchStatus::OpponentLeft => "Opponent left the game",
            MatchStatus::Won => "You won!",
            MatchStatus::Lost => "You lost!",
            MatchStatus::YourTurn => "Your turn!",
            MatchStatus::OpponentTurn => "Opponent's turn...",
            MatchStatus::NotSeated => "Not seated in this match",
        }
    }

    /// Whether this status describes a finished match.
    pub fn is_outcome(self) -> bool {
        matches!(
            self,
            MatchStatus::Draw | MatchStatus::OpponentLeft | MatchStatus::Won | MatchStatus::Lost
        )
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Derive the display status from a snapshot and the local seat.
///
/// Total over every snapshot shape, in precedence order: lobby statuses
/// first, then recorded outcomes, then the turn indicator.
pub fn derive_status(snapshot: &MatchSnapshot, seat: Option<Seat>) -> MatchStatus {
    if !snapshot.started {
        if snapshot.all_ready() {
            return MatchStatus::Starting;
        }
        return MatchStatus::WaitingForReady;
    }

    match snapshot.winner {
        Some(Outcome::Draw) => MatchStatus::Draw,
        Some(Outcome::Abandoned) => MatchStatus::OpponentLeft,
        Some(outcome) => match (outcome.winning_mark(), seat) {
            (Some(mark), Some(seat)) if seat.mark() == mark => MatchStatus::Won,
            (Some(_), Some(_)) => MatchStatus::Lost,
            _ => MatchStatus::NotSeated,
        },
        None => match seat {
            Some(seat) if snapshot.turn == seat.index() => MatchStatus::YourTurn,
            Some(_) => MatchStatus::OpponentTurn,
            None => MatchStatus::NotSeated,
        },
    }
}

impl<T: Transport> MatchClient<T> {
    /// Ingest an op-2 state payload. A payload that fails to decode is
    /// skipped (prior snapshot kept); a decoded snapshot replaces the
    /// cached one wholesale and recomputes seat and phase.
    pub(crate) fn ingest_state(&mut self, data: &str) {
        let snapshot = match MatchSnapshot::from_json(data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to decode state payload, skipped: {}", e);
                return;
            }
        };

        self.seat = snapshot.seat_of(&self.identity.user_id);
        if self.seat.is_none() {
            debug!("Local participant not seated in this snapshot");
        }

        let next = if !snapshot.started {
            Phase::PreGameLobby
        } else if snapshot.is_terminal() {
            Phase::Terminal
        } else {
            Phase::ActiveGame
        };

        debug!(
            "State ingested: started={} turn={} winner={:?}",
            snapshot.started, snapshot.turn, snapshot.winner
        );
        self.snapshot = Some(snapshot);
        self.clear_note();
        self.transition(next);
    }

    /// Derived status for the cached snapshot, if one exists.
    pub fn status(&self) -> Option<MatchStatus> {
        self.snapshot
            .as_ref()
            .map(|snapshot| derive_status(snapshot, self.seat))
    }

    /// Attempt to place a mark at `cell`.
    ///
    /// Validated against the cached snapshot to avoid obviously wasted
    /// round trips; rejections are expected no-ops, not errors. The
    /// host re-validates and its next snapshot wins either way.
    pub async fn attempt_move(&mut self, cell: usize) -> Result<(), TransportError> {
        let (Some(session), Some(snapshot)) = (&self.session, &self.snapshot) else {
            debug!("attempt_move ignored: no active match");
            return Ok(());
        };
        if cell >= BOARD_CELLS {
            debug!("attempt_move ignored: cell {} out of range", cell);
            return Ok(());
        }
        if !snapshot.started {
            debug!("attempt_move ignored: match not started");
            return Ok(());
        }
        if snapshot.is_terminal() {
            debug!("attempt_move ignored: winner already recorded");
            return Ok(());
        }
        let Some(seat) = self.seat else {
            debug!("attempt_move ignored: not seated");
            return Ok(());
        };
        if snapshot.turn != seat.index() {
            debug!("attempt_move ignored: not our turn");
            return Ok(());
        }
        if !snapshot.board[cell].is_empty() {
            debug!("attempt_move ignored: cell {} occupied", cell);
            return Ok(());
        }

        let payload = serde_json::to_string(&MovePayload { cell })?;
        let result = self
            .transport
            .send(&session.match_id, OpCode::Move, payload)
            .await;

        match result {
            Ok(()) => {
                debug!("Sent move: cell {}", cell);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send move: {}", e);
                self.set_note("Failed to send move");
                Err(e)
            }
        }
    }

    /// Board projection with per-cell enablement, `None` until the
    /// first snapshot arrives.
    pub(crate) fn board_view(&self) -> Option<[CellView; BOARD_CELLS]> {
        let snapshot = self.snapshot.as_ref()?;
        let my_turn = matches!(self.seat, Some(seat) if snapshot.turn == seat.index());
        let playable = snapshot.started && !snapshot.is_terminal() && my_turn;

        Some(std::array::from_fn(|i| {
            let cell = snapshot.board[i];
            CellView {
                mark: match cell {
                    Cell::Taken(mark) => Some(mark),
                    Cell::Empty => None,
                },
                enabled: playable && cell.is_empty(),
            }
        }))
    }
}
