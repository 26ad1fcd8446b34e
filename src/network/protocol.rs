//! Protocol Messages
//!
//! Wire format for client-host communication over the realtime channel.
//! Match payloads are op-coded JSON: the op code says what the payload
//! means, the payload itself is a JSON document. Socket frames wrap
//! payloads (and request/response calls) for the websocket transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of cells on the board.
pub const BOARD_CELLS: usize = 9;

/// Players in a match. Matchmaking always requests exactly this many.
pub const MATCH_SIZE: u32 = 2;

// =============================================================================
// OP CODES
// =============================================================================

/// Operation codes distinguishing match payload meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Client -> host: attempt to place a mark.
    Move,
    /// Host -> client: authoritative full-state replace.
    State,
    /// Client -> host: lobby readiness + nickname announcement.
    Ready,
}

impl OpCode {
    /// Integer tag used on the wire.
    pub fn as_i64(self) -> i64 {
        match self {
            OpCode::Move => 1,
            OpCode::State => 2,
            OpCode::Ready => 3,
        }
    }

    /// Parse a wire tag. Unknown codes return `None` and the message
    /// is skipped by the receiver.
    pub fn from_i64(code: i64) -> Option<Self> {
        match code {
            1 => Some(OpCode::Move),
            2 => Some(OpCode::State),
            3 => Some(OpCode::Ready),
            _ => None,
        }
    }
}

// =============================================================================
// BOARD MODEL
// =============================================================================

/// A player's mark. Seat 0 plays X, seat 1 plays O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    /// First seat's mark.
    X,
    /// Second seat's mark.
    O,
}

impl Mark {
    /// Character shown on the board.
    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

/// Seat index identifying a participant's fixed role within a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    /// Index 0, plays X.
    A,
    /// Index 1, plays O.
    B,
}

impl Seat {
    /// Authoritative index into `MatchSnapshot::players`.
    pub fn index(self) -> u8 {
        match self {
            Seat::A => 0,
            Seat::B => 1,
        }
    }

    /// Seat for a player-list index, if it is a valid seat.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Seat::A),
            1 => Some(Seat::B),
            _ => None,
        }
    }

    /// Mark this seat plays.
    pub fn mark(self) -> Mark {
        match self {
            Seat::A => Mark::X,
            Seat::B => Mark::O,
        }
    }

    /// The other seat.
    pub fn opponent(self) -> Self {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }
}

/// One board cell. The host encodes empty cells as `""`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cell {
    /// No mark placed.
    Empty,
    /// Occupied by a mark.
    Taken(Mark),
}

impl Cell {
    /// Whether a move can target this cell.
    pub fn is_empty(self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        match s.as_str() {
            "X" => Cell::Taken(Mark::X),
            "O" => Cell::Taken(Mark::O),
            // Anything unrecognized renders as empty rather than failing
            // the whole snapshot.
            _ => Cell::Empty,
        }
    }
}

impl From<Cell> for String {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => String::new(),
            Cell::Taken(mark) => mark.as_str().to_string(),
        }
    }
}

/// Terminal result announced by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Seat 0 won.
    #[serde(rename = "X")]
    X,
    /// Seat 1 won.
    #[serde(rename = "O")]
    O,
    /// Board filled with no winner.
    #[serde(rename = "draw")]
    Draw,
    /// A participant left mid-match.
    #[serde(rename = "abandoned")]
    Abandoned,
}

impl Outcome {
    /// Winning mark, when the outcome names one.
    pub fn winning_mark(self) -> Option<Mark> {
        match self {
            Outcome::X => Some(Mark::X),
            Outcome::O => Some(Mark::O),
            Outcome::Draw | Outcome::Abandoned => None,
        }
    }
}

// =============================================================================
// MATCH SNAPSHOT
// =============================================================================

/// Authoritative full match state pushed by the host (op code 2).
///
/// Each snapshot replaces the previous one wholesale; the client never
/// merges or locally mutates board/turn/winner fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    /// Board cells in row-major order. Decoding rejects any other length.
    pub board: [Cell; BOARD_CELLS],
    /// Participant ids in authoritative seat order (0 = X, 1 = O).
    pub players: Vec<String>,
    /// Seat index whose move is currently accepted. Meaningless once
    /// `winner` is set.
    pub turn: u8,
    /// Terminal result, `null` while the match is live.
    pub winner: Option<Outcome>,
    /// False while in the pre-game lobby.
    pub started: bool,
    /// Readiness per participant, populated during the lobby phase.
    #[serde(default)]
    pub players_ready: BTreeMap<String, bool>,
    /// Confirmed display names per participant.
    #[serde(default)]
    pub player_nicknames: BTreeMap<String, String>,
}

impl MatchSnapshot {
    /// Seat of the given participant, `None` if absent from `players`.
    pub fn seat_of(&self, user_id: &str) -> Option<Seat> {
        self.players
            .iter()
            .position(|p| p == user_id)
            .and_then(Seat::from_index)
    }

    /// The other participant's id, relative to `user_id`.
    pub fn opponent_of(&self, user_id: &str) -> Option<&str> {
        self.players
            .iter()
            .find(|p| p.as_str() != user_id)
            .map(String::as_str)
    }

    /// Whether a participant has announced ready.
    pub fn is_ready(&self, user_id: &str) -> bool {
        self.players_ready.get(user_id).copied().unwrap_or(false)
    }

    /// Confirmed nickname for a participant, if announced.
    pub fn nickname_of(&self, user_id: &str) -> Option<&str> {
        self.player_nicknames.get(user_id).map(String::as_str)
    }

    /// All known participants are ready. False while `players` is empty:
    /// an empty lobby is never "all ready".
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| self.is_ready(p))
    }

    /// A winner has been recorded; no further state-mutating actions are
    /// accepted by the host.
    pub fn is_terminal(&self) -> bool {
        self.winner.is_some()
    }

    /// Deserialize from an op-2 payload.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// OUTBOUND PAYLOADS
// =============================================================================

/// Payload for op code 1 (Move).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovePayload {
    /// Target board index.
    pub cell: usize,
}

/// Payload for op code 3 (Ready).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    /// Chosen display name.
    pub nickname: String,
    /// Announcing participant.
    #[serde(rename = "userId")]
    pub user_id: String,
}

// =============================================================================
// SOCKET FRAMES
// =============================================================================

/// Frames sent from client to host over the websocket.
///
/// Request/response calls carry a correlation id (`cid`) echoed back in
/// the host's reply; push-style frames carry none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Submit a matchmaking request.
    MatchmakerAdd {
        /// Correlation id.
        cid: u32,
        /// Minimum party size.
        min_count: u32,
        /// Maximum party size.
        max_count: u32,
    },

    /// Withdraw an outstanding matchmaking request.
    MatchmakerRemove {
        /// Correlation id.
        cid: u32,
        /// Ticket being withdrawn.
        ticket: String,
    },

    /// Join a match by reference.
    MatchJoin {
        /// Correlation id.
        cid: u32,
        /// Match reference from the matched notification.
        match_ref: String,
    },

    /// Leave the current match.
    MatchLeave {
        /// Correlation id.
        cid: u32,
        /// Match being left.
        match_id: String,
    },

    /// Op-coded match payload.
    MatchData {
        /// Target match.
        match_id: String,
        /// Operation code (see [`OpCode`]).
        op_code: i64,
        /// JSON-encoded payload.
        data: String,
    },
}

/// Frames pushed or replied by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Successful reply to a cid-carrying call with no body.
    Ack {
        /// Correlation id of the call.
        cid: u32,
    },

    /// Reply to `MatchmakerAdd`.
    MatchmakerTicket {
        /// Correlation id of the call.
        cid: u32,
        /// Ticket identifying the queued request.
        ticket: String,
    },

    /// Reply to `MatchJoin`.
    MatchJoined {
        /// Correlation id of the call.
        cid: u32,
        /// Joined match id.
        match_id: String,
    },

    /// An opponent was found for an outstanding ticket.
    MatchmakerMatched {
        /// Ticket the notification answers.
        ticket: String,
        /// Reference to join the resulting match with.
        match_ref: String,
    },

    /// Op-coded match payload.
    MatchData {
        /// Originating match.
        match_id: String,
        /// Operation code (see [`OpCode`]).
        op_code: i64,
        /// JSON-encoded payload.
        data: String,
    },

    /// Failed reply to a cid-carrying call.
    Error {
        /// Correlation id of the failed call, if any.
        cid: Option<u32>,
        /// Human-readable reason.
        message: String,
    },
}

impl ClientFrame {
    /// Serialize to a websocket text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerFrame {
    /// Deserialize from a websocket text frame.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
