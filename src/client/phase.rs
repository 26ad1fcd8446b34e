//! Client Phase
//!
//! One tagged phase for the whole client instead of re-deriving state
//! from optional fields. Every rendering and derivation path switches
//! over this tag.

/// Where the client is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Channel bootstrap in progress.
    Connecting,
    /// Connected, app-session nickname not chosen yet.
    NicknameEntry,
    /// Ready to search, no match activity.
    Idle,
    /// Matchmaking request outstanding.
    Searching,
    /// Matched, join call in flight. Cancel is rejected here.
    Joining,
    /// In a match, ready-up handshake in progress.
    PreGameLobby,
    /// Match started, no winner recorded.
    ActiveGame,
    /// Winner recorded. Only leave/rematch remain.
    Terminal,
}

impl Phase {
    /// Whether a session handle exists in this phase.
    pub fn in_match(self) -> bool {
        matches!(self, Phase::PreGameLobby | Phase::ActiveGame | Phase::Terminal)
    }

    /// Whether `next` is a legal transition from this phase.
    ///
    /// Leaving force-resets any in-match or searching phase to `Idle`,
    /// so every phase admits `Idle`.
    pub fn can_transition_to(self, next: Phase) -> bool {
        if next == Phase::Idle {
            return true;
        }
        match (self, next) {
            (Phase::Connecting, Phase::NicknameEntry) => true,
            (Phase::Idle, Phase::Searching) => true,
            (Phase::Searching, Phase::Joining) => true,
            (Phase::Joining, Phase::PreGameLobby) => true,
            (Phase::PreGameLobby, Phase::ActiveGame) => true,
            // A snapshot can carry started+winner in one message.
            (Phase::PreGameLobby, Phase::Terminal) => true,
            (Phase::ActiveGame, Phase::Terminal) => true,
            // Snapshot replay keeps the phase where it already is.
            (a, b) => a == b,
        }
    }
}
