//! Match Client
//!
//! Process-wide session context and the single owner of all mutable
//! client state: phase, cached snapshot, seat, matchmaking ticket and
//! session handle. Every inbound event and every user action goes
//! through `&mut self` here, so nothing interleaves mid-processing.
//!
//! The concern-specific operations live in sibling modules as extra
//! `impl` blocks: matchmaking, lobby handshake, the session controller
//! and the leave/rematch lifecycle.

pub mod controller;
pub mod lifecycle;
pub mod lobby;
pub mod matchmaking;
pub mod phase;

use tracing::{debug, info, warn};

use crate::network::protocol::{Mark, MatchSnapshot, OpCode, Seat, BOARD_CELLS};
use crate::network::transport::{PushEvent, SessionHandle, Transport};

pub use controller::{derive_status, MatchStatus};
pub use phase::Phase;

/// Nickname length bounds, counted in chars after trimming.
pub const NICKNAME_MIN_CHARS: usize = 1;
/// Upper nickname bound.
pub const NICKNAME_MAX_CHARS: usize = 20;

/// The local participant's identity for this app session.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    /// Device-scoped identifier, persisted across runs.
    pub device_id: String,
    /// User id assigned by the host at authenticate time.
    pub user_id: String,
    nickname: Option<String>,
}

impl LocalIdentity {
    /// Identity with no nickname chosen yet.
    pub fn new(device_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            user_id: user_id.into(),
            nickname: None,
        }
    }

    /// App-session nickname, once chosen.
    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }
}

/// The match session client.
///
/// Owns the current [`MatchSnapshot`] and derives all view-state from
/// it; board, turn and winner are never locally mutated, only replaced
/// wholesale by inbound snapshots.
pub struct MatchClient<T: Transport> {
    transport: T,
    identity: LocalIdentity,
    phase: Phase,
    pending_nickname: String,
    ticket: Option<String>,
    session: Option<SessionHandle>,
    snapshot: Option<MatchSnapshot>,
    seat: Option<Seat>,
    note: Option<String>,
}

impl<T: Transport> MatchClient<T> {
    /// Create a client over an established transport.
    pub fn new(transport: T, identity: LocalIdentity) -> Self {
        let phase = if identity.nickname.is_some() {
            Phase::Idle
        } else {
            Phase::NicknameEntry
        };
        Self {
            transport,
            identity,
            phase,
            pending_nickname: String::new(),
            ticket: None,
            session: None,
            snapshot: None,
            seat: None,
            note: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Cached authoritative snapshot, if any.
    pub fn snapshot(&self) -> Option<&MatchSnapshot> {
        self.snapshot.as_ref()
    }

    /// Local seat in the current match. `None` when not seated.
    pub fn seat(&self) -> Option<Seat> {
        self.seat
    }

    /// Transient status note (faults, "Left match", ...).
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Local identity.
    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// Current lobby nickname edit buffer.
    pub fn pending_nickname(&self) -> &str {
        &self.pending_nickname
    }

    /// Choose the app-session nickname. Valid once, from
    /// `NicknameEntry`; the trimmed name must be 1-20 chars. Invalid
    /// input is a silent no-op.
    pub fn set_nickname(&mut self, name: &str) {
        if self.phase != Phase::NicknameEntry {
            debug!("set_nickname ignored: nickname already set");
            return;
        }
        let trimmed = name.trim();
        let chars = trimmed.chars().count();
        if !(NICKNAME_MIN_CHARS..=NICKNAME_MAX_CHARS).contains(&chars) {
            debug!("set_nickname ignored: bad length {}", chars);
            return;
        }

        info!("Nickname set: {}", trimmed);
        self.identity.nickname = Some(trimmed.to_string());
        // Pre-fill the lobby edit buffer for the first match.
        self.pending_nickname = trimmed.to_string();
        self.transition(Phase::Idle);
    }

    /// Ingest one inbound push event. The caller serializes calls; no
    /// two events are processed concurrently.
    pub async fn handle_event(&mut self, event: PushEvent) {
        match event {
            PushEvent::MatchData {
                match_id,
                op_code,
                data,
            } => {
                let Some(session) = &self.session else {
                    debug!("Match data with no active session, dropped");
                    return;
                };
                if session.match_id != match_id {
                    debug!("Match data for stale match {}, dropped", match_id);
                    return;
                }
                match OpCode::from_i64(op_code) {
                    Some(OpCode::State) => self.ingest_state(&data),
                    Some(other) => debug!("Ignoring host-bound op code {:?}", other),
                    None => warn!("Unknown op code {}", op_code),
                }
            }
            PushEvent::MatchmakerMatched { ticket, match_ref } => {
                let _ = self.on_matched(&ticket, &match_ref).await;
            }
        }
    }

    /// Renderable projection of the whole client.
    pub fn view(&self) -> ClientView {
        ClientView {
            phase: self.phase,
            status: self.status_line(),
            note: self.note.clone(),
            board: self.board_view(),
            seat: self.seat,
            local_nickname: self.local_nickname_view(),
            local_ready: self.is_local_ready(),
            opponent_nickname: self.opponent_nickname().map(str::to_string),
            opponent_ready: self.opponent_ready(),
        }
    }

    fn status_line(&self) -> String {
        match self.phase {
            Phase::Connecting => "Connecting...".to_string(),
            Phase::NicknameEntry => "Choose your nickname".to_string(),
            Phase::Idle => match self.identity.nickname() {
                Some(nick) => format!("Welcome, {}!", nick),
                None => "Welcome!".to_string(),
            },
            Phase::Searching => "Searching for opponent...".to_string(),
            Phase::Joining => "Joining match...".to_string(),
            Phase::PreGameLobby | Phase::ActiveGame | Phase::Terminal => {
                match self.status() {
                    Some(status) => status.message().to_string(),
                    None => "Waiting for match state...".to_string(),
                }
            }
        }
    }

    fn local_nickname_view(&self) -> Option<String> {
        // Prefer the host-confirmed nickname once it exists.
        self.snapshot
            .as_ref()
            .and_then(|s| s.nickname_of(&self.identity.user_id))
            .map(str::to_string)
            .or_else(|| self.identity.nickname().map(str::to_string))
    }

    pub(crate) fn transition(&mut self, next: Phase) {
        if !self.phase.can_transition_to(next) {
            warn!("Unexpected phase transition {:?} -> {:?}", self.phase, next);
        } else if self.phase != next {
            debug!("Phase {:?} -> {:?}", self.phase, next);
        }
        self.phase = next;
    }

    pub(crate) fn set_note(&mut self, note: impl Into<String>) {
        self.note = Some(note.into());
    }

    pub(crate) fn clear_note(&mut self) {
        self.note = None;
    }
}

/// One renderable board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    /// Mark occupying the cell, if any.
    pub mark: Option<Mark>,
    /// Whether tapping the cell would send a move right now.
    pub enabled: bool,
}

/// Everything the rendering layer consumes.
#[derive(Debug, Clone)]
pub struct ClientView {
    /// Current phase tag; renderers switch over this.
    pub phase: Phase,
    /// Human-readable status line.
    pub status: String,
    /// Transient fault/info note, if any.
    pub note: Option<String>,
    /// Board with per-cell enablement; `None` before a snapshot exists.
    pub board: Option<[CellView; BOARD_CELLS]>,
    /// Local seat, when seated.
    pub seat: Option<Seat>,
    /// Local display name (host-confirmed when available).
    pub local_nickname: Option<String>,
    /// Local readiness as reflected by the host.
    pub local_ready: bool,
    /// Opponent display name, once announced.
    pub opponent_nickname: Option<String>,
    /// Opponent readiness as reflected by the host.
    pub opponent_ready: bool,
}

impl ClientView {
    /// View to render while the channel bootstrap is still running,
    /// before a client exists.
    pub fn connecting() -> Self {
        Self {
            phase: Phase::Connecting,
            status: "Connecting...".to_string(),
            note: None,
            board: None,
            seat: None,
            local_nickname: None,
            local_ready: false,
            opponent_nickname: None,
            opponent_ready: false,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::network::protocol::{Cell, MatchSnapshot, OpCode, Outcome, BOARD_CELLS};
    use crate::network::transport::{SessionHandle, Transport, TransportError};

    use super::{LocalIdentity, MatchClient};

    pub(crate) const LOCAL_ID: &str = "user-a";
    pub(crate) const REMOTE_ID: &str = "user-b";

    /// Records outbound traffic; every call can be made to fail.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pub sent: Arc<Mutex<Vec<(String, OpCode, String)>>>,
        pub added: Arc<Mutex<Vec<(u32, u32)>>>,
        pub removed: Arc<Mutex<Vec<String>>>,
        pub joins: Arc<Mutex<Vec<String>>>,
        pub leaves: Arc<Mutex<Vec<String>>>,
        /// Call names in invocation order.
        pub ops: Arc<Mutex<Vec<&'static str>>>,
        pub fail_matchmaker_add: bool,
        pub fail_join: bool,
        pub fail_send: bool,
        pub fail_leave: bool,
    }

    impl FakeTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn sent_log(&self) -> Arc<Mutex<Vec<(String, OpCode, String)>>> {
            self.sent.clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn matchmaker_add(
            &self,
            min_count: u32,
            max_count: u32,
        ) -> Result<String, TransportError> {
            self.ops.lock().unwrap().push("matchmaker_add");
            if self.fail_matchmaker_add {
                return Err(TransportError::Rejected("queue unavailable".into()));
            }
            self.added.lock().unwrap().push((min_count, max_count));
            Ok("ticket-1".to_string())
        }

        async fn matchmaker_remove(&self, ticket: &str) -> Result<(), TransportError> {
            self.ops.lock().unwrap().push("matchmaker_remove");
            self.removed.lock().unwrap().push(ticket.to_string());
            Ok(())
        }

        async fn join(&self, match_ref: &str) -> Result<SessionHandle, TransportError> {
            self.ops.lock().unwrap().push("join");
            if self.fail_join {
                return Err(TransportError::Rejected("match gone".into()));
            }
            self.joins.lock().unwrap().push(match_ref.to_string());
            Ok(SessionHandle {
                match_id: match_ref.to_string(),
            })
        }

        async fn leave(&self, match_id: &str) -> Result<(), TransportError> {
            self.ops.lock().unwrap().push("leave");
            if self.fail_leave {
                return Err(TransportError::ConnectionClosed);
            }
            self.leaves.lock().unwrap().push(match_id.to_string());
            Ok(())
        }

        async fn send(
            &self,
            match_id: &str,
            op_code: OpCode,
            payload: String,
        ) -> Result<(), TransportError> {
            self.ops.lock().unwrap().push("send");
            if self.fail_send {
                return Err(TransportError::ConnectionClosed);
            }
            self.sent
                .lock()
                .unwrap()
                .push((match_id.to_string(), op_code, payload));
            Ok(())
        }
    }

    pub(crate) fn identity() -> LocalIdentity {
        LocalIdentity::new("device-test", LOCAL_ID)
    }

    /// Client with nickname already chosen, sitting in `Idle`.
    pub(crate) fn named_client(transport: FakeTransport) -> MatchClient<FakeTransport> {
        let mut client = MatchClient::new(transport, identity());
        client.set_nickname("Alice");
        client
    }

    /// Client driven through search/match/join into `PreGameLobby`.
    pub(crate) async fn joined_client(transport: FakeTransport) -> MatchClient<FakeTransport> {
        let mut client = named_client(transport);
        client.search().await.unwrap();
        client.on_matched("ticket-1", "match-1").await.unwrap();
        client
    }

    pub(crate) fn empty_board() -> [Cell; BOARD_CELLS] {
        [Cell::Empty; BOARD_CELLS]
    }

    /// Pre-game lobby snapshot.
    pub(crate) fn lobby_snapshot(
        players: &[&str],
        ready: &[(&str, bool)],
        nicknames: &[(&str, &str)],
    ) -> MatchSnapshot {
        MatchSnapshot {
            board: empty_board(),
            players: players.iter().map(|p| p.to_string()).collect(),
            turn: 0,
            winner: None,
            started: false,
            players_ready: ready
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            player_nicknames: nicknames
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// Started snapshot for the standard [user-a, user-b] match.
    pub(crate) fn game_snapshot(turn: u8, winner: Option<Outcome>) -> MatchSnapshot {
        MatchSnapshot {
            board: empty_board(),
            players: vec![LOCAL_ID.to_string(), REMOTE_ID.to_string()],
            turn,
            winner,
            started: true,
            players_ready: BTreeMap::new(),
            player_nicknames: BTreeMap::new(),
        }
    }

    /// Push a snapshot into the client as an op-2 match data event.
    pub(crate) fn push_state(client: &mut MatchClient<FakeTransport>, snapshot: &MatchSnapshot) {
        let data = serde_json::to_string(snapshot).unwrap();
        client.ingest_state(&data);
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::network::protocol::Outcome;

    #[test]
    fn test_new_client_without_nickname_enters_nickname_entry() {
        let client = MatchClient::new(FakeTransport::new(), identity());
        assert_eq!(client.phase(), Phase::NicknameEntry);
        assert_eq!(client.view().status, "Choose your nickname");
    }

    #[test]
    fn test_set_nickname_trims_and_transitions() {
        let mut client = MatchClient::new(FakeTransport::new(), identity());
        client.set_nickname("  Alice  ");
        assert_eq!(client.identity().nickname(), Some("Alice"));
        assert_eq!(client.phase(), Phase::Idle);
        assert_eq!(client.pending_nickname(), "Alice");
        assert_eq!(client.view().status, "Welcome, Alice!");
    }

    #[test]
    fn test_set_nickname_rejects_empty_and_oversized() {
        let mut client = MatchClient::new(FakeTransport::new(), identity());
        client.set_nickname("   ");
        assert_eq!(client.phase(), Phase::NicknameEntry);

        client.set_nickname(&"x".repeat(21));
        assert_eq!(client.phase(), Phase::NicknameEntry);

        client.set_nickname(&"x".repeat(20));
        assert_eq!(client.phase(), Phase::Idle);
    }

    #[test]
    fn test_set_nickname_only_once() {
        let mut client = MatchClient::new(FakeTransport::new(), identity());
        client.set_nickname("Alice");
        client.set_nickname("Mallory");
        assert_eq!(client.identity().nickname(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_match_data_without_session_is_dropped() {
        let mut client = named_client(FakeTransport::new());
        let snapshot = game_snapshot(0, None);
        client
            .handle_event(crate::network::transport::PushEvent::MatchData {
                match_id: "match-1".to_string(),
                op_code: OpCode::State.as_i64(),
                data: serde_json::to_string(&snapshot).unwrap(),
            })
            .await;
        assert!(client.snapshot().is_none());
        assert_eq!(client.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_match_data_for_stale_match_is_dropped() {
        let mut client = joined_client(FakeTransport::new()).await;
        let snapshot = game_snapshot(0, None);
        client
            .handle_event(crate::network::transport::PushEvent::MatchData {
                match_id: "other-match".to_string(),
                op_code: OpCode::State.as_i64(),
                data: serde_json::to_string(&snapshot).unwrap(),
            })
            .await;
        assert!(client.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_view_reflects_terminal_snapshot() {
        let mut client = joined_client(FakeTransport::new()).await;
        push_state(&mut client, &game_snapshot(0, Some(Outcome::Draw)));

        let view = client.view();
        assert_eq!(view.phase, Phase::Terminal);
        assert_eq!(view.status, "Game ended in a draw!");
        let board = view.board.unwrap();
        assert!(board.iter().all(|c| !c.enabled));
    }

    #[test]
    fn test_connecting_view() {
        let view = ClientView::connecting();
        assert_eq!(view.phase, Phase::Connecting);
        assert_eq!(view.status, "Connecting...");
        assert!(view.board.is_none());
    }
}
