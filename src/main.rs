//! Grid Duel Demo
//!
//! Drives a full match session against a scripted in-process host:
//! nickname entry, matchmaking, ready-up, a played-out game and a
//! rematch. Useful for eyeballing the state machine without a live
//! server.

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use grid_duel::{
    Cell, LocalIdentity, Mark, MatchClient, MatchSnapshot, OpCode, Outcome, PushEvent,
    SessionHandle, Transport, TransportError, BOARD_CELLS, VERSION,
};

/// Transport stub that acknowledges every call. The host's side of the
/// conversation is scripted in `main` by pushing canned snapshots.
struct DemoHost;

#[async_trait]
impl Transport for DemoHost {
    async fn matchmaker_add(
        &self,
        min_count: u32,
        max_count: u32,
    ) -> Result<String, TransportError> {
        info!("host: matchmaker add ({}..{})", min_count, max_count);
        Ok("demo-ticket".to_string())
    }

    async fn matchmaker_remove(&self, ticket: &str) -> Result<(), TransportError> {
        info!("host: matchmaker remove {}", ticket);
        Ok(())
    }

    async fn join(&self, match_ref: &str) -> Result<SessionHandle, TransportError> {
        info!("host: join {}", match_ref);
        Ok(SessionHandle {
            match_id: match_ref.to_string(),
        })
    }

    async fn leave(&self, match_id: &str) -> Result<(), TransportError> {
        info!("host: leave {}", match_id);
        Ok(())
    }

    async fn send(
        &self,
        match_id: &str,
        op_code: OpCode,
        payload: String,
    ) -> Result<(), TransportError> {
        info!("host: recv op {:?} on {}: {}", op_code, match_id, payload);
        Ok(())
    }
}

/// Build a board from a 9-char pattern, `.` for empty.
fn board(pattern: &str) -> [Cell; BOARD_CELLS] {
    let mut cells = [Cell::Empty; BOARD_CELLS];
    for (i, c) in pattern.chars().take(BOARD_CELLS).enumerate() {
        cells[i] = match c {
            'X' => Cell::Taken(Mark::X),
            'O' => Cell::Taken(Mark::O),
            _ => Cell::Empty,
        };
    }
    cells
}

fn snapshot(
    pattern: &str,
    turn: u8,
    winner: Option<Outcome>,
    started: bool,
) -> MatchSnapshot {
    MatchSnapshot {
        board: board(pattern),
        players: vec!["player-alice".to_string(), "player-bob".to_string()],
        turn,
        winner,
        started,
        players_ready: BTreeMap::from([
            ("player-alice".to_string(), true),
            ("player-bob".to_string(), true),
        ]),
        player_nicknames: BTreeMap::from([
            ("player-alice".to_string(), "Alice".to_string()),
            ("player-bob".to_string(), "Bob".to_string()),
        ]),
    }
}

fn state_push(snapshot: &MatchSnapshot) -> anyhow::Result<PushEvent> {
    Ok(PushEvent::MatchData {
        match_id: "demo-match".to_string(),
        op_code: OpCode::State.as_i64(),
        data: serde_json::to_string(snapshot).context("encoding demo snapshot")?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting tracing subscriber")?;

    info!("Grid Duel Demo v{}", VERSION);

    let identity = LocalIdentity::new("device-demo", "player-alice");
    let mut client = MatchClient::new(DemoHost, identity);
    info!("phase: {:?}", client.phase());

    // Nickname entry, then queue up.
    client.set_nickname("Alice");
    info!("phase: {:?}", client.phase());
    client.search().await.context("queueing for a match")?;

    // Host answers the ticket.
    client
        .handle_event(PushEvent::MatchmakerMatched {
            ticket: "demo-ticket".to_string(),
            match_ref: "demo-match".to_string(),
        })
        .await;
    info!("phase: {:?}", client.phase());

    // Ready up; host confirms the lobby and starts the game.
    client.confirm_ready().await.context("sending ready")?;
    client
        .handle_event(state_push(&snapshot(".........", 0, None, false))?)
        .await;
    info!("lobby: {:?}", client.status());
    client
        .handle_event(state_push(&snapshot(".........", 0, None, true))?)
        .await;
    info!("phase: {:?}, status: {:?}", client.phase(), client.status());

    // Play out the middle column for X. Each of our moves is answered
    // by a snapshot that also carries Bob's reply.
    client.attempt_move(4).await.context("sending move")?;
    client
        .handle_event(state_push(&snapshot("O...X....", 0, None, true))?)
        .await;
    client.attempt_move(1).await.context("sending move")?;
    client
        .handle_event(state_push(&snapshot("OX..X...O", 0, None, true))?)
        .await;
    client.attempt_move(7).await.context("sending move")?;
    client
        .handle_event(state_push(&snapshot("OX..X..XO", 1, Some(Outcome::X), true))?)
        .await;
    info!("phase: {:?}, status: {:?}", client.phase(), client.status());
    if let Some(status) = client.status() {
        info!("result: {}", status.message());
    }

    // Rematch leaves and queues again, then clean up.
    client.rematch().await.context("requeueing for rematch")?;
    info!("after rematch, phase: {:?}", client.phase());
    client.cancel().await;
    info!("demo complete, phase: {:?}", client.phase());
    Ok(())
}
