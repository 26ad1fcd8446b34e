//! # Grid Duel Client
//!
//! Realtime match client for Grid Duel, a host-authoritative
//! tic-tac-toe. The remote host owns all rules, board mutation, turn
//! order and win detection; this crate only reconciles local intent
//! with the host's op-coded event stream.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    GRID DUEL CLIENT                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  client/           - Session state machine                   │
//! │  ├── phase.rs      - Explicit phase tag + transition table   │
//! │  ├── matchmaking.rs- Search / cancel / matched handling      │
//! │  ├── lobby.rs      - Nickname + ready-up handshake           │
//! │  ├── controller.rs - Snapshot ingest, status derivation,     │
//! │  │                   move validation                         │
//! │  └── lifecycle.rs  - Leave / rematch sequencing              │
//! │                                                              │
//! │  network/          - Wire plumbing                           │
//! │  ├── protocol.rs   - Op codes, snapshot, socket frames       │
//! │  ├── transport.rs  - Transport seam + event slots            │
//! │  ├── socket.rs     - tokio-tungstenite implementation        │
//! │  └── auth.rs       - Device identity, session token claims   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority Model
//!
//! Every `MatchSnapshot` pushed by the host replaces the cached one
//! wholesale. Local validation in `attempt_move` only avoids wasted
//! round trips; whatever the next snapshot says is accepted, even when
//! it contradicts a move the client just attempted.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod network;

// Re-export commonly used types
pub use client::{
    derive_status, ClientView, LocalIdentity, MatchClient, MatchStatus, Phase,
};
pub use network::auth::ClientConfig;
pub use network::protocol::{Cell, Mark, MatchSnapshot, OpCode, Outcome, Seat, BOARD_CELLS};
pub use network::socket::WsTransport;
pub use network::transport::{PushEvent, SessionHandle, Transport, TransportError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
