//! Transport Session Boundary
//!
//! The client core never talks to a websocket directly. Everything it
//! needs from the realtime channel is behind [`Transport`], so the state
//! machine can be driven by the production socket or by a scripted fake.
//!
//! Push delivery uses one [`EventSlot`] per event kind. A slot holds at
//! most one subscriber; subscribing again replaces the previous handler.
//! Replacing the subscriber is how teardown is expressed.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::network::protocol::OpCode;

/// Opaque reference to a joined match. Destroyed on leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Host-assigned match identifier.
    pub match_id: String,
}

/// Events pushed by the host, delivered to the client's update loop.
#[derive(Debug, Clone)]
pub enum PushEvent {
    /// Op-coded payload for a match the local participant is in.
    MatchData {
        /// Originating match.
        match_id: String,
        /// Wire operation code.
        op_code: i64,
        /// JSON-encoded payload.
        data: String,
    },

    /// An outstanding matchmaking ticket was answered.
    MatchmakerMatched {
        /// Ticket the notification answers.
        ticket: String,
        /// Reference to join the resulting match with.
        match_ref: String,
    },
}

/// Transport faults. Always non-fatal to the client core: callers revert
/// state and surface a transient note.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Channel is not connected.
    #[error("not connected")]
    NotConnected,

    /// Channel closed underneath an in-flight call.
    #[error("connection closed")]
    ConnectionClosed,

    /// Host rejected the call.
    #[error("rejected by host: {0}")]
    Rejected(String),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Frame could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Bidirectional message channel to the match host.
///
/// All calls are single in-flight per session from the core's
/// perspective; the implementation may pipeline internally.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a matchmaking request, returning the queue ticket.
    async fn matchmaker_add(
        &self,
        min_count: u32,
        max_count: u32,
    ) -> Result<String, TransportError>;

    /// Withdraw an outstanding matchmaking request. Best-effort.
    async fn matchmaker_remove(&self, ticket: &str) -> Result<(), TransportError>;

    /// Join a match by reference.
    async fn join(&self, match_ref: &str) -> Result<SessionHandle, TransportError>;

    /// Request a host-side leave.
    async fn leave(&self, match_id: &str) -> Result<(), TransportError>;

    /// Send an op-coded payload to the match.
    async fn send(
        &self,
        match_id: &str,
        op_code: OpCode,
        payload: String,
    ) -> Result<(), TransportError>;
}

/// Single-subscriber event source.
///
/// [`EventSlot::subscribe`] replaces, never stacks, the previous handler.
/// Events emitted while no handler is installed are dropped.
pub struct EventSlot<T> {
    handler: Mutex<Option<Box<dyn FnMut(T) + Send>>>,
}

impl<T> EventSlot<T> {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            handler: Mutex::new(None),
        }
    }

    /// Install a handler, replacing any previous one.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut slot = self.handler.lock().expect("event slot poisoned");
        if slot.is_some() {
            debug!("event slot subscriber replaced");
        }
        *slot = Some(Box::new(handler));
    }

    /// Remove the current handler, if any.
    pub fn clear(&self) {
        let mut slot = self.handler.lock().expect("event slot poisoned");
        *slot = None;
    }

    /// Deliver an event to the current handler. Returns false if the
    /// event was dropped because no handler is installed.
    pub fn emit(&self, event: T) -> bool {
        let mut slot = self.handler.lock().expect("event slot poisoned");
        match slot.as_mut() {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for EventSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
