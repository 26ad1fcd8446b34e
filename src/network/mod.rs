//! Networking
//!
//! Wire protocol, the transport seam, the websocket implementation of
//! it, and identity bootstrap.

pub mod auth;
pub mod protocol;
pub mod socket;
pub mod transport;

pub use protocol::{MatchSnapshot, OpCode};
pub use transport::{PushEvent, SessionHandle, Transport, TransportError};
