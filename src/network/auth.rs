//! Identity Bootstrap
//!
//! Device-scoped identity and session-token handling. The host issues a
//! JWT session token at authenticate time; the client does not verify
//! the signature (the host signed it), it only reads the claims to learn
//! its own user id.

use std::fs;
use std::path::Path;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Client connection configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Host name or address.
    pub host: String,
    /// Realtime channel port.
    pub port: u16,
    /// Use TLS for the websocket.
    pub ssl: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7350,
            ssl: false,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("GRID_DUEL_HOST").unwrap_or(defaults.host),
            port: std::env::var("GRID_DUEL_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            ssl: std::env::var("GRID_DUEL_SSL")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.ssl),
        }
    }

    /// Websocket URL carrying the session token.
    pub fn socket_url(&self, token: &str) -> String {
        let scheme = if self.ssl { "wss" } else { "ws" };
        format!("{}://{}:{}/ws?token={}", scheme, self.host, self.port, token)
    }
}

/// Claims carried by the host-issued session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User identifier assigned by the host.
    pub uid: String,
    /// Host-side username, if any.
    #[serde(default)]
    pub usn: Option<String>,
    /// Expiry timestamp (Unix seconds).
    #[serde(default)]
    pub exp: u64,
}

/// Identity errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Device id could not be read or persisted.
    #[error("device id storage: {0}")]
    Storage(#[from] std::io::Error),

    /// Session token could not be decoded.
    #[error("session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Get or create the persistent device identifier.
///
/// Created on first run, stored at `path`, reused thereafter. The id is
/// opaque to the host; it only has to be stable per device.
pub fn get_or_create_device_id(path: &Path) -> Result<String, AuthError> {
    if let Ok(existing) = fs::read_to_string(path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            debug!("Using existing device id: {}", existing);
            return Ok(existing.to_string());
        }
    }

    let device_id = format!("device-{}", uuid::Uuid::new_v4());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &device_id)?;
    info!("Created new device id: {}", device_id);
    Ok(device_id)
}

/// Read the claims out of a session token without verifying the
/// signature. Expired tokens are rejected.
pub fn decode_session_token(token: &str) -> Result<SessionClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();

    let data = decode::<SessionClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}
