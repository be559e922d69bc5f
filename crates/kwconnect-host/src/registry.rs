//! Client session registry.
//!
//! One [`ClientSession`] per `clientID`, created by the `change-public-keys`
//! handshake and overwritten wholesale by a repeat handshake:
//!
//! - UNCONNECTED: no handshake seen for the id
//! - ESTABLISHED: keys exchanged; a new handshake re-enters ESTABLISHED
//!   with fresh keys and the old ones are gone
//!
//! Sessions are never evicted. `clientID` is chosen by the peer, so the map
//! grows with every distinct id a peer sends for the life of the process.
//! This matches the extension protocol as deployed and is a known limitation
//! for any transport reachable by more than one local peer.

use std::collections::HashMap;

use kwconnect_crypto::{decode_public_key, EphemeralKeypair, SessionKeys};
use tracing::info;

use crate::error::ProtocolError;

/// Per-client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Established,
}

/// Key material for one connected extension instance.
#[derive(Debug)]
pub struct ClientSession {
    client_id: String,
    keys: SessionKeys,
}

impl ClientSession {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }
}

/// Registry owning every client session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, ClientSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish (or re-establish) the session for `client_id`.
    ///
    /// Returns the fresh local public key in wire form. A malformed peer key
    /// fails before anything is stored, so an existing session survives.
    pub fn handshake(
        &mut self,
        client_id: &str,
        peer_public_key: &str,
    ) -> Result<String, ProtocolError> {
        let peer_public = decode_public_key(peer_public_key)?;
        let keys = SessionKeys::new(peer_public, EphemeralKeypair::generate());
        let local_public_key = keys.local_public_key_base64();
        let previous = self.state(client_id);

        self.sessions.insert(
            client_id.to_string(),
            ClientSession {
                client_id: client_id.to_string(),
                keys,
            },
        );

        info!(
            client_id,
            replaced = previous == ConnectionState::Established,
            sessions = self.sessions.len(),
            "browser extension client connected"
        );

        Ok(local_public_key)
    }

    /// Look up the session for a request's `clientID`.
    pub fn lookup(&self, client_id: Option<&str>) -> Result<&ClientSession, ProtocolError> {
        let client_id = match client_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(ProtocolError::MissingIdentifier),
        };

        self.sessions
            .get(client_id)
            .ok_or_else(|| ProtocolError::UnknownClient(client_id.to_string()))
    }

    pub fn state(&self, client_id: &str) -> ConnectionState {
        if self.sessions.contains_key(client_id) {
            ConnectionState::Established
        } else {
            ConnectionState::Unconnected
        }
    }

    /// Get session count
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
