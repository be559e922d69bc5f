//! Extension-side protocol client.
//!
//! Builds request messages and interprets responses the way a browser
//! extension does. Used by the `kwconnect` CLI and by tests; it never
//! touches the transport itself.

use kwconnect_common::{action, Request, Response, ResponseBody};
use kwconnect_crypto::{
    decode_nonce, decode_public_key, decrypt, incremented, seal, EnvelopeError, EphemeralKeypair,
    SessionKeys, NONCE_LENGTH,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use thiserror::Error;

/// Peer-side errors.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("handshake not complete")]
    NotConnected,

    /// The host answered with `{ error }`.
    #[error("host rejected request: {0}")]
    Rejected(String),

    #[error("unexpected response")]
    UnexpectedResponse,

    /// Reply nonce is not the request nonce plus one.
    #[error("response nonce mismatch")]
    NonceMismatch,

    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One extension instance talking to the host.
pub struct PeerClient {
    client_id: String,
    /// Our keypair until the handshake completes, then folded into `keys`.
    pending: Option<EphemeralKeypair>,
    keys: Option<SessionKeys>,
    host_version: Option<String>,
}

impl PeerClient {
    /// Create a client with a fresh keypair.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            pending: Some(EphemeralKeypair::generate()),
            keys: None,
            host_version: None,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.keys.is_some()
    }

    /// Version reported by the host during the handshake.
    pub fn host_version(&self) -> Option<&str> {
        self.host_version.as_deref()
    }

    /// `ping` request carrying `data`.
    pub fn ping_request(data: Value) -> Value {
        to_value(Request {
            data: Some(data),
            ..Request::new(action::PING)
        })
    }

    /// `change-public-keys` request with our public key.
    ///
    /// After [`complete_handshake`](Self::complete_handshake) this re-sends
    /// the same key; create a new client to rekey.
    pub fn handshake_request(&self) -> Value {
        let public_key = self
            .pending
            .as_ref()
            .map(EphemeralKeypair::public_key_base64)
            .or_else(|| {
                self.keys
                    .as_ref()
                    .map(|keys| kwconnect_crypto::encode_public_key(keys.local_public_key()))
            });

        to_value(Request {
            public_key,
            ..Request::new(action::CHANGE_PUBLIC_KEYS).with_client_id(&self.client_id)
        })
    }

    /// Take the host's public key from a `change-public-keys` response.
    pub fn complete_handshake(&mut self, response: impl IntoResponse) -> Result<(), PeerError> {
        let response = response.into_response()?;
        let reply = match response.body {
            ResponseBody::PublicKeys(reply) => reply,
            ResponseBody::Error { error } => return Err(PeerError::Rejected(error)),
            _ => return Err(PeerError::UnexpectedResponse),
        };
        if reply.success != "true" {
            return Err(PeerError::UnexpectedResponse);
        }

        let host_public = decode_public_key(&reply.public_key)?;
        let local = self.pending.take().ok_or(PeerError::UnexpectedResponse)?;
        self.keys = Some(SessionKeys::new(host_public, local));
        self.host_version = Some(reply.version);
        Ok(())
    }

    /// Encrypted request for `action` carrying `payload` under a random nonce.
    ///
    /// Returns the request and its nonce, needed to check the reply.
    pub fn encrypted_request(
        &self,
        action: &str,
        payload: Value,
    ) -> Result<(Value, [u8; NONCE_LENGTH]), PeerError> {
        let keys = self.keys.as_ref().ok_or(PeerError::NotConnected)?;

        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);

        let plaintext = serde_json::to_vec(&payload)?;
        let sealed = seal(keys, &nonce, &plaintext)?;

        let request = to_value(Request {
            nonce: Some(sealed.nonce),
            message: Some(sealed.message),
            ..Request::new(action).with_client_id(&self.client_id)
        });
        Ok((request, nonce))
    }

    /// Decrypt an encrypted reply to the request sent under `request_nonce`.
    pub fn open_response(
        &self,
        request_nonce: &[u8; NONCE_LENGTH],
        response: impl IntoResponse,
    ) -> Result<Value, PeerError> {
        let keys = self.keys.as_ref().ok_or(PeerError::NotConnected)?;
        let reply = match response.into_response()?.body {
            ResponseBody::Encrypted(reply) => reply,
            ResponseBody::Error { error } => return Err(PeerError::Rejected(error)),
            _ => return Err(PeerError::UnexpectedResponse),
        };

        if decode_nonce(&reply.nonce)? != incremented(request_nonce) {
            return Err(PeerError::NonceMismatch);
        }

        let plaintext = decrypt(keys, &reply.nonce, &reply.message)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

/// Responses arrive either typed (in-process) or as raw JSON (off the wire).
pub trait IntoResponse {
    fn into_response(self) -> Result<Response, PeerError>;
}

impl IntoResponse for Response {
    fn into_response(self) -> Result<Response, PeerError> {
        Ok(self)
    }
}

impl IntoResponse for Value {
    fn into_response(self) -> Result<Response, PeerError> {
        Ok(serde_json::from_value(self)?)
    }
}

fn to_value(request: Request) -> Value {
    // Request only holds strings and JSON values
    serde_json::to_value(request).unwrap_or(Value::Null)
}
