//! Action handlers.
//!
//! Each handler takes the parsed request and returns the response body or a
//! [`ProtocolError`]; the dispatcher renders errors.

use kwconnect_common::{
    action, DatabaseHash, EncryptedResponse, PublicKeysResponse, Request, ResponseBody,
};
use kwconnect_crypto::{decode_nonce, decrypt, encrypt, EnvelopeError, NONCE_LENGTH};
use serde::Serialize;
use serde_json::Value;

use crate::error::ProtocolError;
use crate::registry::{ClientSession, SessionRegistry};

/// Source of the database hash reported by `get-databasehash`.
pub trait DatabaseHashSource: Send + 'static {
    fn database_hash(&self) -> String;
}

/// Reports a fixed placeholder until the vault is wired in.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderHash;

impl PlaceholderHash {
    pub const VALUE: &'static str = "TODO";
}

impl DatabaseHashSource for PlaceholderHash {
    fn database_hash(&self) -> String {
        Self::VALUE.to_string()
    }
}

/// `ping`: echo `data` untouched.
pub(crate) fn ping(request: Request) -> ResponseBody {
    ResponseBody::Echo { data: request.data }
}

/// `change-public-keys`: run the handshake and hand back our public key.
pub(crate) fn change_public_keys(
    registry: &mut SessionRegistry,
    version: &str,
    request: &Request,
) -> Result<ResponseBody, ProtocolError> {
    let client_id = non_empty(request.client_id.as_deref()).ok_or(ProtocolError::MissingIdentifier)?;
    let peer_public_key =
        non_empty(request.public_key.as_deref()).ok_or(ProtocolError::MissingField("publicKey"))?;

    let public_key = registry.handshake(client_id, peer_public_key)?;

    Ok(ResponseBody::PublicKeys(PublicKeysResponse {
        action: action::CHANGE_PUBLIC_KEYS.to_string(),
        version: version.to_string(),
        public_key,
        success: "true".to_string(),
    }))
}

/// `get-databasehash`: encrypted request, encrypted reply carrying the hash.
pub(crate) fn get_database_hash(
    registry: &SessionRegistry,
    version: &str,
    hashes: &dyn DatabaseHashSource,
    request: &Request,
) -> Result<ResponseBody, ProtocolError> {
    let session = registry.lookup(request.client_id.as_deref())?;
    let (nonce, _payload) = decrypt_request(session, request)?;

    let reply = DatabaseHash {
        action: action::HASH.to_string(),
        version: version.to_string(),
        hash: hashes.database_hash(),
    };

    encrypt_response(session, request, nonce, &reply)
}

/// Open an encrypted request and check that its payload names the same
/// action as the envelope.
///
/// Returns the request nonce (needed to derive the reply nonce) and the
/// decoded payload.
pub(crate) fn decrypt_request(
    session: &ClientSession,
    request: &Request,
) -> Result<([u8; NONCE_LENGTH], Value), ProtocolError> {
    let nonce = non_empty(request.nonce.as_deref()).ok_or(ProtocolError::MissingField("nonce"))?;
    let message =
        non_empty(request.message.as_deref()).ok_or(ProtocolError::MissingField("message"))?;

    let plaintext = decrypt(session.keys(), nonce, message)?;
    let payload: Value =
        serde_json::from_slice(&plaintext).map_err(|_| EnvelopeError::Decode("message"))?;

    let inner_action = payload.get("action").and_then(Value::as_str);
    if inner_action.is_none() || inner_action != request.action.as_deref() {
        return Err(ProtocolError::ActionMismatch);
    }

    Ok((decode_nonce(nonce)?, payload))
}

/// Seal `payload` as the reply to `request`, under the request nonce plus one.
pub(crate) fn encrypt_response<T: Serialize>(
    session: &ClientSession,
    request: &Request,
    request_nonce: [u8; NONCE_LENGTH],
    payload: &T,
) -> Result<ResponseBody, ProtocolError> {
    let plaintext = serde_json::to_vec(payload).map_err(|_| EnvelopeError::Encryption)?;
    let sealed = encrypt(session.keys(), request_nonce, &plaintext)?;

    Ok(ResponseBody::Encrypted(EncryptedResponse {
        action: request.action.clone().unwrap_or_default(),
        client_id: Some(session.client_id().to_string()),
        nonce: sealed.nonce,
        message: sealed.message,
    }))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
