//! Wire envelopes exchanged between the browser extension and the host.
//!
//! Every message is a flat JSON object carrying a `kwConnect` discriminator
//! (`"request"` or `"response"`). Field names follow the extension's
//! camelCase convention (`clientID`, `publicKey`).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Name of the discriminator field.
pub const DISCRIMINATOR_FIELD: &str = "kwConnect";

/// Discriminator value marking an inbound request.
pub const REQUEST_TAG: &str = "request";

/// Discriminator value marking an outbound response.
pub const RESPONSE_TAG: &str = "response";

/// Action names understood by the host.
pub mod action {
    pub const PING: &str = "ping";
    pub const CHANGE_PUBLIC_KEYS: &str = "change-public-keys";
    pub const GET_DATABASE_HASH: &str = "get-databasehash";

    /// Inner action of the encrypted `get-databasehash` reply.
    pub const HASH: &str = "hash";
}

/// Returns true if `value` carries the request discriminator.
pub fn is_request(value: &Value) -> bool {
    value.get(DISCRIMINATOR_FIELD).and_then(Value::as_str) == Some(REQUEST_TAG)
}

/// Field-present deserializer: any value, `null` included, is `Some`.
/// Only an absent field (via `default`) is `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Inbound request envelope.
///
/// All fields are optional on the wire; handlers decide which ones they
/// require and report the missing ones by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "kwConnect", default, skip_serializing_if = "Option::is_none")]
    pub kw_connect: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(rename = "clientID", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Peer's ephemeral public key (base64), `change-public-keys` only.
    #[serde(rename = "publicKey", default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    /// Base64 24-byte nonce for encrypted actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Base64 box ciphertext for encrypted actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Opaque payload echoed by `ping`. An explicit `null` is `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
}

impl Request {
    /// Start a request for `action`, already tagged with the discriminator.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            kw_connect: Some(REQUEST_TAG.to_string()),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// Outbound response envelope: the discriminator plus an action-specific body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "kwConnect")]
    pub kw_connect: String,

    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    /// Tag `body` as a response.
    pub fn new(body: ResponseBody) -> Self {
        Self {
            kw_connect: RESPONSE_TAG.to_string(),
            body,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ResponseBody::error(message))
    }

    /// The error message, if this is an error response.
    pub fn error_message(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Action-specific response fields.
///
/// Variant order matters for deserialization: the catch-all [`ResponseBody::Echo`]
/// must stay last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Error {
        error: String,
    },
    PublicKeys(PublicKeysResponse),
    Encrypted(EncryptedResponse),
    Echo {
        #[serde(
            default,
            deserialize_with = "present",
            skip_serializing_if = "Option::is_none"
        )]
        data: Option<Value>,
    },
}

impl ResponseBody {
    /// Error body; an empty message is reported as `Unknown error`.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        let error = if message.is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };
        Self::Error { error }
    }
}

/// Unencrypted reply to `change-public-keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeysResponse {
    pub action: String,
    pub version: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// Always the string `"true"`, for compatibility with existing extensions.
    pub success: String,
}

/// Encrypted reply envelope. `nonce` is the request nonce incremented by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResponse {
    pub action: String,
    #[serde(rename = "clientID", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub nonce: String,
    pub message: String,
}

/// Plaintext carried inside the `get-databasehash` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseHash {
    pub action: String,
    pub version: String,
    pub hash: String,
}
