//! Per-request protocol errors.
//!
//! Every variant is caught at the dispatcher and rendered into an
//! `{ error }` response; the `Display` strings are what the peer sees.

use kwconnect_crypto::EnvelopeError;
use thiserror::Error;

/// Errors raised while handling a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// `clientID` absent or empty.
    #[error("Empty clientID")]
    MissingIdentifier,

    /// No handshake has completed for this `clientID`.
    #[error("Client not connected: {0}")]
    UnknownClient(String),

    /// A field the action requires is absent or empty.
    #[error("Empty {0}")]
    MissingField(&'static str),

    /// The decrypted payload names a different action than the envelope.
    #[error("Bad action in decrypted payload")]
    ActionMismatch,

    #[error("Handler not found: {0}")]
    UnknownAction(String),

    /// Decode and authentication failures from the box envelope.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl ProtocolError {
    /// Coarse classification, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingIdentifier => "missing_identifier",
            Self::UnknownClient(_) => "unknown_client",
            Self::MissingField(_) => "missing_field",
            Self::ActionMismatch => "action_mismatch",
            Self::UnknownAction(_) => "unknown_action",
            Self::Envelope(EnvelopeError::Authentication) => "authentication",
            Self::Envelope(EnvelopeError::Decode(_)) => "decode",
            Self::Envelope(EnvelopeError::Encryption) => "encryption",
        }
    }
}
