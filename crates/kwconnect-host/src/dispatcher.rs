//! Protocol dispatcher.
//!
//! Resolves the request's `action` into an [`Action`], runs the matching
//! handler and renders the result. Nothing escapes as an error: every
//! failure becomes an `{ error }` body, and every response carries the
//! response discriminator.

use std::fmt;
use std::str::FromStr;

use kwconnect_common::{action, Request, Response, ResponseBody};
use kwconnect_crypto::EnvelopeError;
use serde_json::Value;
use tracing::debug;

use crate::error::ProtocolError;
use crate::handlers::{self, DatabaseHashSource, PlaceholderHash};
use crate::registry::SessionRegistry;

/// Supported protocol actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Echo, no session needed
    Ping,
    /// Handshake, creates or replaces the session
    ChangePublicKeys,
    /// Encrypted, needs a session
    GetDatabaseHash,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Ping, Action::ChangePublicKeys, Action::GetDatabaseHash];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ping => action::PING,
            Action::ChangePublicKeys => action::CHANGE_PUBLIC_KEYS,
            Action::GetDatabaseHash => action::GET_DATABASE_HASH,
        }
    }
}

impl FromStr for Action {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownAction(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routes requests to handlers. Owns the session registry.
pub struct Dispatcher {
    registry: SessionRegistry,
    version: String,
    hashes: Box<dyn DatabaseHashSource>,
}

impl Dispatcher {
    /// Create a dispatcher reporting `version` to peers.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            version: version.into(),
            hashes: Box::new(PlaceholderHash),
        }
    }

    /// Replace the database hash source.
    pub fn with_hash_source(mut self, hashes: impl DatabaseHashSource) -> Self {
        self.hashes = Box::new(hashes);
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Handle one request message and produce its response.
    pub fn dispatch(&mut self, data: Value) -> Response {
        let body = match self.try_dispatch(data) {
            Ok(body) => body,
            Err(err) => {
                debug!(kind = err.kind(), "request failed: {}", err);
                ResponseBody::error(err.to_string())
            }
        };
        Response::new(body)
    }

    fn try_dispatch(&mut self, data: Value) -> Result<ResponseBody, ProtocolError> {
        let request: Request =
            serde_json::from_value(data).map_err(|_| EnvelopeError::Decode("request"))?;

        let action: Action = request
            .action
            .as_deref()
            .ok_or(ProtocolError::MissingField("action"))?
            .parse()?;

        debug!(%action, client_id = request.client_id.as_deref(), "dispatching request");

        match action {
            Action::Ping => Ok(handlers::ping(request)),
            Action::ChangePublicKeys => {
                handlers::change_public_keys(&mut self.registry, &self.version, &request)
            }
            Action::GetDatabaseHash => handlers::get_database_hash(
                &self.registry,
                &self.version,
                self.hashes.as_ref(),
                &request,
            ),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("version", &self.version)
            .field("sessions", &self.registry.len())
            .finish_non_exhaustive()
    }
}
