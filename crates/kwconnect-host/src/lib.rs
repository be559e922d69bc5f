//! kwconnect host: serves browser extension requests for the credential manager.
//!
//! Message path, outermost first:
//!
//! ```text
//! socket::serve          loopback TCP, one JSON frame per line
//!   TransportAdapter     origin / source / discriminator filter (drops silently)
//!     Dispatcher         action -> handler, errors -> { error }
//!       SessionRegistry  clientID -> ephemeral keys
//!       kwconnect_crypto box envelopes, reply nonce = request nonce + 1
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod peer;
pub mod registry;
pub mod socket;
pub mod transport;

pub use config::HostConfig;
pub use connector::Connector;
pub use dispatcher::{Action, Dispatcher};
pub use error::ProtocolError;
pub use handlers::{DatabaseHashSource, PlaceholderHash};
pub use peer::{PeerClient, PeerError};
pub use registry::{ClientSession, ConnectionState, SessionRegistry};
pub use transport::{InboundMessage, MessageSource, OutboundMessage, TransportAdapter};
