//! Transport adapter.
//!
//! The only way in or out for protocol messages. Before anything is parsed,
//! a message must:
//! 1. come from the expected origin
//! 2. come from the same local context (the socket binding maps this to a
//!    loopback peer)
//! 3. carry `kwConnect: "request"`
//!
//! Messages failing any of these are dropped without a reply. Everything
//! else gets exactly one response, addressed back to the expected origin.
//!
//! The origin is taken from the binding as declared by the sender. Over the
//! socket binding it is self-reported, so the source check is what keeps
//! other machines out; the origin check does not authenticate a local peer.
//!
//! The adapter owns the dispatcher (and with it the session registry) and
//! runs as a single task: each message is handled to completion before the
//! next one is taken off the channel.

use kwconnect_common::{is_request, Response};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;

/// Where a message came from, as established by the transport binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// Same machine / same window context.
    Local,
    /// Anything else.
    Foreign,
}

/// A message as received from the transport, not yet trusted.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub origin: String,
    pub source: MessageSource,
    pub data: Value,
}

/// A reply ready to be posted.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub origin: String,
    pub data: Value,
}

/// An inbound message plus the slot its reply goes to.
#[derive(Debug)]
pub struct InboundEvent {
    pub message: InboundMessage,
    pub reply: oneshot::Sender<Option<OutboundMessage>>,
}

/// Origin filter in front of the dispatcher.
#[derive(Debug)]
pub struct TransportAdapter {
    expected_origin: String,
    dispatcher: Dispatcher,
}

impl TransportAdapter {
    pub fn new(expected_origin: impl Into<String>, dispatcher: Dispatcher) -> Self {
        Self {
            expected_origin: expected_origin.into(),
            dispatcher,
        }
    }

    pub fn expected_origin(&self) -> &str {
        &self.expected_origin
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one inbound message. `None` means the message was dropped.
    pub fn handle(&mut self, message: InboundMessage) -> Option<OutboundMessage> {
        if message.origin != self.expected_origin {
            debug!(origin = %message.origin, "dropping message from unexpected origin");
            return None;
        }
        if message.source != MessageSource::Local {
            debug!(origin = %message.origin, "dropping message from foreign source");
            return None;
        }
        if !is_request(&message.data) {
            debug!("dropping message without request discriminator");
            return None;
        }

        let response = self.dispatcher.dispatch(message.data);

        Some(OutboundMessage {
            origin: self.expected_origin.clone(),
            data: render(&response),
        })
    }

    /// Serve events until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<InboundEvent>) {
        info!(origin = %self.expected_origin, "transport adapter running");

        while let Some(event) = events.recv().await {
            let reply = self.handle(event.message);
            if event.reply.send(reply).is_err() {
                debug!("requester went away before the reply was ready");
            }
        }

        info!(
            sessions = self.dispatcher.registry().len(),
            "transport adapter stopped"
        );
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self, capacity: usize) -> (AdapterHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(self.run(rx));
        (AdapterHandle { events: tx }, task)
    }
}

/// Cloneable handle for submitting messages to a running adapter.
#[derive(Debug, Clone)]
pub struct AdapterHandle {
    events: mpsc::Sender<InboundEvent>,
}

impl AdapterHandle {
    /// Submit a message and wait for its reply.
    ///
    /// Returns `None` if the message was dropped or the adapter has stopped.
    pub async fn submit(&self, message: InboundMessage) -> Option<OutboundMessage> {
        let (reply, rx) = oneshot::channel();
        self.events.send(InboundEvent { message, reply }).await.ok()?;
        rx.await.ok().flatten()
    }
}

fn render(response: &Response) -> Value {
    serde_json::to_value(response)
        .unwrap_or_else(|_| json!({ "kwConnect": "response", "error": "Unknown error" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "app://kwconnect";

    fn adapter() -> TransportAdapter {
        TransportAdapter::new(ORIGIN, Dispatcher::new("1.0.0"))
    }

    fn local(data: Value) -> InboundMessage {
        InboundMessage {
            origin: ORIGIN.to_string(),
            source: MessageSource::Local,
            data,
        }
    }

    #[test]
    fn test_replies_to_local_requests() {
        let mut adapter = adapter();
        let reply = adapter
            .handle(local(json!({ "kwConnect": "request", "action": "ping", "data": "x" })))
            .unwrap();

        assert_eq!(reply.origin, ORIGIN);
        assert_eq!(reply.data, json!({ "kwConnect": "response", "data": "x" }));
    }

    #[test]
    fn test_drops_wrong_origin() {
        let mut adapter = adapter();
        let mut message = local(json!({ "kwConnect": "request", "action": "ping" }));
        message.origin = "https://evil.example".to_string();

        assert!(adapter.handle(message).is_none());
    }

    #[test]
    fn test_drops_foreign_source() {
        let mut adapter = adapter();
        let mut message = local(json!({ "kwConnect": "request", "action": "ping" }));
        message.source = MessageSource::Foreign;

        assert!(adapter.handle(message).is_none());
    }

    #[test]
    fn test_drops_non_requests() {
        let mut adapter = adapter();

        assert!(adapter.handle(local(json!({ "action": "ping" }))).is_none());
        assert!(adapter
            .handle(local(json!({ "kwConnect": "response", "action": "ping" })))
            .is_none());
        assert!(adapter.handle(local(json!("ping"))).is_none());
    }

    #[test]
    fn test_errors_are_replies() {
        let mut adapter = adapter();
        let reply = adapter
            .handle(local(json!({ "kwConnect": "request", "action": "nope" })))
            .unwrap();

        assert_eq!(
            reply.data,
            json!({ "kwConnect": "response", "error": "Handler not found: nope" })
        );
    }

    #[test]
    fn test_dropped_messages_do_not_touch_sessions() {
        let mut adapter = adapter();
        let peer = crate::peer::PeerClient::new("abc");
        let mut message = local(peer.handshake_request());
        message.origin = "https://evil.example".to_string();

        assert!(adapter.handle(message).is_none());
        assert!(adapter.dispatcher().registry().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_adapter_serves_handle() {
        let (handle, task) = adapter().spawn(8);

        let reply = handle
            .submit(local(json!({ "kwConnect": "request", "action": "ping", "data": 1 })))
            .await
            .unwrap();
        assert_eq!(reply.data["data"], 1);

        let dropped = handle
            .submit(local(json!({ "kwConnect": "response" })))
            .await;
        assert!(dropped.is_none());

        drop(handle);
        task.await.unwrap();
    }
}
