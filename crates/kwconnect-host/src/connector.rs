//! Browser extension connector lifecycle.
//!
//! The adapter task (and with it the session registry) lives as long as the
//! connector. The listener comes and goes with the "browser extension"
//! setting: stopping closes the socket along with every open connection,
//! starting again re-binds it, and sessions established before the stop
//! remain valid.

use std::net::SocketAddr;

use kwconnect_common::Result;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::socket;
use crate::transport::{AdapterHandle, TransportAdapter};

/// Capacity of the adapter's inbound queue.
const EVENT_QUEUE_CAPACITY: usize = 64;

struct Listener {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

/// Owns the adapter task and, while enabled, the socket listener.
pub struct Connector {
    listen: SocketAddr,
    adapter: AdapterHandle,
    adapter_task: JoinHandle<()>,
    listener: Option<Listener>,
}

impl Connector {
    /// Spawn the adapter. Must be called from within a tokio runtime.
    pub fn new(listen: SocketAddr, adapter: TransportAdapter) -> Self {
        let (handle, adapter_task) = adapter.spawn(EVENT_QUEUE_CAPACITY);
        Self {
            listen,
            adapter: handle,
            adapter_task,
            listener: None,
        }
    }

    /// Handle for submitting messages directly, bypassing the socket.
    pub fn adapter(&self) -> &AdapterHandle {
        &self.adapter
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    /// Address the listener is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|l| l.addr)
    }

    /// Bind the listener. Starting a running connector is a no-op.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.addr);
        }

        let listener = TcpListener::bind(self.listen).await?;
        let addr = listener.local_addr()?;
        let adapter = self.adapter.clone();

        let task = tokio::spawn(async move {
            if let Err(e) = socket::serve(listener, adapter).await {
                warn!("browser extension listener failed: {}", e);
            }
        });

        info!("browser extension connector started on {}", addr);
        self.listener = Some(Listener { addr, task });
        Ok(addr)
    }

    /// Close the listener and its connections. Sessions are kept.
    pub fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.task.abort();
            info!("browser extension connector stopped");
        }
    }

    /// Follow the "browser extension" setting.
    pub async fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            self.start().await?;
        } else {
            self.stop();
        }
        Ok(())
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        self.stop();
        self.adapter_task.abort();
    }
}
