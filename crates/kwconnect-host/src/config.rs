//! Host configuration.

use std::net::SocketAddr;

use clap::{ArgAction, Parser};
use kwconnect_common::{Error, Result};

use crate::dispatcher::Dispatcher;
use crate::transport::TransportAdapter;

/// Default loopback listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:19455";

/// Default origin the host accepts messages from and replies to.
pub const DEFAULT_ORIGIN: &str = "app://kwconnect";

#[derive(Parser, Debug, Clone)]
#[command(name = "kwconnect-host")]
#[command(about = "Serves browser extension requests for the credential manager")]
pub struct HostConfig {
    /// TCP listen address (loopback only unless KWCONNECT_ALLOW_PUBLIC_BIND=1)
    #[arg(long, env = "KWCONNECT_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Origin messages must declare
    #[arg(long, env = "KWCONNECT_ORIGIN", default_value = DEFAULT_ORIGIN)]
    pub origin: String,

    /// Application version reported to extensions
    #[arg(long, env = "KWCONNECT_APP_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub app_version: String,

    /// Serve the browser extension (the application setting)
    #[arg(
        long,
        env = "KWCONNECT_BROWSER_EXTENSION",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub browser_extension: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl HostConfig {
    /// Reject configurations that would expose the protocol off-machine.
    pub fn validate(&self) -> Result<()> {
        if !self.listen.ip().is_loopback() && !env_bool("KWCONNECT_ALLOW_PUBLIC_BIND", false) {
            return Err(Error::config(format!(
                "refusing non-loopback bind {} without KWCONNECT_ALLOW_PUBLIC_BIND=1",
                self.listen
            )));
        }
        if self.origin.trim().is_empty() {
            return Err(Error::config("origin must not be empty"));
        }
        Ok(())
    }

    /// Build the adapter this configuration describes.
    pub fn build_adapter(&self) -> TransportAdapter {
        TransportAdapter::new(self.origin.clone(), Dispatcher::new(self.app_version.clone()))
    }
}

pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}
