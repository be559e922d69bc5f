#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use kwconnect_host::{Connector, HostConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = HostConfig::parse();
    config.validate()?;

    kwconnect_common::init_tracing_with_default(&config.log_level);
    info!("Starting kwconnect-host v{}", env!("CARGO_PKG_VERSION"));

    let mut connector = Connector::new(config.listen, config.build_adapter());
    connector.set_enabled(config.browser_extension).await?;
    if !connector.is_running() {
        info!("browser extension support disabled; not listening");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    connector.stop();

    Ok(())
}
