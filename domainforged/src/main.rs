mod broadcast;
mod config;
mod daemon;
mod error;
mod mdns;
mod net;
mod proxy;
mod registry;
mod server;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use mdns_sd::ServiceDaemon;
use anyhow::{Context, Result};
use shared::protocol::DEFAULT_CONFIG_PATH;
use crate::config::Config;
use crate::daemon::{shutdown_signal, Daemon};
use crate::mdns::advertise::MdnsAdvertiser;
use crate::net::SystemResolver;
use crate::proxy::client::HttpRouteSync;
use crate::registry::Registry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("domainforged=info"))
        )
        .init();

    tracing::info!("Starting domainforged");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    // Create mDNS daemon, optionally bound to one interface
    let mdns_daemon = ServiceDaemon::new()
        .context("Failed to create mDNS daemon")?;
    if let Some(interface) = &config.mdns.interface {
        mdns_daemon
            .disable_interface(mdns_sd::IfKind::All)
            .context("Failed to disable default interfaces")?;
        mdns_daemon
            .enable_interface(interface.as_str())
            .with_context(|| format!("Failed to enable interface {}", interface))?;
    }

    let routes = Arc::new(
        HttpRouteSync::new(&config.proxy.admin_endpoint, config.proxy.request_timeout())
            .context("Failed to build reverse proxy client")?,
    );
    tracing::info!("Using reverse proxy admin API at {}", routes.endpoint());

    let registry = Arc::new(Registry::new(
        Arc::new(MdnsAdvertiser::new(mdns_daemon.clone())),
        routes.clone(),
        Arc::new(SystemResolver::new(config.mdns.interface.clone())),
        &config.mdns,
    ));

    let daemon = Daemon::bind(config, registry, routes.as_ref()).await?;
    let result = daemon.run(shutdown_signal()).await;

    // Shutdown mDNS daemon
    if let Err(e) = mdns_daemon.shutdown() {
        tracing::error!("Failed to shutdown mDNS daemon: {}", e);
    }

    tracing::info!("Shutdown complete");
    result
}
