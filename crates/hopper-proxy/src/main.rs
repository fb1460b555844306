mod config;
mod network;
mod pipeline;

use config::ProxyConfig;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Hopper proxy...");

    let config = Arc::new(ProxyConfig::load(Path::new("config/proxy.toml"))?);

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
    info!("Listening on {}:{}", config.bind, config.port);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("Accepted connection from {}", addr);
                let config = config.clone();
                tokio::spawn(async move {
                    network::handle_connection(stream, config).await;
                });
            }
            Err(e) => error!("Failed to accept connection: {}", e),
        }
    }
}
