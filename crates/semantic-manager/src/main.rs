use anyhow::{Context, Result};
use semantic_manager::app::{build_catalog, App};
use semantic_manager::stdio::run_stdio;
use semantic_manager::transport::InMemoryBroker;
use semantic_manager::Config;
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the stdio bridge
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let is_stdio = env::args().any(|arg| arg == "--stdio");
    let config = Config::from_env().context("Invalid configuration")?;

    let broker = Arc::new(InMemoryBroker::new());
    let catalog = Arc::new(build_catalog(&config));
    let app = App::start(&config, broker.clone(), catalog).await?;

    if is_stdio {
        info!("Serving requests from stdin");
        run_stdio(&app.rpc).await?;
    } else {
        info!(exchange = %config.exchange, "Waiting for requests, Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
    }

    app.shutdown().await;
    broker.close().await;
    Ok(())
}
