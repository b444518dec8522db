//! Thin wrapper binary for running the pool coordinator as a standalone
//! server process.

use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

use agentpool_coordinator::Coordinator;
use agentpool_shared::config::AgentPoolConfig;
use agentpool_shared::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    info!("starting agentpool coordinator");
    info!(version = env!("CARGO_PKG_VERSION"));

    let config = AgentPoolConfig::from_env()?;
    let coordinator = Coordinator::bootstrap(config).await?;
    coordinator.start();

    info!("coordinator started, press Ctrl+C to shut down");
    shutdown_signal().await;

    info!("shutdown signal received, stopping coordinator");
    match tokio::time::timeout(Duration::from_secs(30), coordinator.stop()).await {
        Ok(()) => info!("coordinator stopped"),
        Err(_) => error!("graceful shutdown timed out, forcing exit"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
