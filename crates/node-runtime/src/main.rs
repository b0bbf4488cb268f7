//! Orb-Mesh node entry point.

use anyhow::Result;
use node_runtime::{Node, NodeConfig};
use shared_crypto::StaticKeyResolver;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    mesh_telemetry::init(&mesh_telemetry::LogConfig::default())?;

    info!("===========================================");
    info!("  Orb-Mesh Node Runtime v0.1.0");
    info!("===========================================");

    let config = NodeConfig::default();
    let listen_addr = config.listen_addr.clone();

    // Peer keys are registered out of band; an empty table accepts only
    // bearer-token requests until keys are added.
    let node = Node::build(config, Box::new(StaticKeyResolver::new())).await?;
    node.start().await?;

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!(addr = %listen_addr, "HTTP service listening");

    let router = node.router();
    tokio::select! {
        served = axum::serve(listener, router) => {
            served?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down gracefully...");
        }
    }

    node.stop().await;
    Ok(())
}
