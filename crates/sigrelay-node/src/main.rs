//! sigrelay binary
//!
//! Rendezvous/signaling relay for peer connection bootstrap.

use sigrelay_node::{NodeConfig, RelayNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sigrelay=info,sigrelay_core=info,sigrelay_node=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("sigrelay starting");

    let config = NodeConfig::from_env()?;
    let node = RelayNode::new(config)?;
    node.run().await?;

    tracing::info!("sigrelay exiting");
    Ok(())
}
