//! Thin process entrypoint: boots a [`device_mesh_node::Node`] from
//! environment configuration and idles until asked to shut down. Anything
//! more — registering real devices, opening peer links — is left to an
//! embedder; this binary exists to prove the crate boots standalone.

use std::sync::Arc;

use device_mesh_node::{Node, NodeConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = NodeConfig::builder()
        .default_domain(std::env::var("NODE_DEFAULT_DOMAIN").unwrap_or_else(|_| ".".to_string()))
        .claim_unowned_domains(claims_unowned_domains_from_env())
        .build();

    let node: Arc<Node> = Node::new(config);
    tracing::info!(
        default_domain = %node.config().default_domain,
        claim_unowned_domains = node.config().claim_unowned_domains,
        "node runner started, awaiting shutdown signal"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, exiting");
    Ok(())
}

fn claims_unowned_domains_from_env() -> bool {
    match std::env::var("NODE_CLAIM_UNOWNED_DOMAINS") {
        Ok(value) => value != "0" && value.to_lowercase() != "false",
        Err(_) => true,
    }
}
