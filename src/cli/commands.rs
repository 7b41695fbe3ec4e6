//! CLI commands for the ledger node
//!
//! Implements the command handlers behind the `ledger-node` binary.

use crate::api::{create_router, ApiState};
use crate::crypto::KeyPair;
use crate::network::{parse_peer_list, Node, NodeConfig};
use std::sync::Arc;
use std::time::Duration;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Build a node configuration from raw flag values
pub fn node_config(
    port: u16,
    peers: Option<&str>,
    owner_token: Option<String>,
    peer_timeout_secs: u64,
) -> NodeConfig {
    NodeConfig {
        port,
        peers: peers.map(parse_peer_list).unwrap_or_default(),
        owner_token: owner_token.filter(|t| !t.is_empty()),
        peer_timeout: Duration::from_secs(peer_timeout_secs),
    }
}

/// Run a ledger node until interrupted
pub async fn cmd_start(config: NodeConfig) -> CliResult<()> {
    let port = config.port;
    let node = Arc::new(Node::new(config)?);

    println!("🚀 Ledger node starting on http://localhost:{}", port);
    println!("🔑 Node public key:\n{}", node.info().public_key);
    if node.config().peers.is_empty() {
        println!("🌐 No peers configured");
    } else {
        println!("🌐 Peers: {:?}", node.config().peers);
    }
    if node.config().owner_token.is_none() {
        log::warn!("No owner token configured; wallet creation is disabled");
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    // Catch up with the network once the listener is up
    let startup = node.clone();
    tokio::spawn(async move {
        let report = startup.sync_with_peers().await;
        log::info!(
            "Startup sync done: adopted from {:?}, {} peer(s) failed",
            report.adopted_from,
            report.failed_peers.len()
        );
    });

    println!();
    println!("📖 Available endpoints:");
    println!("   GET  /health                    - Health check");
    println!("   GET  /node/info                 - Node info");
    println!("   GET  /chain                     - Full chain");
    println!("   GET  /chain/validate            - Validate chain");
    println!("   POST /chain/replace             - Offer a longer chain");
    println!("   POST /chain/sync                - Pull from peers");
    println!("   POST /blocks/create             - Append device event");
    println!("   POST /blocks/receive            - Accept peer block");
    println!("   POST /blocks/decrypt            - Decrypt block");
    println!("   GET  /blocks/latest-for-device  - Newest block for device");
    println!("   GET  /blocks/all                - List blocks");
    println!("   POST /wallets/create            - Create wallet (owner)");
    println!();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        println!("\n📴 Shutting down ledger node...");
        std::process::exit(0);
    });

    let app = create_router(ApiState { node });
    axum::serve(listener, app).await?;
    Ok(())
}

/// Print a fresh secp256k1 keypair as PEM
pub fn cmd_keygen() -> CliResult<()> {
    let key_pair = KeyPair::generate();

    println!("🔐 New author keypair");
    println!();
    print!("{}", key_pair.public_key_pem());
    print!("{}", key_pair.private_key_pem());
    println!();
    println!("   ⚠️  Keep the private key secret; the node never stores it.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_config_from_flags() {
        let config = node_config(
            3002,
            Some("http://localhost:3001/, http://localhost:3003"),
            Some(String::new()),
            2,
        );
        assert_eq!(config.port, 3002);
        assert_eq!(
            config.peers,
            vec!["http://localhost:3001", "http://localhost:3003"]
        );
        assert!(config.owner_token.is_none());
        assert_eq!(config.peer_timeout, Duration::from_secs(2));

        let config = node_config(3001, None, Some("12345".to_string()), 5);
        assert!(config.peers.is_empty());
        assert_eq!(config.owner_token.as_deref(), Some("12345"));
    }
}
