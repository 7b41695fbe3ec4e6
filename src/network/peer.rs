//! Peer transport for chain synchronization
//!
//! Peers are other ledger nodes, addressed by base URL. The transport is a
//! trait so sync logic can run against real HTTP peers or, in tests, against
//! nodes living in the same process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::core::Block;
use crate::network::message::{ChainResponse, ReceiveBlockRequest};

/// Default per-request timeout for peer calls
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Peer communication errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },
    #[error("Peer {peer} answered with status {status}")]
    Status { peer: String, status: u16 },
    #[error("Peer {peer} sent an undecodable response: {reason}")]
    Decode { peer: String, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Request/response access to peer nodes
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Push one block to a peer; `Ok(false)` when the peer rejected it
    async fn send_block(&self, peer: &str, block: &Block) -> Result<bool, PeerError>;

    /// Fetch a peer's full chain
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError>;
}

/// Normalize a configured peer address into a base URL
pub fn base_url(peer: &str) -> &str {
    peer.trim().trim_end_matches('/')
}

/// Split a comma-separated peer list, dropping blank entries
pub fn parse_peer_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(base_url)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Transport speaking the node's own JSON routes over HTTP
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, PeerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PeerError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

fn unreachable(peer: &str, err: reqwest::Error) -> PeerError {
    PeerError::Unreachable {
        peer: peer.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn send_block(&self, peer: &str, block: &Block) -> Result<bool, PeerError> {
        let url = format!("{}/blocks/receive", base_url(peer));
        let body = ReceiveBlockRequest {
            block: Some(block.clone()),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::BAD_REQUEST => Ok(false),
            status => Err(PeerError::Status {
                peer: peer.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError> {
        let url = format!("{}/chain", base_url(peer));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;

        if !response.status().is_success() {
            return Err(PeerError::Status {
                peer: peer.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: ChainResponse = response.json().await.map_err(|e| PeerError::Decode {
            peer: peer.to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_peer_list() {
        let peers = parse_peer_list(" http://localhost:3002/, ,http://10.0.0.5:3001 ");
        assert_eq!(peers, vec!["http://localhost:3002", "http://10.0.0.5:3001"]);
        assert!(parse_peer_list("").is_empty());
    }

    #[test]
    fn test_base_url_trims_slashes() {
        assert_eq!(base_url("http://peer:3001///"), "http://peer:3001");
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_an_error() {
        let transport = HttpTransport::new(Duration::from_millis(500)).unwrap();
        // Port 9 (discard) on loopback is closed on test machines
        let result = transport.fetch_chain("http://127.0.0.1:9").await;
        assert!(matches!(result, Err(PeerError::Unreachable { .. })));
    }
}
