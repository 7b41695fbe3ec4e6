//! Wire types shared by the node's HTTP surface and its peer client
//!
//! Peers talk to each other through the same JSON routes dashboards use, so
//! the request and response bodies for those routes live here.

use crate::core::Block;
use serde::{Deserialize, Serialize};

/// `GET /chain` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl ChainResponse {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }
}

/// `POST /blocks/receive` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveBlockRequest {
    pub block: Option<Block>,
}

/// `POST /chain/replace` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceChainRequest {
    pub chain: Option<Vec<Block>>,
}

/// Outcome of a peer push
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckResponse {
    pub fn accepted() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}
