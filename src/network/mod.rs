//! Peer networking module
//!
//! Keeps a node's chain in step with its peers.
//!
//! # Features
//! - Ledger node service owning chain, key stores and wallets
//! - Block broadcast to every configured peer
//! - Pull-and-adopt chain synchronization
//! - Pluggable peer transport (HTTP by default)

pub mod message;
pub mod node;
pub mod peer;
pub mod sync;

pub use message::{AckResponse, ChainResponse, ReceiveBlockRequest, ReplaceChainRequest};
pub use node::{
    BlockAuthor, BlockEntry, NewEvent, Node, NodeConfig, NodeError, NodeInfo, PayloadView,
};
pub use peer::{
    parse_peer_list, HttpTransport, PeerError, PeerTransport, DEFAULT_PEER_TIMEOUT,
};
pub use sync::{PeerSync, SyncReport};
