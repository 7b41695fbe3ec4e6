//! Ledger node
//!
//! The node owns the chain, the device-key and wallet registries, its own
//! keypair and the peer synchronizer. Every externally visible operation is a
//! method here; the HTTP layer only translates requests and responses.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::core::{now_timestamp, Block, Ledger, LedgerError};
use crate::crypto::{decrypt, encrypt, CipherError, EncryptedPayload, KeyError, KeyPair};
use crate::network::peer::{HttpTransport, PeerError, PeerTransport, DEFAULT_PEER_TIMEOUT};
use crate::network::sync::{PeerSync, SyncReport};
use crate::storage::DeviceKeyStore;
use crate::wallet::{generate_wallet_id, Wallet, WalletStore};

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Port the HTTP surface listens on
    pub port: u16,
    /// Peer base URLs, in sync order
    pub peers: Vec<String>,
    /// Token gating wallet creation; creation is disabled without one
    pub owner_token: Option<String>,
    /// Per-request timeout for peer calls
    pub peer_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            peers: Vec::new(),
            owner_token: None,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
        }
    }
}

/// Errors surfaced by node operations
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("{0}")]
    Validation(String),
    #[error("owner token required")]
    Unauthorized,
    #[error("wallet creation disabled: no owner token configured on this node")]
    WalletCreationDisabled,
    #[error("wallet not found: {0}")]
    WalletNotFound(String),
    #[error("wallet already exists: {0}")]
    WalletExists(String),
    #[error("no key for device {0} on this node")]
    NoDeviceKey(String),
    #[error("block {0} not found")]
    BlockNotFound(u64),
    #[error("no blocks found for device {0}")]
    NoBlocksForDevice(String),
    #[error("{0}")]
    Cipher(#[from] CipherError),
    #[error("invalid author key: {0}")]
    Key(#[from] KeyError),
    #[error("{0}")]
    Rejected(#[from] LedgerError),
}

/// Who signs a new block
#[derive(Debug, Clone)]
pub enum BlockAuthor {
    /// A wallet held by this node
    Wallet(String),
    /// Caller-supplied keys; the public key is embedded as given
    Keys {
        public_key_pem: String,
        private_key_pem: String,
    },
}

/// A device event to append
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub device_id: String,
    pub payload: String,
    pub author: BlockAuthor,
}

/// What a listing shows for one block's payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadView {
    /// Plaintext was not requested
    Encrypted,
    Plaintext(String),
    NoKeyForDevice,
    DecryptFailed(String),
}

/// One entry of a block listing
#[derive(Debug, Clone)]
pub struct BlockEntry {
    pub block: Block,
    pub view: PayloadView,
}

/// Public node information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub public_key: String,
    pub peers: Vec<String>,
    pub port: u16,
}

/// The ledger node
pub struct Node {
    config: NodeConfig,
    ledger: Arc<RwLock<Ledger>>,
    device_keys: DeviceKeyStore,
    wallets: WalletStore,
    node_keys: KeyPair,
    sync: Arc<PeerSync>,
}

impl Node {
    /// Create a node that reaches its peers over HTTP
    pub fn new(config: NodeConfig) -> Result<Self, PeerError> {
        let transport = Arc::new(HttpTransport::new(config.peer_timeout)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a node with a custom peer transport
    pub fn with_transport(config: NodeConfig, transport: Arc<dyn PeerTransport>) -> Self {
        Self::with_parts(
            config,
            Ledger::new(),
            DeviceKeyStore::in_memory(),
            WalletStore::in_memory(),
            transport,
        )
    }

    /// Create a node from explicit parts
    pub fn with_parts(
        config: NodeConfig,
        ledger: Ledger,
        device_keys: DeviceKeyStore,
        wallets: WalletStore,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        let ledger = Arc::new(RwLock::new(ledger));
        let sync = Arc::new(PeerSync::new(
            ledger.clone(),
            transport,
            config.peers.clone(),
        ));

        Self {
            config,
            ledger,
            device_keys,
            wallets,
            node_keys: KeyPair::generate(),
            sync,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        self.ledger.clone()
    }

    pub fn sync(&self) -> Arc<PeerSync> {
        self.sync.clone()
    }

    pub fn device_keys(&self) -> &DeviceKeyStore {
        &self.device_keys
    }

    pub fn wallets(&self) -> &WalletStore {
        &self.wallets
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            public_key: self.node_keys.public_key_pem(),
            peers: self.config.peers.clone(),
            port: self.config.port,
        }
    }

    /// Snapshot of the full chain
    pub async fn chain(&self) -> Vec<Block> {
        self.ledger.read().await.blocks().to_vec()
    }

    /// Validate the local chain; returns validity and blocks checked
    pub async fn validate(&self) -> (bool, usize) {
        let ledger = self.ledger.read().await;
        (ledger.is_valid(), ledger.len())
    }

    /// Encrypt, sign and append a device event, then broadcast it
    pub async fn create_block(&self, event: NewEvent) -> Result<Block, NodeError> {
        let (signer, author_public_key) = match event.author {
            BlockAuthor::Wallet(wallet_id) => {
                let wallet = self
                    .wallets
                    .get(&wallet_id)
                    .ok_or(NodeError::WalletNotFound(wallet_id))?;
                let public_key = wallet.public_key();
                (wallet.key_pair().clone(), public_key)
            }
            BlockAuthor::Keys {
                public_key_pem,
                private_key_pem,
            } => (KeyPair::from_private_key_pem(&private_key_pem)?, public_key_pem),
        };

        let key = self.device_keys.ensure(&event.device_id);
        let payload = encrypt(&event.payload, &key)?;

        // Tip read and append under one write lock so concurrent creators
        // never build on the same predecessor.
        let block = {
            let mut ledger = self.ledger.write().await;
            let block = sign_next(ledger.latest(), payload, &signer, author_public_key);
            ledger.append(block.clone())?;
            block
        };

        log::info!(
            "Appended block {} for device {}",
            block.index(),
            event.device_id
        );
        self.spawn_broadcast(block.clone());
        Ok(block)
    }

    /// Accept a block pushed by a peer
    pub async fn receive_block(&self, block: Block) -> Result<(), NodeError> {
        let index = block.index();
        let result = self.ledger.write().await.append(block);

        match result {
            Ok(()) => {
                log::info!("Accepted block {} from peer", index);
                Ok(())
            }
            Err(e) => {
                log::warn!("Rejected pushed block {}: {}", index, e);
                // The sender may be ahead of us; catch up in the background.
                self.spawn_resync();
                Err(e.into())
            }
        }
    }

    /// Adopt a chain pushed by a peer if it is longer and valid
    pub async fn replace_chain(&self, chain: Vec<Block>) -> Result<(), NodeError> {
        self.ledger.write().await.replace(chain)?;
        Ok(())
    }

    /// Decrypt the payload of block `index` with `device_id`'s key
    pub async fn decrypt_block(&self, index: u64, device_id: &str) -> Result<String, NodeError> {
        let ledger = self.ledger.read().await;
        let block = ledger.get(index).ok_or(NodeError::BlockNotFound(index))?;
        let key = self
            .device_keys
            .get(device_id)
            .ok_or_else(|| NodeError::NoDeviceKey(device_id.to_string()))?;

        Ok(decrypt(block.encrypted_payload(), &key)?)
    }

    /// Newest non-genesis block that `device_id`'s key opens
    pub async fn latest_for_device(&self, device_id: &str) -> Result<(Block, String), NodeError> {
        let key = self
            .device_keys
            .get(device_id)
            .ok_or_else(|| NodeError::NoDeviceKey(device_id.to_string()))?;

        let ledger = self.ledger.read().await;
        ledger
            .blocks()
            .iter()
            .skip(1)
            .rev()
            .filter(|block| block.encrypted_payload().is_complete())
            .find_map(|block| {
                decrypt(block.encrypted_payload(), &key)
                    .ok()
                    .map(|plaintext| (block.clone(), plaintext))
            })
            .ok_or_else(|| NodeError::NoBlocksForDevice(device_id.to_string()))
    }

    /// Every non-genesis block, optionally opened with `device_id`'s key
    pub async fn all_blocks(
        &self,
        device_id: Option<&str>,
        include_plaintext: bool,
    ) -> Vec<BlockEntry> {
        let key = match device_id {
            Some(id) if include_plaintext => Some(self.device_keys.get(id)),
            _ => None,
        };

        let ledger = self.ledger.read().await;
        ledger
            .blocks()
            .iter()
            .skip(1)
            .map(|block| {
                let view = match &key {
                    None => PayloadView::Encrypted,
                    Some(None) => PayloadView::NoKeyForDevice,
                    Some(Some(key)) => match decrypt(block.encrypted_payload(), key) {
                        Ok(plaintext) => PayloadView::Plaintext(plaintext),
                        Err(e) => PayloadView::DecryptFailed(e.to_string()),
                    },
                };
                BlockEntry {
                    block: block.clone(),
                    view,
                }
            })
            .collect()
    }

    /// Create a wallet if one of `presented_tokens` is the owner token
    pub fn create_wallet(
        &self,
        presented_tokens: &[&str],
        wallet_id: Option<String>,
        label: Option<String>,
    ) -> Result<Wallet, NodeError> {
        let owner_token = self
            .config
            .owner_token
            .as_deref()
            .ok_or(NodeError::WalletCreationDisabled)?;
        if !presented_tokens.iter().any(|t| *t == owner_token) {
            return Err(NodeError::Unauthorized);
        }

        let wallet_id = wallet_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_wallet_id);
        let wallet = self
            .wallets
            .create(wallet_id.clone(), label)
            .ok_or_else(|| NodeError::WalletExists(wallet_id.clone()))?;

        log::info!("Created wallet {}", wallet_id);
        Ok(wallet)
    }

    /// Run one pull pass against every peer
    pub async fn sync_with_peers(&self) -> SyncReport {
        self.sync.pull_and_adopt().await
    }

    fn spawn_broadcast(&self, block: Block) {
        if self.config.peers.is_empty() {
            return;
        }
        let sync = self.sync.clone();
        tokio::spawn(async move {
            sync.broadcast(&block).await;
        });
    }

    fn spawn_resync(&self) {
        if self.config.peers.is_empty() {
            return;
        }
        let sync = self.sync.clone();
        tokio::spawn(async move {
            sync.resync().await;
        });
    }
}

/// Build the block that extends `latest`, signed by `signer`
fn sign_next(
    latest: &Block,
    payload: EncryptedPayload,
    signer: &KeyPair,
    author_public_key: String,
) -> Block {
    let index = latest.index() + 1;
    let prev_hash = latest.hash().to_string();
    let timestamp = now_timestamp();
    let content = Block::compute_signed_content(index, &timestamp, &prev_hash, &payload, 0);
    let signature = signer.sign(content.as_bytes());

    Block::new(
        index,
        timestamp,
        prev_hash,
        payload,
        author_public_key,
        signature,
        0,
    )
}
