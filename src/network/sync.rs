//! Chain synchronization with peers
//!
//! Pushes newly appended blocks to every configured peer and pulls peer
//! chains, adopting one whenever the ledger's replacement rule accepts it.
//! Peer calls run concurrently and never hold the chain lock.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;

use crate::core::{Block, Ledger};
use crate::network::peer::PeerTransport;

/// Outcome of one pull pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Peers whose chain was adopted, in adoption order
    pub adopted_from: Vec<String>,
    /// Peers that could not be reached or answered garbage
    pub failed_peers: Vec<String>,
}

/// Chain synchronization manager
pub struct PeerSync {
    ledger: Arc<RwLock<Ledger>>,
    transport: Arc<dyn PeerTransport>,
    peers: Vec<String>,
    syncing: RwLock<bool>,
}

impl PeerSync {
    pub fn new(
        ledger: Arc<RwLock<Ledger>>,
        transport: Arc<dyn PeerTransport>,
        peers: Vec<String>,
    ) -> Self {
        Self {
            ledger,
            transport,
            peers,
            syncing: RwLock::new(false),
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Deliver `block` to every peer; returns how many accepted it
    pub async fn broadcast(&self, block: &Block) -> usize {
        let deliveries = self.peers.iter().map(|peer| async move {
            match self.transport.send_block(peer, block).await {
                Ok(true) => true,
                Ok(false) => {
                    log::warn!("Peer {} rejected block {}", peer, block.index());
                    false
                }
                Err(e) => {
                    log::warn!("Failed to broadcast block {} to {}: {}", block.index(), peer, e);
                    false
                }
            }
        });

        let accepted = join_all(deliveries)
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count();
        log::debug!(
            "Block {} delivered to {}/{} peers",
            block.index(),
            accepted,
            self.peers.len()
        );
        accepted
    }

    /// Run a pull pass unless one is already in progress.
    ///
    /// Returns `None` when the call was folded into the running pass.
    pub async fn resync(&self) -> Option<SyncReport> {
        let mut syncing = self.syncing.write().await;
        if *syncing {
            log::debug!("Resync already in progress");
            return None;
        }
        *syncing = true;
        drop(syncing);

        let report = self.pull_and_adopt().await;
        *self.syncing.write().await = false;
        Some(report)
    }

    /// Fetch every peer's chain and adopt any that is longer and valid.
    ///
    /// Fetches run concurrently; candidates are then offered to the ledger in
    /// configuration order, each compared against the chain as updated by
    /// the peers before it.
    pub async fn pull_and_adopt(&self) -> SyncReport {
        let fetches = self
            .peers
            .iter()
            .map(|peer| async move { (peer, self.transport.fetch_chain(peer).await) });
        let results = join_all(fetches).await;

        let mut report = SyncReport::default();
        for (peer, result) in results {
            let chain = match result {
                Ok(chain) => chain,
                Err(e) => {
                    log::warn!("Skipping peer {} this pass: {}", peer, e);
                    report.failed_peers.push(peer.clone());
                    continue;
                }
            };

            let mut ledger = self.ledger.write().await;
            if chain.len() <= ledger.len() {
                log::debug!(
                    "Peer {} chain not longer ({} vs {})",
                    peer,
                    chain.len(),
                    ledger.len()
                );
                continue;
            }

            match ledger.replace(chain) {
                Ok(()) => {
                    log::info!("Replaced chain with peer {}", peer);
                    report.adopted_from.push(peer.clone());
                }
                Err(e) => log::warn!("Did not adopt chain from {}: {}", peer, e),
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt, EncryptionKey, KeyPair};
    use crate::network::peer::PeerError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Peers backed by ledgers in this process
    #[derive(Default)]
    struct LocalPeers {
        ledgers: HashMap<String, Arc<RwLock<Ledger>>>,
        delays: HashMap<String, Duration>,
        fetches: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl LocalPeers {
        async fn lag(&self, peer: &str) {
            if let Some(delay) = self.delays.get(peer) {
                tokio::time::sleep(*delay).await;
            }
        }
    }

    #[async_trait]
    impl PeerTransport for LocalPeers {
        async fn send_block(&self, peer: &str, block: &Block) -> Result<bool, PeerError> {
            self.lag(peer).await;
            let ledger = self.ledgers.get(peer).ok_or_else(|| PeerError::Unreachable {
                peer: peer.to_string(),
                reason: "no such peer".to_string(),
            })?;
            let accepted = ledger.write().await.append(block.clone()).is_ok();
            Ok(accepted)
        }

        async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.lag(peer).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let ledger = self.ledgers.get(peer).ok_or_else(|| PeerError::Unreachable {
                peer: peer.to_string(),
                reason: "no such peer".to_string(),
            })?;
            let chain = ledger.read().await.blocks().to_vec();
            Ok(chain)
        }
    }

    fn extend(ledger: &mut Ledger, events: usize) {
        let author = KeyPair::generate();
        for i in 0..events {
            let block = Block::signed(
                ledger.latest().index() + 1,
                ledger.latest().hash().to_string(),
                encrypt(&format!("event {}", i), &EncryptionKey::generate()).unwrap(),
                &author,
            );
            ledger.append(block).unwrap();
        }
    }

    fn shared(events: usize) -> Arc<RwLock<Ledger>> {
        let mut ledger = Ledger::new();
        extend(&mut ledger, events);
        Arc::new(RwLock::new(ledger))
    }

    #[tokio::test]
    async fn test_pull_adopts_longest_in_order() {
        let local = shared(0);
        let mut transport = LocalPeers::default();
        transport.ledgers.insert("a".to_string(), shared(2));
        transport.ledgers.insert("b".to_string(), shared(4));
        transport.ledgers.insert("c".to_string(), shared(3));
        let b_tip = transport.ledgers["b"].read().await.latest().hash().to_string();

        let sync = PeerSync::new(
            local.clone(),
            Arc::new(transport),
            vec!["a".into(), "b".into(), "c".into()],
        );
        let report = sync.pull_and_adopt().await;

        // "c" is compared against b's chain, which is longer
        assert_eq!(report.adopted_from, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(local.read().await.len(), 5);
        assert_eq!(local.read().await.latest().hash(), b_tip);
    }

    #[tokio::test]
    async fn test_pull_skips_unreachable_peers() {
        let local = shared(0);
        let mut transport = LocalPeers::default();
        transport.ledgers.insert("up".to_string(), shared(1));

        let sync = PeerSync::new(
            local.clone(),
            Arc::new(transport),
            vec!["down".into(), "up".into()],
        );
        let report = sync.pull_and_adopt().await;

        assert_eq!(report.failed_peers, vec!["down".to_string()]);
        assert_eq!(report.adopted_from, vec!["up".to_string()]);
        assert_eq!(local.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_pull_ignores_equal_length() {
        let local = shared(1);
        let tip = local.read().await.latest().hash().to_string();
        let mut transport = LocalPeers::default();
        transport.ledgers.insert("peer".to_string(), shared(1));

        let sync = PeerSync::new(local.clone(), Arc::new(transport), vec!["peer".into()]);
        let report = sync.pull_and_adopt().await;

        assert!(report.adopted_from.is_empty());
        assert_eq!(local.read().await.latest().hash(), tip);
    }

    #[tokio::test]
    async fn test_broadcast_counts_acceptances() {
        let local = shared(1);
        let follower = Arc::new(RwLock::new(Ledger::new()));
        let chain = local.read().await.blocks().to_vec();
        follower.write().await.replace(chain).unwrap();
        let diverged = shared(1);

        let mut transport = LocalPeers::default();
        transport.ledgers.insert("follower".to_string(), follower.clone());
        transport.ledgers.insert("diverged".to_string(), diverged.clone());
        let sync = PeerSync::new(
            local.clone(),
            Arc::new(transport),
            vec!["follower".into(), "diverged".into(), "missing".into()],
        );

        extend(&mut *local.write().await, 1);
        let block = local.read().await.latest().clone();

        assert_eq!(sync.broadcast(&block).await, 1);
        assert_eq!(follower.read().await.latest().hash(), block.hash());
        assert_eq!(diverged.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_slow_peer_does_not_delay_fetches() {
        let local = shared(0);
        let mut transport = LocalPeers::default();
        for (name, events) in [("slow-a", 1), ("slow-b", 2), ("fast", 3)] {
            transport.ledgers.insert(name.to_string(), shared(events));
        }
        let delay = Duration::from_millis(200);
        transport.delays.insert("slow-a".to_string(), delay);
        transport.delays.insert("slow-b".to_string(), delay);
        let transport = Arc::new(transport);

        let sync = PeerSync::new(
            local.clone(),
            transport.clone(),
            vec!["slow-a".into(), "slow-b".into(), "fast".into()],
        );
        let started = Instant::now();
        let report = sync.pull_and_adopt().await;

        assert!(started.elapsed() < delay * 2);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(report.adopted_from.len(), 3);
        assert_eq!(local.read().await.len(), 4);
    }

    #[tokio::test]
    async fn test_slow_peer_does_not_delay_delivery() {
        let local = shared(1);
        let fast = shared(0);
        let slow = shared(0);
        let chain = local.read().await.blocks().to_vec();
        fast.write().await.replace(chain.clone()).unwrap();
        slow.write().await.replace(chain).unwrap();

        let mut transport = LocalPeers::default();
        transport.ledgers.insert("slow".to_string(), slow.clone());
        transport.ledgers.insert("fast".to_string(), fast.clone());
        transport
            .delays
            .insert("slow".to_string(), Duration::from_millis(500));
        let sync = Arc::new(PeerSync::new(
            local.clone(),
            Arc::new(transport),
            vec!["slow".into(), "fast".into()],
        ));

        extend(&mut *local.write().await, 1);
        let block = local.read().await.latest().clone();
        let delivery = {
            let sync = sync.clone();
            let block = block.clone();
            tokio::spawn(async move { sync.broadcast(&block).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fast.read().await.latest().hash(), block.hash());
        assert_eq!(slow.read().await.len(), 2);
        assert!(!delivery.is_finished());

        assert_eq!(delivery.await.unwrap(), 2);
        assert_eq!(slow.read().await.latest().hash(), block.hash());
    }

    #[tokio::test]
    async fn test_concurrent_resyncs_coalesce() {
        let local = shared(0);
        let mut transport = LocalPeers::default();
        transport.ledgers.insert("peer".to_string(), shared(2));
        transport
            .delays
            .insert("peer".to_string(), Duration::from_millis(100));
        let transport = Arc::new(transport);

        let sync = PeerSync::new(local.clone(), transport.clone(), vec!["peer".into()]);
        let reports = join_all((0..4).map(|_| sync.resync())).await;

        let ran: Vec<_> = reports.into_iter().flatten().collect();
        assert_eq!(ran.len(), 1);
        assert_eq!(ran[0].adopted_from, vec!["peer".to_string()]);
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(local.read().await.len(), 3);

        // The guard is released once the pass finishes
        assert!(sync.resync().await.is_some());
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 2);
    }
}
