// Darkseed — Node Manager
// Copyright (c) 2024-2026 The Darkseed developers
// Distributed under the MIT software license.

//! Periodic snapshot ingestion and the shared address pool.
//!
//! The manager owns the only mutable shared state in the daemon: a mapping
//! from network type to the current seed candidates. Publication is a single
//! atomic pointer swap ([`arc_swap::ArcSwap`]); request handlers load the
//! pointer once per request and keep working on that snapshot, so they never
//! observe a half-replaced pool and no lock is held across sampling. The
//! published pool is immutable — a refresh always builds a fresh map.
//!
//! Refresh failures are recoverable: the previous pool stays published and
//! the loop retries on its next tick.

use crate::addr::{Address, NetworkType};
use crate::nodes::{Node, snapshot};
use arc_swap::ArcSwap;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Default refresh interval: the crawler produces a snapshot roughly every
/// ten minutes.
pub const DEFAULT_REFRESH_SECS: u64 = 600;

/// Seed candidates partitioned by network. Every network key is always
/// present; empty networks map to an empty list.
pub type NodePool = HashMap<NetworkType, Vec<Node>>;

/// Handle to the node pool. Cheap to clone; all clones share the same
/// published pool.
#[derive(Clone)]
pub struct NodeManager {
    pool: Arc<ArcSwap<NodePool>>,
    crawler_dir: PathBuf,
    refresh: Duration,
    shutdown: Arc<Notify>,
}

impl NodeManager {
    pub fn new(crawler_dir: PathBuf, refresh: Duration) -> Self {
        NodeManager {
            pool: Arc::new(ArcSwap::from_pointee(empty_pool())),
            crawler_dir,
            refresh,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Run the refresh loop: reload on start and every `refresh` interval
    /// until [`NodeManager::shutdown`] is called.
    ///
    /// A corrupt snapshot (network column mismatch) panics in the loader;
    /// the panic is resurfaced here so the daemon can treat it as fatal
    /// instead of silently freezing the pool.
    pub async fn run(self) {
        info!(
            "Started node manager (dir={}, refresh={}s)",
            self.crawler_dir.display(),
            self.refresh.as_secs()
        );
        loop {
            if let Err(e) = self.reload().await {
                warn!("Keeping previous node pool, refresh failed: {}", e);
            }
            tokio::select! {
                _ = tokio::time::sleep(self.refresh) => {}
                _ = self.shutdown.notified() => {
                    info!("Node manager shutting down");
                    return;
                }
            }
        }
    }

    /// Interrupt the refresh loop's sleep and stop it.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Load the newest snapshot and publish its nodes.
    async fn reload(&self) -> Result<(), snapshot::SnapshotError> {
        let dir = self.crawler_dir.clone();
        let result = tokio::task::spawn_blocking(move || snapshot::load_latest(&dir)).await;
        let (nodes, _stats) = match result {
            Ok(loaded) => loaded?,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => return Ok(()), // cancelled during shutdown
        };
        self.publish(nodes);
        Ok(())
    }

    /// Partition `nodes` by network and atomically replace the pool.
    pub fn publish(&self, nodes: Vec<Node>) {
        let total = nodes.len();
        let mut pool = empty_pool();
        for node in nodes {
            pool.entry(node.network()).or_default().push(node);
        }

        let mut summary = String::new();
        for net in NetworkType::ALL {
            let count = pool.get(&net).map_or(0, Vec::len);
            let _ = write!(summary, ", {net}={count}");
        }
        self.pool.store(Arc::new(pool));
        info!("Updated node pool: total={}{}", total, summary);
    }

    /// Take a consistent snapshot of the published pool.
    ///
    /// Request handlers call this once per request and sample from the
    /// returned view, so a refresh landing mid-request can never mix pool
    /// generations within one reply.
    pub fn view(&self) -> PoolView {
        PoolView(self.pool.load_full())
    }

    /// Draw up to `count` distinct addresses from one network's pool.
    /// Convenience for one-shot callers; see [`PoolView::sample`].
    pub fn sample(&self, network: NetworkType, count: usize) -> Vec<Address> {
        self.view().sample(network, count)
    }

    /// Number of published nodes per network.
    pub fn pool_sizes(&self) -> Vec<(NetworkType, usize)> {
        let PoolView(pool) = self.view();
        NetworkType::ALL
            .iter()
            .map(|net| (*net, pool.get(net).map_or(0, Vec::len)))
            .collect()
    }
}

/// An immutable snapshot of one published pool generation.
pub struct PoolView(Arc<NodePool>);

impl PoolView {
    /// Draw up to `count` distinct addresses from one network, uniformly at
    /// random without replacement.
    ///
    /// Short pools return everything they have; this never blocks and never
    /// fails.
    pub fn sample(&self, network: NetworkType, count: usize) -> Vec<Address> {
        let Some(nodes) = self.0.get(&network) else {
            return Vec::new();
        };
        if nodes.len() < count {
            warn!(
                "Insufficient {} addresses (requested={}, available={})",
                network,
                count,
                nodes.len()
            );
        }
        nodes
            .choose_multiple(&mut rand::thread_rng(), count)
            .map(|node| node.addr.clone())
            .collect()
    }
}

fn empty_pool() -> NodePool {
    NetworkType::ALL.iter().map(|net| (*net, Vec::new())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{MAINNET_PORT, SEED_SERVICES};
    use std::collections::HashSet;
    use std::net::Ipv4Addr;

    fn ipv4_nodes(count: u8) -> Vec<Node> {
        (1..=count)
            .map(|i| {
                Node::new(
                    Address::Ipv4(Ipv4Addr::new(10, 0, 0, i)),
                    MAINNET_PORT,
                    SEED_SERVICES,
                )
            })
            .collect()
    }

    fn manager() -> NodeManager {
        NodeManager::new(PathBuf::from("/nonexistent"), Duration::from_secs(600))
    }

    #[test]
    fn test_sample_without_replacement() {
        let manager = manager();
        manager.publish(ipv4_nodes(30));

        let sample = manager.sample(NetworkType::Ipv4, 12);
        assert_eq!(sample.len(), 12);
        let unique: HashSet<String> = sample.iter().map(|a| a.to_string()).collect();
        assert_eq!(unique.len(), 12);
        assert!(sample.iter().all(|a| a.network() == NetworkType::Ipv4));
    }

    #[test]
    fn test_sample_short_pool_returns_all() {
        let manager = manager();
        manager.publish(ipv4_nodes(3));
        assert_eq!(manager.sample(NetworkType::Ipv4, 29).len(), 3);
        assert!(manager.sample(NetworkType::OnionV3, 6).is_empty());
    }

    #[test]
    fn test_sample_empty_manager() {
        let manager = manager();
        assert!(manager.sample(NetworkType::Ipv4, 5).is_empty());
    }

    #[test]
    fn test_publish_partitions_by_network() {
        let manager = manager();
        let mut nodes = ipv4_nodes(2);
        nodes.push(Node::new(Address::OnionV3([1u8; 32]), MAINNET_PORT, SEED_SERVICES));
        nodes.push(Node::new("fc00::7".parse().unwrap(), MAINNET_PORT, SEED_SERVICES));
        manager.publish(nodes);

        let sizes: HashMap<_, _> = manager.pool_sizes().into_iter().collect();
        assert_eq!(sizes[&NetworkType::Ipv4], 2);
        assert_eq!(sizes[&NetworkType::OnionV3], 1);
        assert_eq!(sizes[&NetworkType::Cjdns], 1);
        assert_eq!(sizes[&NetworkType::I2p], 0);
    }

    /// Readers racing a publishing writer must always observe a complete
    /// pool: every sample comes entirely from one published generation.
    #[tokio::test]
    async fn test_publish_is_atomic_under_readers() {
        let manager = manager();
        manager.publish(ipv4_nodes(10));

        let reader = {
            let manager = manager.clone();
            tokio::task::spawn_blocking(move || {
                for _ in 0..2000 {
                    let sample = manager.sample(NetworkType::Ipv4, 64);
                    // Generations have 10 or 50 nodes; anything else means a
                    // blended pool was observed.
                    assert!(
                        sample.len() == 10 || sample.len() == 50,
                        "observed partially published pool of {} nodes",
                        sample.len()
                    );
                }
            })
        };

        let writer = {
            let manager = manager.clone();
            tokio::task::spawn_blocking(move || {
                for i in 0..200 {
                    let count = if i % 2 == 0 { 50 } else { 10 };
                    manager.publish(ipv4_nodes(count));
                }
            })
        };

        reader.await.unwrap();
        writer.await.unwrap();
    }
}
