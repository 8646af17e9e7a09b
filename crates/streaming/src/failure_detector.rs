//! Heartbeat-based failure detector (§4.4).
//!
//! Every `heartbeat_interval` the detector sends a heartbeat down each
//! linked peer and checks every tracked peer's `last_heartbeat_ms` against
//! `failure_threshold`. A peer that has gone silent longer than the
//! threshold is declared failed: removed from the ring, its link closed,
//! and `node_failure` gossiped to the remaining live peers.
//!
//! Failure is sticky (§9 open question 4): a declared-failed peer is only
//! re-admitted by a fresh `identify`, never by a passive re-probe.
//!
//! Gossip is advisory, not authoritative (§9 open question 5): a received
//! `node_failure` only short-circuits the local wait if this node's own
//! `last_heartbeat_ms` for that peer is already older than half the
//! failure threshold, so a single partitioned reporter can't evict a peer
//! that this node can still hear from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use corelib::clock::Clock;
use corelib::node::NodeId;
use corelib::ring::HashRing;
use dashmap::DashMap;
use tracing::info;

use crate::peer_table::PeerTable;

/// Tracks per-peer liveness and owns the ring-eviction side effect of a
/// confirmed failure. Does not own the links themselves — that's `PeerTable`.
pub struct FailureDetector<C: Clock> {
    local_id: NodeId,
    clock: Arc<C>,
    ring: Arc<HashRing>,
    peer_table: Arc<PeerTable>,
    last_heartbeat_ms: DashMap<NodeId, AtomicU64>,
    heartbeat_interval: Duration,
    failure_threshold: Duration,
}

impl<C: Clock> FailureDetector<C> {
    pub fn new(
        local_id: NodeId,
        clock: Arc<C>,
        ring: Arc<HashRing>,
        peer_table: Arc<PeerTable>,
        heartbeat_interval: Duration,
        failure_threshold: Duration,
    ) -> Self {
        Self {
            local_id,
            clock,
            ring,
            peer_table,
            last_heartbeat_ms: DashMap::new(),
            heartbeat_interval,
            failure_threshold,
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Starts tracking `peer_id`'s liveness as of now. The peer's link must
    /// already be registered in the shared `PeerTable`.
    pub fn register_peer(&self, peer_id: NodeId) {
        self.last_heartbeat_ms
            .insert(peer_id, AtomicU64::new(self.clock.now_ms()));
    }

    pub fn is_tracked(&self, peer_id: &NodeId) -> bool {
        self.last_heartbeat_ms.contains_key(peer_id)
    }

    /// Refreshes `peer_id`'s liveness timestamp. Called on every received
    /// `heartbeat`, `identify`, or application reply from that peer.
    pub fn record_heartbeat(&self, peer_id: &NodeId) {
        if let Some(entry) = self.last_heartbeat_ms.get(peer_id) {
            entry.store(self.clock.now_ms(), Ordering::SeqCst);
        }
    }

    fn last_seen(&self, peer_id: &NodeId) -> Option<u64> {
        self.last_heartbeat_ms
            .get(peer_id)
            .map(|e| e.load(Ordering::SeqCst))
    }

    /// Sends a heartbeat down every linked peer and evicts anyone who has
    /// gone silent past `failure_threshold`. Intended to be called once per
    /// `heartbeat_interval` tick.
    pub fn tick(&self) {
        let now = self.clock.now_ms();

        for (_, link) in self.peer_table.iter_links() {
            let _ = link.send_heartbeat(self.local_id.clone(), now);
        }

        let threshold_ms = self.failure_threshold.as_millis() as u64;
        let silent: Vec<NodeId> = self
            .last_heartbeat_ms
            .iter()
            .filter(|entry| now.saturating_sub(entry.value().load(Ordering::SeqCst)) > threshold_ms)
            .map(|entry| entry.key().clone())
            .collect();

        for peer_id in silent {
            self.declare_failed(&peer_id);
        }
    }

    /// Handles a gossiped `node_failure(failed_node_id)` from another peer.
    /// Confirms locally only if this node's own silence window for
    /// `failed_node_id` already exceeds half the failure threshold.
    pub fn handle_node_failure_gossip(&self, failed_node_id: &NodeId) {
        let half_threshold_ms = self.failure_threshold.as_millis() as u64 / 2;
        let now = self.clock.now_ms();

        let Some(last_seen) = self.last_seen(failed_node_id) else {
            return;
        };
        if now.saturating_sub(last_seen) > half_threshold_ms {
            self.declare_failed(failed_node_id);
        }
    }

    fn declare_failed(&self, peer_id: &NodeId) {
        if self.last_heartbeat_ms.remove(peer_id).is_none() {
            return;
        }
        if let Some(link) = self.peer_table.remove(peer_id) {
            link.close();
        }
        self.ring.remove_node(peer_id);
        info!(peer = %peer_id, "declared peer failed, evicted from ring");

        let now = self.clock.now_ms();
        for (_, link) in self.peer_table.iter_links() {
            let _ = link.gossip_node_failure(peer_id.clone(), self.local_id.clone(), now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::clock::TestClock;
    use corelib::node::Node;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    async fn loopback_link() -> crate::link::PeerLink {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local_addr = listener.local_addr().unwrap();
        let connect = tokio::net::TcpStream::connect(local_addr);
        let (client, server) = tokio::join!(connect, listener.accept());
        let (server, _) = server.unwrap();
        let (unsolicited_tx, _unsolicited_rx) = mpsc::unbounded_channel();
        let (requests_tx, _requests_rx) = mpsc::unbounded_channel();
        std::mem::forget(server);
        crate::link::PeerLink::spawn(client.unwrap(), unsolicited_tx, requests_tx)
    }

    struct Fixture {
        clock: Arc<TestClock>,
        ring: Arc<HashRing>,
        peer_table: Arc<PeerTable>,
        detector: FailureDetector<TestClock>,
    }

    async fn fixture(peer_id: &str, port: u16) -> Fixture {
        let clock = Arc::new(TestClock::new(0));
        let ring = Arc::new(HashRing::new());
        ring.add_node(Node::new(peer_id, addr(port)), 4);
        let peer_table = Arc::new(PeerTable::new());
        peer_table.insert(NodeId::new(peer_id), loopback_link().await);

        let detector = FailureDetector::new(
            NodeId::new("A"),
            clock.clone(),
            ring.clone(),
            peer_table.clone(),
            Duration::from_millis(2000),
            Duration::from_millis(10_000),
        );
        detector.register_peer(NodeId::new(peer_id));

        Fixture {
            clock,
            ring,
            peer_table,
            detector,
        }
    }

    #[tokio::test]
    async fn silent_peer_is_declared_failed_after_threshold() {
        let f = fixture("B", 9100).await;

        f.clock.advance(12_000);
        f.detector.tick();

        assert!(!f.detector.is_tracked(&NodeId::new("B")));
        assert_eq!(f.ring.node_count(), 0);
        assert!(f.peer_table.get(&NodeId::new("B")).is_none());
    }

    #[tokio::test]
    async fn fresh_heartbeat_prevents_eviction() {
        let f = fixture("B", 9101).await;

        f.clock.advance(5_000);
        f.detector.record_heartbeat(&NodeId::new("B"));
        f.clock.advance(8_000);
        f.detector.tick();

        assert!(f.detector.is_tracked(&NodeId::new("B")));
        assert_eq!(f.ring.node_count(), 1);
    }

    #[tokio::test]
    async fn gossip_confirms_early_past_half_threshold() {
        let f = fixture("C", 9102).await;

        f.clock.advance(6_000); // past T/2 = 5000, under T = 10000
        f.detector.handle_node_failure_gossip(&NodeId::new("C"));

        assert!(!f.detector.is_tracked(&NodeId::new("C")));
        assert_eq!(f.ring.node_count(), 0);
    }

    #[tokio::test]
    async fn gossip_is_ignored_before_half_threshold() {
        let f = fixture("C", 9103).await;

        f.clock.advance(3_000); // under T/2 = 5000
        f.detector.handle_node_failure_gossip(&NodeId::new("C"));

        assert!(f.detector.is_tracked(&NodeId::new("C")));
        assert_eq!(f.ring.node_count(), 1);
    }
}
