//! Coordinator: orchestrates client PUT/GET and ring membership operations
//! (§4.5).

use std::net::SocketAddr;
use std::sync::Arc;

use corelib::clock::Clock;
use corelib::node::{Node, NodeId};
use corelib::ring::HashRing;
use corelib::store::{LocalStore, Metadata, Record};
use serde::Serialize;
use streaming::{
    snapshot::snapshot_of, FailureDetector, IncomingRequest, PeerLink, PeerMessage, PeerTable,
    StreamingError, Unsolicited,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{ReplicationError, Result};
use crate::placement::ReplicaPlacement;
use crate::strategy::ReplicationStrategy;

/// Outcome of replicating to one target (§4.5.1 step 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaOutcome {
    Success,
    Timeout,
    NotConnected,
}

/// One target's outcome in a `PutResult.writeResults` (§6.1).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaResult {
    pub node_id: NodeId,
    pub outcome: ReplicaOutcome,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutResult {
    pub success: bool,
    pub key: String,
    #[serde(rename = "replicaNodes")]
    pub replicas: Vec<NodeId>,
    pub successful_writes: usize,
    #[serde(rename = "quorumSize")]
    pub quorum: usize,
    pub quorum_achieved: bool,
    #[serde(rename = "writeResults")]
    pub per_replica: Vec<ReplicaResult>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResult {
    pub value: Vec<u8>,
    pub metadata: Metadata,
    pub read_results: usize,
    pub quorum_achieved: bool,
}

/// Orchestrates PUT, GET, and ring membership on behalf of client requests
/// landing on this node.
pub struct Coordinator<C: Clock> {
    local_id: NodeId,
    local_address: SocketAddr,
    clock: Arc<C>,
    ring: Arc<HashRing>,
    store: Arc<LocalStore>,
    peers: Arc<PeerTable>,
    failure_detector: Arc<FailureDetector<C>>,
    strategy: Arc<dyn ReplicationStrategy>,
    vnode_count: u32,
    requests_tx: mpsc::UnboundedSender<IncomingRequest>,
}

impl<C: Clock> Coordinator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_id: NodeId,
        local_address: SocketAddr,
        clock: Arc<C>,
        ring: Arc<HashRing>,
        store: Arc<LocalStore>,
        peers: Arc<PeerTable>,
        failure_detector: Arc<FailureDetector<C>>,
        strategy: Arc<dyn ReplicationStrategy>,
        vnode_count: u32,
    ) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        tokio::spawn(respond_to_peers(
            requests_rx,
            ring.clone(),
            store.clone(),
            local_id.clone(),
        ));

        Self {
            local_id,
            local_address,
            clock,
            ring,
            store,
            peers,
            failure_detector,
            strategy,
            vnode_count,
            requests_tx,
        }
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn vnode_count(&self) -> u32 {
        self.vnode_count
    }

    pub fn replication_factor(&self) -> usize {
        self.strategy.replication_factor()
    }

    /// `Q = floor(R/2) + 1` for the configured replication factor (§4.5,
    /// §8 invariant 6) — not the replica count actually achievable on a
    /// smaller ring.
    pub fn quorum_size(&self) -> usize {
        crate::placement::quorum_for(self.replication_factor())
    }

    /// A node is alive iff it's still in the ring: the failure detector
    /// evicts a node the moment it declares it failed, so ring membership
    /// and liveness are the same fact (§4.4).
    pub fn is_alive(&self, node_id: &NodeId) -> bool {
        self.ring.get_node(node_id).is_some()
    }

    /// Replica set a key would resolve to right now, for diagnostics
    /// (`GET /cluster/distribution`, §6.1) — does not touch any store.
    pub fn replicas_for_key(&self, key: &[u8]) -> Vec<NodeId> {
        self.strategy.replicas_for_key(&self.ring, key)
    }

    /// Sender every newly accepted or opened `PeerLink` should be given so
    /// its inbound application requests reach this coordinator's store and
    /// ring (§4.5: a link is bi-directional, so a peer we connected *to* can
    /// still send us `replicate`/`read`/`write`/`SnapshotRequest`).
    pub fn requests_sender(&self) -> mpsc::UnboundedSender<IncomingRequest> {
        self.requests_tx.clone()
    }

    /// Accepts an inbound socket from the peer listener. The remote node's
    /// identity isn't known until its `identify` arrives, so this spawns a
    /// dedicated task that waits for it before registering the link.
    pub async fn accept_link(&self, stream: TcpStream) {
        let (unsolicited_tx, unsolicited_rx) = mpsc::unbounded_channel();
        let link = PeerLink::spawn(stream, unsolicited_tx, self.requests_sender());

        tokio::spawn(own_unknown_peer(
            link,
            unsolicited_rx,
            self.ring.clone(),
            self.peers.clone(),
            self.failure_detector.clone(),
            self.vnode_count,
        ));
    }

    fn placement(&self, key: &[u8]) -> Result<ReplicaPlacement> {
        if self.ring.node_count() == 0 {
            return Err(ReplicationError::RingEmpty);
        }
        let targets = self.strategy.replicas_for_key(&self.ring, key);
        Ok(ReplicaPlacement::new(
            targets,
            self.strategy.replication_factor(),
        ))
    }

    /// PUT(key, value) — §4.5.1.
    pub async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<PutResult> {
        let placement = self.placement(&key)?;
        let metadata = Metadata::new(self.clock.now_ms(), self.local_id.clone());

        let mut per_replica = Vec::with_capacity(placement.targets.len());
        let mut successes = 0usize;
        let mut handles = Vec::new();

        for target in &placement.targets {
            if *target == self.local_id {
                self.store.put(key.clone(), value.clone(), metadata.clone());
                per_replica.push(ReplicaResult {
                    node_id: target.clone(),
                    outcome: ReplicaOutcome::Success,
                });
                successes += 1;
                continue;
            }

            let target = target.clone();
            let link = self.peers.get(&target);
            let key = key.clone();
            let value = value.clone();
            let metadata = metadata.clone();
            handles.push(tokio::spawn(async move {
                let outcome = replicate_to(link, key, value, metadata).await;
                (target, outcome)
            }));
        }

        for handle in handles {
            match handle.await {
                Ok((target, outcome)) => {
                    if outcome == ReplicaOutcome::Success {
                        successes += 1;
                    }
                    per_replica.push(ReplicaResult {
                        node_id: target,
                        outcome,
                    });
                }
                Err(e) => warn!("replicate fan-out task panicked: {e}"),
            }
        }

        let quorum_achieved = successes >= placement.quorum;
        Ok(PutResult {
            success: quorum_achieved,
            key: String::from_utf8_lossy(&key).into_owned(),
            replicas: placement.targets,
            successful_writes: successes,
            quorum: placement.quorum,
            quorum_achieved,
            per_replica,
        })
    }

    /// GET(key) — §4.5.2. Returns the best available value from whichever
    /// replicas answered, even if fewer than quorum did; `quorum_achieved`
    /// is reported on the result but never gates the response.
    pub async fn get(&self, key: &[u8]) -> Result<Option<GetResult>> {
        let placement = self.placement(key)?;

        let mut results: Vec<Record> = Vec::new();
        if placement.targets.contains(&self.local_id) {
            if let Some(record) = self.store.get(key) {
                results.push(record);
            }
        }

        let mut handles = Vec::new();
        for target in placement.targets.iter().filter(|t| **t != self.local_id) {
            let link = self.peers.get(target);
            let key = key.to_vec();
            handles.push(tokio::spawn(async move { read_from(link, key).await }));
        }
        for handle in handles {
            if let Ok(Some(record)) = handle.await {
                results.push(record);
            }
        }

        if results.is_empty() {
            return Ok(None);
        }

        let read_results = results.len();
        let quorum_achieved = read_results >= placement.quorum;

        let winner = results
            .into_iter()
            .reduce(newest_wins)
            .expect("checked non-empty above");

        Ok(Some(GetResult {
            value: winner.value,
            metadata: winner.metadata,
            read_results,
            quorum_achieved,
        }))
    }

    /// `add_node(node_id, address)` — §4.5.3: adds to the ring and opens a
    /// link. No data movement happens (Non-goals).
    pub async fn add_node(&self, node_id: NodeId, address: SocketAddr) -> Result<()> {
        self.ring
            .add_node(Node::new(node_id.clone(), address), self.vnode_count);

        if node_id == self.local_id {
            return Ok(());
        }

        let (unsolicited_tx, unsolicited_rx) = mpsc::unbounded_channel();
        let link = PeerLink::connect(address, unsolicited_tx, self.requests_sender())
            .await
            .map_err(|_| ReplicationError::JoinFailed)?;
        let _ = link.send_identify(self.local_id.clone(), self.local_address);

        self.peers.insert(node_id.clone(), link);
        self.failure_detector.register_peer(node_id.clone());
        tokio::spawn(track_known_peer(
            node_id,
            unsolicited_rx,
            self.failure_detector.clone(),
        ));
        Ok(())
    }

    /// `join(seeds)` — §4.5.3: tries each seed in order, stopping at the
    /// first that returns a ring snapshot.
    pub async fn join(&self, seeds: &[SocketAddr]) -> Result<()> {
        for seed in seeds {
            let (unsolicited_tx, _unsolicited_rx) = mpsc::unbounded_channel();
            let link = match PeerLink::connect(*seed, unsolicited_tx, self.requests_sender()).await {
                Ok(link) => link,
                Err(_) => continue,
            };
            let _ = link.send_identify(self.local_id.clone(), self.local_address);

            match link.request(PeerMessage::SnapshotRequest).await {
                Ok(PeerMessage::SnapshotReply { nodes }) => {
                    for snapshot in nodes {
                        if snapshot.node_id == self.local_id {
                            continue;
                        }
                        if self.peers.get(&snapshot.node_id).is_some() {
                            continue;
                        }
                        if self
                            .add_node(snapshot.node_id.clone(), snapshot.address)
                            .await
                            .is_err()
                        {
                            warn!(node = %snapshot.node_id, "failed to connect to peer from snapshot");
                        }
                    }
                    return Ok(());
                }
                _ => continue,
            }
        }
        Err(ReplicationError::JoinFailed)
    }
}

/// Drains inbound application requests arriving over any `PeerLink` this
/// node holds (whether it dialed out or accepted the connection) and
/// answers them directly against the local store and ring, mirroring the
/// server side of `replicate`/`read`/`write`/`SnapshotRequest` (§4.5.1-3).
async fn respond_to_peers(
    mut requests: mpsc::UnboundedReceiver<IncomingRequest>,
    ring: Arc<HashRing>,
    store: Arc<LocalStore>,
    local_id: NodeId,
) {
    while let Some(incoming) = requests.recv().await {
        let reply_handle = incoming.reply;
        let reply = match incoming.message {
            PeerMessage::Replicate {
                key,
                value,
                metadata,
            } => {
                store.put(key, value, metadata);
                PeerMessage::ReplicateAck { ok: true }
            }
            PeerMessage::Write {
                key,
                value,
                metadata,
            } => {
                store.put(key, value, metadata);
                PeerMessage::WriteAck {
                    ok: true,
                    node_id: local_id.clone(),
                }
            }
            PeerMessage::Read { key } => PeerMessage::ReadReply {
                record: store.get(&key),
            },
            PeerMessage::SnapshotRequest => PeerMessage::SnapshotReply {
                nodes: snapshot_of(&ring),
            },
            _ => continue,
        };
        if reply_handle.0.send(reply).is_err() {
            warn!("failed to reply to inbound peer request: link closed");
        }
    }
}

/// Watches an accepted link until its `identify` arrives, then registers it
/// in the ring and peer table and hands off to `track_known_peer` for the
/// rest of its life.
async fn own_unknown_peer(
    link: PeerLink,
    mut unsolicited: mpsc::UnboundedReceiver<Unsolicited>,
    ring: Arc<HashRing>,
    peers: Arc<PeerTable>,
    failure_detector: Arc<FailureDetector<impl Clock>>,
    vnode_count: u32,
) {
    while let Some(event) = unsolicited.recv().await {
        if let Unsolicited::Identify { node_id, address } = event {
            ring.add_node(Node::new(node_id.clone(), address), vnode_count);
            peers.insert(node_id.clone(), link);
            failure_detector.register_peer(node_id.clone());
            track_known_peer(node_id, unsolicited, failure_detector).await;
            return;
        }
        // Heartbeats/node_failure arriving before identify have no node id
        // to attribute them to yet; nothing useful to do with them.
    }
}

/// Keeps a known peer's liveness bookkeeping current for the life of its
/// link: records heartbeats, relays gossiped failures to the detector.
async fn track_known_peer(
    node_id: NodeId,
    mut unsolicited: mpsc::UnboundedReceiver<Unsolicited>,
    failure_detector: Arc<FailureDetector<impl Clock>>,
) {
    while let Some(event) = unsolicited.recv().await {
        match event {
            Unsolicited::Heartbeat { .. } => failure_detector.record_heartbeat(&node_id),
            Unsolicited::NodeFailure { failed_node_id, .. } => {
                failure_detector.handle_node_failure_gossip(&failed_node_id)
            }
            Unsolicited::Identify { .. } => {}
        }
    }
}

async fn replicate_to(
    link: Option<PeerLink>,
    key: Vec<u8>,
    value: Vec<u8>,
    metadata: Metadata,
) -> ReplicaOutcome {
    let Some(link) = link else {
        return ReplicaOutcome::NotConnected;
    };
    match link
        .request(PeerMessage::Replicate {
            key,
            value,
            metadata,
        })
        .await
    {
        Ok(PeerMessage::ReplicateAck { ok: true }) => ReplicaOutcome::Success,
        Ok(_) => ReplicaOutcome::NotConnected,
        Err(StreamingError::Timeout(_)) => ReplicaOutcome::Timeout,
        Err(_) => ReplicaOutcome::NotConnected,
    }
}

async fn read_from(link: Option<PeerLink>, key: Vec<u8>) -> Option<Record> {
    let link = link?;
    match link.request(PeerMessage::Read { key }).await {
        Ok(PeerMessage::ReadReply { record }) => record,
        _ => None,
    }
}

/// Last-writer-wins selection: highest timestamp; ties broken by the
/// lexicographically smaller origin node id, deterministically across
/// coordinators (§4.5.2).
fn newest_wins(a: Record, b: Record) -> Record {
    match b.metadata.timestamp.cmp(&a.metadata.timestamp) {
        std::cmp::Ordering::Greater => b,
        std::cmp::Ordering::Less => a,
        std::cmp::Ordering::Equal => {
            if b.metadata.origin_node_id < a.metadata.origin_node_id {
                b
            } else {
                a
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: u64, origin: &str, value: &str) -> Record {
        Record {
            key: b"k".to_vec(),
            value: value.as_bytes().to_vec(),
            metadata: Metadata::new(ts, NodeId::new(origin)),
        }
    }

    #[test]
    fn newest_timestamp_wins() {
        let winner = newest_wins(record(100, "A", "old"), record(200, "B", "new"));
        assert_eq!(winner.value, b"new");
    }

    #[test]
    fn ties_break_by_lexicographically_smaller_origin() {
        let winner = newest_wins(record(100, "B", "from-b"), record(100, "A", "from-a"));
        assert_eq!(winner.value, b"from-a");
    }
}
