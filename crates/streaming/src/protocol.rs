//! Wire protocol exchanged over a Peer Link (§4.3).
//!
//! Every frame is an `Envelope` wrapping a tagged `PeerMessage`. `id` lets a
//! link match a reply to the request that triggered it; fire-and-forget
//! messages (`heartbeat`, `node_failure`, the first `identify`) use `id: 0`.

use std::net::SocketAddr;

use corelib::node::NodeId;
use corelib::store::{Metadata, Record};
use serde::{Deserialize, Serialize};

pub type RequestId = u64;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub id: RequestId,
    pub message: PeerMessage,
}

impl Envelope {
    pub fn fire_and_forget(message: PeerMessage) -> Self {
        Self { id: 0, message }
    }

    pub fn request(id: RequestId, message: PeerMessage) -> Self {
        Self { id, message }
    }
}

/// One lightweight descriptor of a ring member, used in snapshot replies
/// during `join` (§4.5.3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: NodeId,
    pub address: SocketAddr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PeerMessage {
    /// Must be the first message either side sends after connecting.
    Identify { node_id: NodeId, address: SocketAddr },
    Heartbeat { node_id: NodeId, timestamp: u64 },
    Replicate { key: Vec<u8>, value: Vec<u8>, metadata: Metadata },
    ReplicateAck { ok: bool },
    Read { key: Vec<u8> },
    ReadReply { record: Option<Record> },
    Write { key: Vec<u8>, value: Vec<u8>, metadata: Metadata },
    WriteAck { ok: bool, node_id: NodeId },
    /// Best-effort gossip; never replied to.
    NodeFailure { failed_node_id: NodeId, reporter: NodeId, ts: u64 },
    /// Requests the full ring membership, used by a joining node.
    SnapshotRequest,
    SnapshotReply { nodes: Vec<NodeSnapshot> },
}

impl PeerMessage {
    /// Whether this variant expects a correlated reply.
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            PeerMessage::Replicate { .. }
                | PeerMessage::Read { .. }
                | PeerMessage::Write { .. }
                | PeerMessage::SnapshotRequest
        )
    }
}
