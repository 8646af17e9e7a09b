//! Node abstractions for the consistent hash ring.
//!
//! Nodes represent logical participants in the ring. They are identified by a
//! compact `NodeId` that is cheap to compare and hash.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Cluster-unique short identifier for a node, e.g. `"A"` or `"node-3"`.
///
/// A newtype over `String` rather than a numeric id: cluster operators and
/// the HTTP surface both name nodes by this string, and the ring's
/// replica-set ordering uses its lexicographic order as the last-writer-wins
/// tie-break (see `Metadata::origin_node_id`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// Liveness as tracked by the local failure detector (§4.4).
///
/// This is this node's *opinion* of a peer, not a globally agreed fact —
/// different nodes may disagree transiently after a partition.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Liveness {
    Alive,
    Failed,
}

/// Logical node participating in the ring.
///
/// Keep this struct small and cheap to clone; heavy mutable state (the peer
/// link, heartbeat timestamps) lives in the streaming crate, keyed by this
/// node's `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// host:port this node's peer listener is bound to.
    pub address: SocketAddr,
    /// Optional data center label for topology-aware replication.
    pub datacenter: Option<String>,
    /// Optional rack label for rack-aware replication.
    pub rack: Option<String>,
    pub liveness: Liveness,
}

impl Node {
    /// Construct a new, presumed-alive node with basic metadata.
    pub fn new(id: impl Into<NodeId>, address: SocketAddr) -> Self {
        Self {
            id: id.into(),
            address,
            datacenter: None,
            rack: None,
            liveness: Liveness::Alive,
        }
    }

    pub fn with_topology(
        id: impl Into<NodeId>,
        address: SocketAddr,
        datacenter: impl Into<Option<String>>,
        rack: impl Into<Option<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            address,
            datacenter: datacenter.into(),
            rack: rack.into(),
            liveness: Liveness::Alive,
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.liveness, Liveness::Alive)
    }
}
