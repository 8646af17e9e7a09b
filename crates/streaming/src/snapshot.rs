//! Ring snapshot exchanged during `join` (§4.5.3).

use corelib::node::Node;
use corelib::ring::HashRing;

use crate::protocol::NodeSnapshot;

/// Builds the list of `NodeSnapshot`s a joining peer needs to populate its
/// own ring, from the local ring's current membership.
pub fn snapshot_of(ring: &HashRing) -> Vec<NodeSnapshot> {
    ring.nodes()
        .into_iter()
        .map(|n| NodeSnapshot {
            node_id: n.id,
            address: n.address,
        })
        .collect()
}

/// Vnode count a joining node should use for nodes it only knows about via
/// a snapshot (it has no opinion on vnode count; callers apply their own
/// configured default).
pub fn node_from_snapshot(snapshot: &NodeSnapshot) -> Node {
    Node::new(snapshot.node_id.clone(), snapshot.address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn snapshot_lists_every_ring_member() {
        let ring = HashRing::new();
        ring.add_node(Node::new("A", addr(9001)), 4);
        ring.add_node(Node::new("B", addr(9002)), 4);

        let snapshot = snapshot_of(&ring);
        assert_eq!(snapshot.len(), 2);
    }
}
