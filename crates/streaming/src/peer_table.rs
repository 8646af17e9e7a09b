//! Peer Link table (`node_id → Link`, §5): written on connect/disconnect,
//! read on fan-out. Shared between the coordinator (which fans requests out
//! over it) and the failure detector (which heartbeats and evicts through
//! it), so both see the same live set of links.

use dashmap::DashMap;

use corelib::node::NodeId;

use crate::link::PeerLink;

#[derive(Default)]
pub struct PeerTable {
    links: DashMap<NodeId, PeerLink>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self {
            links: DashMap::new(),
        }
    }

    pub fn insert(&self, id: NodeId, link: PeerLink) {
        self.links.insert(id, link);
    }

    /// Absent during fan-out reports as `not_connected` for that target (§4.2).
    pub fn get(&self, id: &NodeId) -> Option<PeerLink> {
        self.links.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &NodeId) -> Option<PeerLink> {
        self.links.remove(id).map(|(_, link)| link)
    }

    pub fn iter_links(&self) -> Vec<(NodeId, PeerLink)> {
        self.links
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
