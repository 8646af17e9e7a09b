//! Hash ring data structure.
//!
//! The ring is a `BTreeMap<Sha256Token, NodeId>` behind a `parking_lot`
//! read-write lock. Writes (`add_node`/`remove_node`) clone the map, mutate
//! the clone, then swap it in under the write lock, so readers never block
//! on a write in progress and always see a consistent snapshot (§5).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::node::{Node, NodeId};
use crate::partitioner::{Partitioner, Sha256Partitioner};
use crate::token::sha256::Sha256Token;
use crate::vnode::VirtualNode;

#[derive(Clone, Debug, Default)]
struct RingState {
    tokens: BTreeMap<Sha256Token, NodeId>,
    nodes: HashMap<NodeId, Node>,
    vnode_counts: HashMap<NodeId, u32>,
}

/// Consistent hash ring mapping keys to the nodes responsible for them.
#[derive(Debug)]
pub struct HashRing {
    partitioner: Sha256Partitioner,
    state: RwLock<Arc<RingState>>,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for HashRing {
    fn clone(&self) -> Self {
        Self {
            partitioner: self.partitioner.clone(),
            state: RwLock::new(Arc::clone(&self.state.read())),
        }
    }
}

impl HashRing {
    pub fn new() -> Self {
        Self {
            partitioner: Sha256Partitioner,
            state: RwLock::new(Arc::new(RingState::default())),
        }
    }

    /// Adds `node` to the ring with `vnode_count` virtual nodes.
    ///
    /// Idempotent on an id already present: the node's previous vnodes and
    /// metadata are replaced rather than appended to (§4.2).
    pub fn add_node(&self, node: Node, vnode_count: u32) {
        let mut guard = self.state.write();
        let mut next = (**guard).clone();

        let id = node.id.clone();
        next.tokens.retain(|_, owner| owner != &id);

        for i in 0..vnode_count {
            let vnode = VirtualNode::from_index(id.clone(), i);
            next.tokens.insert(vnode.token(), id.clone());
        }
        next.vnode_counts.insert(id.clone(), vnode_count);
        next.nodes.insert(id, node);

        *guard = Arc::new(next);
    }

    /// Removes a node and all of its virtual nodes. Returns `false` if the
    /// node wasn't present.
    pub fn remove_node(&self, id: &NodeId) -> bool {
        let mut guard = self.state.write();
        if !guard.nodes.contains_key(id) {
            return false;
        }
        let mut next = (**guard).clone();
        next.tokens.retain(|_, owner| owner != id);
        next.nodes.remove(id);
        next.vnode_counts.remove(id);
        *guard = Arc::new(next);
        true
    }

    /// Returns the id of the node owning `key`'s ring position: the first
    /// node clockwise from the key's token, wrapping to the lowest token if
    /// the key's token is past the last one.
    pub fn lookup(&self, key: &[u8]) -> Option<NodeId> {
        let state = self.state.read().clone();
        if state.tokens.is_empty() {
            return None;
        }
        let token = self.partitioner.partition(key);
        state
            .tokens
            .range(token..)
            .next()
            .or_else(|| state.tokens.iter().next())
            .map(|(_, id)| id.clone())
    }

    pub fn lookup_node(&self, key: &[u8]) -> Option<Node> {
        let id = self.lookup(key)?;
        self.get_node(&id)
    }

    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.state.read().nodes.get(id).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn token_count(&self) -> usize {
        self.state.read().tokens.len()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.state.read().nodes.values().cloned().collect()
    }

    pub fn tokens(&self) -> Vec<(Sha256Token, NodeId)> {
        self.state
            .read()
            .tokens
            .iter()
            .map(|(t, id)| (*t, id.clone()))
            .collect()
    }

    pub fn partitioner_name(&self) -> &'static str {
        self.partitioner.name()
    }

    /// Walks the ring clockwise from `key`'s token, collecting up to `r`
    /// distinct physical nodes (§4.2 replica placement). Returns fewer than
    /// `r` ids if the ring has fewer than `r` distinct nodes.
    pub fn replicas(&self, key: &[u8], r: usize) -> Vec<NodeId> {
        let state = self.state.read().clone();
        if r == 0 || state.tokens.is_empty() {
            return Vec::new();
        }
        let token = self.partitioner.partition(key);
        let target = r.min(state.nodes.len());
        let mut result: Vec<NodeId> = Vec::with_capacity(target);

        let clockwise = state
            .tokens
            .range(token..)
            .chain(state.tokens.iter())
            .map(|(_, id)| id);

        for id in clockwise {
            if result.len() >= target {
                break;
            }
            if !result.contains(id) {
                result.push(id.clone());
            }
        }
        result
    }
}

/// Builder for assembling a ring with a default or per-node vnode count.
#[derive(Debug, Default)]
pub struct RingBuilder {
    default_vnodes: u32,
    pending: Vec<(Node, u32)>,
}

impl RingBuilder {
    pub fn new() -> Self {
        Self {
            default_vnodes: 256,
            pending: Vec::new(),
        }
    }

    pub fn with_vnodes(mut self, count: u32) -> Self {
        self.default_vnodes = count;
        self
    }

    pub fn add_node(mut self, node: Node) -> Self {
        let count = self.default_vnodes;
        self.pending.push((node, count));
        self
    }

    pub fn add_node_with_vnodes(mut self, node: Node, count: u32) -> Self {
        self.pending.push((node, count));
        self
    }

    pub fn build(self) -> HashRing {
        let ring = HashRing::new();
        for (node, count) in self.pending {
            ring.add_node(node, count);
        }
        ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn ring_with_nodes(count: u8, vnodes: u32) -> HashRing {
        let ring = HashRing::new();
        for i in 0..count {
            ring.add_node(Node::new(NodeId::new(format!("n{i}")), addr(9000 + i as u16)), vnodes);
        }
        ring
    }

    proptest! {
        // §4.2: replicas(k, r) always returns min(r, node_count) distinct
        // node ids, for any key and any ring populated with 1..=8 nodes.
        #[test]
        fn replicas_are_distinct_and_sized_correctly(
            node_count in 1u8..8,
            r in 1usize..6,
            key in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let ring = ring_with_nodes(node_count, 32);
            let replicas = ring.replicas(&key, r);

            let expected = r.min(node_count as usize);
            prop_assert_eq!(replicas.len(), expected);

            let unique: std::collections::HashSet<_> = replicas.iter().collect();
            prop_assert_eq!(unique.len(), replicas.len());
        }
    }

    #[test]
    fn lookup_is_stable_for_a_fixed_ring_and_key() {
        let ring = ring_with_nodes(4, 16);
        let first = ring.lookup(b"stable-key");
        for _ in 0..10 {
            assert_eq!(ring.lookup(b"stable-key"), first);
        }
    }

    #[test]
    fn replicas_on_empty_ring_is_empty() {
        let ring = HashRing::new();
        assert!(ring.replicas(b"anything", 3).is_empty());
    }
}
