//! Ring topology abstractions and operations.
//!
//! This module provides high-level views over the hash ring: ownership
//! ranges (which tokens belong to which nodes), ownership percentages, a
//! human-readable ring description, and replica-set discovery for a key.

use crate::node::NodeId;
use crate::ring::HashRing;
use crate::token::sha256::Sha256Token;
use std::collections::HashMap;

/// Read-only view over a `HashRing` for inspection and replica placement.
///
/// A lightweight wrapper: all operations take a read lock on the underlying
/// ring and are `O(n)` in the number of tokens.
#[derive(Clone)]
pub struct Topology {
    ring: HashRing,
}

impl Topology {
    pub fn new(ring: HashRing) -> Self {
        Self { ring }
    }

    /// Tokens owned by each node, sorted ascending per node.
    pub fn ownership(&self) -> HashMap<NodeId, Vec<Sha256Token>> {
        let mut ownership: HashMap<NodeId, Vec<Sha256Token>> = HashMap::new();
        for (token, node_id) in self.ring.tokens() {
            ownership.entry(node_id).or_default().push(token);
        }
        for tokens in ownership.values_mut() {
            tokens.sort();
        }
        ownership
    }

    /// Fraction of the ring's token space (0.0-100.0) each node owns.
    pub fn ownership_percentages(&self) -> HashMap<NodeId, f64> {
        let ownership = self.ownership();
        let total_tokens = self.ring.token_count() as f64;
        if total_tokens == 0.0 {
            return HashMap::new();
        }
        ownership
            .into_iter()
            .map(|(node_id, tokens)| (node_id, (tokens.len() as f64 / total_tokens) * 100.0))
            .collect()
    }

    /// Human-readable summary of ring membership and distribution.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        out.push_str("Ring Description:\n");
        out.push_str(&format!("  Nodes: {}\n", self.ring.node_count()));
        out.push_str(&format!("  Total Tokens: {}\n", self.ring.token_count()));
        out.push_str(&format!("  Partitioner: {}\n", self.ring.partitioner_name()));

        let percentages = self.ownership_percentages();
        let ownership = self.ownership();
        if !percentages.is_empty() {
            out.push_str("\nNode Ownership:\n");
            let mut nodes: Vec<_> = percentages.iter().collect();
            nodes.sort_by(|(a, _), (b, _)| a.cmp(b));
            for (node_id, percentage) in nodes {
                let token_count = ownership.get(node_id).map(|v| v.len()).unwrap_or(0);
                out.push_str(&format!(
                    "  {}: {} tokens ({:.2}%)\n",
                    node_id, token_count, percentage
                ));
            }
        }
        out
    }

    /// Replica set for `key`: the primary owner plus the next
    /// `replica_count - 1` distinct nodes walking clockwise (§4.2).
    pub fn replicas_for_key(&self, key: &[u8], replica_count: usize) -> Vec<NodeId> {
        self.ring.replicas(key, replica_count)
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }
}

impl From<HashRing> for Topology {
    fn from(ring: HashRing) -> Self {
        Self::new(ring)
    }
}
