//! Topology-aware replication strategy: spreads replicas across distinct
//! data centers before doubling up, so a single DC outage doesn't cost a
//! key all of its copies.
//!
//! Walks the ring clockwise from the key's primary exactly like
//! `SimpleStrategy`, but on the first pass only takes a node from a data
//! center not yet represented in the replica set. If the ring runs out of
//! fresh data centers before `replication_factor` is reached, a second
//! clockwise pass fills the remaining slots from whatever distinct nodes
//! are left, same-DC or not.

use std::collections::HashSet;

use corelib::node::NodeId;
use corelib::ring::HashRing;

use crate::strategy::ReplicationStrategy;

#[derive(Debug, Clone)]
pub struct NetworkTopologyStrategy {
    replication_factor: usize,
}

impl NetworkTopologyStrategy {
    pub fn new(replication_factor: usize) -> Self {
        Self { replication_factor }
    }
}

impl ReplicationStrategy for NetworkTopologyStrategy {
    fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    fn replicas_for_key(&self, ring: &HashRing, key: &[u8]) -> Vec<NodeId> {
        if self.replication_factor == 0 {
            return Vec::new();
        }

        let mut tokens = ring.tokens();
        if tokens.is_empty() {
            return Vec::new();
        }
        tokens.sort_by_key(|(token, _)| *token);

        let Some(primary) = ring.lookup(key) else {
            return Vec::new();
        };
        let start_idx = tokens
            .iter()
            .position(|(_, id)| *id == primary)
            .unwrap_or(0);

        let clockwise_ids: Vec<NodeId> = (0..tokens.len())
            .map(|i| tokens[(start_idx + i) % tokens.len()].1.clone())
            .collect();

        let total_nodes = ring.node_count();
        let target = self.replication_factor.min(total_nodes);

        let mut chosen: Vec<NodeId> = Vec::with_capacity(target);
        let mut seen_nodes: HashSet<NodeId> = HashSet::new();
        let mut seen_dcs: HashSet<Option<String>> = HashSet::new();

        // First pass: one node per fresh data center.
        for id in &clockwise_ids {
            if chosen.len() >= target {
                break;
            }
            if seen_nodes.contains(id) {
                continue;
            }
            let dc = ring.get_node(id).and_then(|n| n.datacenter);
            if seen_dcs.contains(&dc) {
                continue;
            }
            seen_nodes.insert(id.clone());
            seen_dcs.insert(dc);
            chosen.push(id.clone());
        }

        // Second pass: fill any remaining slots from leftover distinct nodes.
        if chosen.len() < target {
            for id in &clockwise_ids {
                if chosen.len() >= target {
                    break;
                }
                if seen_nodes.contains(id) {
                    continue;
                }
                seen_nodes.insert(id.clone());
                chosen.push(id.clone());
            }
        }

        chosen
    }

    fn name(&self) -> &'static str {
        "NetworkTopologyStrategy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::node::Node;
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn spreads_across_data_centers_before_doubling_up() {
        let ring = HashRing::new();
        ring.add_node(
            Node::with_topology("A", addr(9001), Some("dc1".to_string()), None),
            16,
        );
        ring.add_node(
            Node::with_topology("B", addr(9002), Some("dc1".to_string()), None),
            16,
        );
        ring.add_node(
            Node::with_topology("C", addr(9003), Some("dc2".to_string()), None),
            16,
        );

        let strategy = NetworkTopologyStrategy::new(2);
        let replicas = strategy.replicas_for_key(&ring, b"some-key");

        assert_eq!(replicas.len(), 2);
        let dcs: HashSet<Option<String>> = replicas
            .iter()
            .map(|id| ring.get_node(id).and_then(|n| n.datacenter))
            .collect();
        assert_eq!(dcs.len(), 2, "replicas should land in two distinct DCs");
    }

    #[test]
    fn falls_back_to_same_dc_when_out_of_fresh_ones() {
        let ring = HashRing::new();
        ring.add_node(
            Node::with_topology("A", addr(9001), Some("dc1".to_string()), None),
            16,
        );
        ring.add_node(
            Node::with_topology("B", addr(9002), Some("dc1".to_string()), None),
            16,
        );

        let strategy = NetworkTopologyStrategy::new(2);
        let replicas = strategy.replicas_for_key(&ring, b"some-key");

        assert_eq!(replicas.len(), 2);
    }
}
