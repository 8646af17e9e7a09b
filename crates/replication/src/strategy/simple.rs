//! Simple replication strategy: `replication_factor` replicas placed
//! clockwise around the ring starting from the key's primary (§4.2).

use crate::strategy::ReplicationStrategy;
use corelib::node::NodeId;
use corelib::ring::HashRing;

#[derive(Debug, Clone)]
pub struct SimpleStrategy {
    replication_factor: usize,
}

impl SimpleStrategy {
    pub fn new(replication_factor: usize) -> Self {
        Self { replication_factor }
    }
}

impl Default for SimpleStrategy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl ReplicationStrategy for SimpleStrategy {
    fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    fn replicas_for_key(&self, ring: &HashRing, key: &[u8]) -> Vec<NodeId> {
        ring.replicas(key, self.replication_factor)
    }

    fn name(&self) -> &'static str {
        "SimpleStrategy"
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
    fn reports_its_configured_replication_factor() {
        let strategy = SimpleStrategy::new(3);
        assert_eq!(strategy.replication_factor(), 3);
    }

    #[test]
    fn returns_distinct_replicas_up_to_the_factor() {
        let ring = HashRing::new();
        ring.add_node(Node::new("A", addr(9001)), 8);
        ring.add_node(Node::new("B", addr(9002)), 8);
        ring.add_node(Node::new("C", addr(9003)), 8);

        let strategy = SimpleStrategy::new(3);
        let replicas = strategy.replicas_for_key(&ring, b"test-key");

        assert_eq!(replicas.len(), 3);
        let unique: std::collections::HashSet<_> = replicas.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn caps_at_the_number_of_distinct_nodes_available() {
        let ring = HashRing::new();
        ring.add_node(Node::new("A", addr(9001)), 8);

        let strategy = SimpleStrategy::new(3);
        let replicas = strategy.replicas_for_key(&ring, b"test-key");

        assert_eq!(replicas.len(), 1);
    }
}
