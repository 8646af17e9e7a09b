//! Replica placement: the target node list for a key plus the quorum size
//! that list must clear (§4.5).
//!
//! Quorum is a function of the *configured* replication factor, not of how
//! many nodes the ring could actually place (§8 invariant 6) — a ring with
//! fewer than R nodes still has the same quorum size, it just becomes
//! harder to reach.

use corelib::node::NodeId;

/// `Q = floor(R/2) + 1`.
pub fn quorum_for(replication_factor: usize) -> usize {
    replication_factor / 2 + 1
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaPlacement {
    pub targets: Vec<NodeId>,
    pub quorum: usize,
}

impl ReplicaPlacement {
    pub fn new(targets: Vec<NodeId>, replication_factor: usize) -> Self {
        Self {
            targets,
            quorum: quorum_for(replication_factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_is_floor_half_plus_one() {
        assert_eq!(quorum_for(1), 1);
        assert_eq!(quorum_for(2), 2);
        assert_eq!(quorum_for(3), 2);
        assert_eq!(quorum_for(5), 3);
    }
}
