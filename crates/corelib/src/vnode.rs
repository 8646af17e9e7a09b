//! Virtual node abstractions.
//!
//! Virtual nodes are the technique consistent hashing uses to smooth load
//! distribution: instead of one ring position per physical node, each node
//! gets `V` positions, derived by hashing `"{node_id}:{i}"` for `i` in
//! `[0, V)` (§3). A node joining or leaving then perturbs roughly `1/V` of
//! the key space instead of one contiguous arc.

use crate::node::NodeId;
use crate::token::sha256::Sha256Token;
use crate::token::traits::Token;

/// A single ring position owned by a physical node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualNode {
    /// Token position on the ring.
    pub token: Sha256Token,
    /// The physical node that owns this virtual node.
    pub node_id: NodeId,
}

impl VirtualNode {
    #[inline]
    pub fn new(token: Sha256Token, node_id: NodeId) -> Self {
        Self { token, node_id }
    }

    /// Creates a virtual node from a node id and vnode index, hashing
    /// `"{node_id}:{index}"` to get its ring position.
    pub fn from_index(node_id: NodeId, vnode_index: u32) -> Self {
        let vnode_key = format!("{}:{}", node_id, vnode_index);
        let token = Sha256Token::from_key(&vnode_key);
        Self::new(token, node_id)
    }

    #[inline]
    pub fn token(&self) -> Sha256Token {
        self.token
    }

    #[inline]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    #[inline]
    pub fn distance_to(&self, other: &Self) -> Sha256Token {
        self.token.distance_to(&other.token)
    }
}

impl std::fmt::Display for VirtualNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VNode(token={:08x}, node={})", self.token.0, self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_indices_usually_give_distinct_tokens() {
        let id = NodeId::new("A");
        let v0 = VirtualNode::from_index(id.clone(), 0);
        let v1 = VirtualNode::from_index(id, 1);
        assert_ne!(v0.token(), v1.token());
        assert_eq!(v0.node_id(), v1.node_id());
    }

    #[test]
    fn from_index_is_deterministic() {
        let id = NodeId::new("A");
        assert_eq!(
            VirtualNode::from_index(id.clone(), 7),
            VirtualNode::from_index(id, 7)
        );
    }

    #[test]
    fn distance_matches_token_distance() {
        let v1 = VirtualNode::new(Sha256Token(100), NodeId::new("A"));
        let v2 = VirtualNode::new(Sha256Token(200), NodeId::new("B"));
        assert_eq!(v1.distance_to(&v2), Sha256Token(100));
    }
}
