//! Tests for the hash ring implementation.
//!
//! Covers empty-ring behavior, add/lookup/remove, multi-node distribution,
//! builder configuration, wraparound, and the idempotent re-add required by
//! the ring's membership contract.

use corelib::node::{Node, NodeId};
use corelib::ring::HashRing;
use std::net::SocketAddr;

fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

#[test]
fn empty_ring_lookup() {
    let ring = HashRing::new();
    assert_eq!(ring.lookup(b"key1"), None);
    assert_eq!(ring.lookup_node(b"key1"), None);
    assert_eq!(ring.node_count(), 0);
    assert_eq!(ring.token_count(), 0);
}

#[test]
fn add_node_and_lookup() {
    let ring = HashRing::new();
    let node = Node::new("A", addr(9001));

    ring.add_node(node.clone(), 4);

    assert_eq!(ring.node_count(), 1);
    assert_eq!(ring.token_count(), 4);

    let result = ring.lookup(b"test-key");
    assert_eq!(result, Some(NodeId::new("A")));

    let node_meta = ring.lookup_node(b"test-key").expect("node metadata");
    assert_eq!(node_meta.id, NodeId::new("A"));

    let retrieved = ring.get_node(&NodeId::new("A")).expect("get_node");
    assert_eq!(retrieved.id, NodeId::new("A"));
}

#[test]
fn remove_node() {
    let ring = HashRing::new();

    ring.add_node(Node::new("A", addr(9001)), 4);
    ring.add_node(Node::new("B", addr(9002)), 4);

    assert_eq!(ring.node_count(), 2);
    assert_eq!(ring.token_count(), 8);

    assert!(ring.remove_node(&NodeId::new("A")));

    assert_eq!(ring.node_count(), 1);
    assert_eq!(ring.token_count(), 4);

    let result = ring.lookup(b"some-key");
    assert_eq!(result, Some(NodeId::new("B")));

    assert!(ring.get_node(&NodeId::new("A")).is_none());
    assert!(ring.get_node(&NodeId::new("B")).is_some());

    assert!(!ring.remove_node(&NodeId::new("missing")));
}

#[test]
fn multiple_nodes_all_lookups_resolve() {
    let ring = HashRing::new();

    ring.add_node(Node::new("A", addr(9001)), 8);
    ring.add_node(Node::new("B", addr(9002)), 8);
    ring.add_node(Node::new("C", addr(9003)), 8);

    assert_eq!(ring.node_count(), 3);
    assert_eq!(ring.token_count(), 24);

    let ids: Vec<NodeId> = vec![NodeId::new("A"), NodeId::new("B"), NodeId::new("C")];
    for key in [b"key1".as_slice(), b"key2", b"key3"] {
        let owner = ring.lookup(key).expect("lookup succeeds");
        assert!(ids.contains(&owner));
    }
}

#[test]
fn lookup_is_deterministic_for_a_fixed_ring() {
    let ring = HashRing::new();
    ring.add_node(Node::new("A", addr(9001)), 8);
    ring.add_node(Node::new("B", addr(9002)), 8);

    let key = b"consistent-key";
    let first = ring.lookup(key);
    let second = ring.lookup(key);
    let third = ring.lookup(key);

    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn ring_builder_default_vnode_count() {
    let ring = corelib::ring::RingBuilder::new()
        .add_node(Node::new("A", addr(9001)))
        .add_node(Node::new("B", addr(9002)))
        .build();

    assert!(ring.lookup(b"key").is_some());
    assert_eq!(ring.node_count(), 2);
    assert_eq!(ring.token_count(), 512); // 2 nodes * default 256 vnodes
}

#[test]
fn ring_builder_custom_vnode_count() {
    let ring = corelib::ring::RingBuilder::new()
        .with_vnodes(8)
        .add_node(Node::new("A", addr(9001)))
        .add_node(Node::new("B", addr(9002)))
        .build();

    assert!(ring.lookup(b"key").is_some());
    assert_eq!(ring.node_count(), 2);
    assert_eq!(ring.token_count(), 16);
}

#[test]
fn ring_builder_mixed_vnode_counts() {
    let ring = corelib::ring::RingBuilder::new()
        .with_vnodes(4)
        .add_node(Node::new("A", addr(9001)))
        .add_node_with_vnodes(Node::new("B", addr(9002)), 8)
        .build();

    assert_eq!(ring.node_count(), 2);
    assert_eq!(ring.token_count(), 12);
}

#[test]
fn single_node_owns_every_key() {
    let ring = HashRing::new();
    ring.add_node(Node::new("A", addr(9001)), 4);

    for key in [b"key1".as_slice(), b"key2", b"key3", b"very-long-key-name"] {
        assert_eq!(ring.lookup(key), Some(NodeId::new("A")));
    }
}

#[test]
fn add_remove_add_restores_membership() {
    let ring = HashRing::new();

    ring.add_node(Node::new("A", addr(9001)), 4);
    assert_eq!(ring.node_count(), 1);

    assert!(ring.remove_node(&NodeId::new("A")));
    assert_eq!(ring.node_count(), 0);

    ring.add_node(Node::new("A", addr(9001)), 4);
    assert_eq!(ring.node_count(), 1);
    assert!(ring.lookup(b"key").is_some());
}

#[test]
fn adding_the_same_node_id_twice_is_idempotent() {
    // Re-adding a node replaces its vnodes rather than accumulating more of
    // them: the token count reflects only the most recent add_node call.
    let ring = HashRing::new();

    let node = Node::new("A", addr(9001));
    ring.add_node(node.clone(), 4);
    assert_eq!(ring.token_count(), 4);
    assert_eq!(ring.node_count(), 1);

    ring.add_node(node, 4);
    assert_eq!(ring.token_count(), 4);
    assert_eq!(ring.node_count(), 1);
}

#[test]
fn re_adding_with_a_different_vnode_count_replaces_the_old_set() {
    let ring = HashRing::new();

    ring.add_node(Node::new("A", addr(9001)), 4);
    assert_eq!(ring.token_count(), 4);

    ring.add_node(Node::new("A", addr(9001)), 16);
    assert_eq!(ring.token_count(), 16);
    assert_eq!(ring.node_count(), 1);
}

#[test]
fn get_all_nodes() {
    let ring = HashRing::new();

    ring.add_node(Node::new("A", addr(9001)), 4);
    ring.add_node(Node::new("B", addr(9002)), 4);

    let nodes = ring.nodes();
    assert_eq!(nodes.len(), 2);

    let ids: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
    assert!(ids.contains(&NodeId::new("A")));
    assert!(ids.contains(&NodeId::new("B")));
}

#[test]
fn get_all_tokens() {
    let ring = HashRing::new();

    ring.add_node(Node::new("A", addr(9001)), 4);

    let tokens = ring.tokens();
    assert_eq!(tokens.len(), 4);

    for (_, node_id) in tokens {
        assert_eq!(node_id, NodeId::new("A"));
    }
}

#[test]
fn partitioner_name_is_sha256() {
    let ring = HashRing::new();
    assert_eq!(ring.partitioner_name(), "Sha256Partitioner");
}

#[test]
fn replicas_returns_distinct_nodes_up_to_ring_size() {
    let ring = HashRing::new();
    ring.add_node(Node::new("A", addr(9001)), 32);
    ring.add_node(Node::new("B", addr(9002)), 32);

    let replicas = ring.replicas(b"some-key", 3);
    // Only 2 distinct physical nodes exist, so the replica set tops out there.
    assert_eq!(replicas.len(), 2);
    let unique: std::collections::HashSet<_> = replicas.iter().collect();
    assert_eq!(unique.len(), 2);
}
