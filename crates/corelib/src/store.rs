//! Local Store: the in-memory key-value map each node keeps for the keys it
//! is a replica of (§4.1).
//!
//! A record's conflict resolution is last-writer-wins on `Metadata::timestamp`,
//! stable on exact ties (the first-stored record wins). `put` never fails;
//! there's no invalid input it can receive that isn't already rejected
//! upstream by the coordinator.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// Per-record write provenance and ordering information (§3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Wall-clock millisecond timestamp at the coordinator that accepted the write.
    pub timestamp: u64,
    /// Reserved for a future vector-clock style scheme; the current system
    /// always sets this to 1 and orders purely by `timestamp`.
    pub version: u64,
    /// The node id of the coordinator that accepted the write. Serialized as
    /// `nodeId` to match the GET response's `metadata` shape (§6.1).
    #[serde(rename = "nodeId")]
    pub origin_node_id: NodeId,
}

impl Metadata {
    pub fn new(timestamp: u64, origin_node_id: NodeId) -> Self {
        Self {
            timestamp,
            version: 1,
            origin_node_id,
        }
    }
}

/// A stored key-value pair plus its write metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub metadata: Metadata,
}

/// Outcome of a `put` call, distinguishing an accepted write from a write
/// that lost to an existing, newer record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    SkippedOlder,
}

/// In-memory map of key to `(value, metadata)`.
///
/// Backed by `DashMap`, so per-key operations are linearizable without a
/// single global lock; there is no ordering guarantee across different keys.
#[derive(Debug, Default)]
pub struct LocalStore {
    records: DashMap<Vec<u8>, Record>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Stores `value` under `key` if no record exists yet, or if
    /// `metadata.timestamp` is strictly greater than the stored record's.
    /// Ties go to the record already present.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>, metadata: Metadata) -> PutOutcome {
        match self.records.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Record {
                    key,
                    value,
                    metadata,
                });
                PutOutcome::Written
            }
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                if metadata.timestamp > slot.get().metadata.timestamp {
                    slot.insert(Record {
                        key,
                        value,
                        metadata,
                    });
                    PutOutcome::Written
                } else {
                    PutOutcome::SkippedOlder
                }
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Record> {
        self.records.get(key).map(|r| r.clone())
    }

    /// Keys currently stored, for diagnostics only — no ordering guarantee.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(ts: u64) -> Metadata {
        Metadata::new(ts, NodeId::new("A"))
    }

    #[test]
    fn put_on_empty_key_writes() {
        let store = LocalStore::new();
        let outcome = store.put(b"k".to_vec(), b"v1".to_vec(), meta(100));
        assert_eq!(outcome, PutOutcome::Written);
        assert_eq!(store.get(b"k").unwrap().value, b"v1");
    }

    #[test]
    fn newer_timestamp_overwrites() {
        let store = LocalStore::new();
        store.put(b"k".to_vec(), b"v1".to_vec(), meta(100));
        let outcome = store.put(b"k".to_vec(), b"v2".to_vec(), meta(200));
        assert_eq!(outcome, PutOutcome::Written);
        assert_eq!(store.get(b"k").unwrap().value, b"v2");
    }

    #[test]
    fn older_timestamp_is_skipped() {
        let store = LocalStore::new();
        store.put(b"k".to_vec(), b"v2".to_vec(), meta(200));
        let outcome = store.put(b"k".to_vec(), b"v1".to_vec(), meta(100));
        assert_eq!(outcome, PutOutcome::SkippedOlder);
        assert_eq!(store.get(b"k").unwrap().value, b"v2");
    }

    #[test]
    fn equal_timestamp_keeps_first_write() {
        let store = LocalStore::new();
        store.put(b"k".to_vec(), b"first".to_vec(), meta(100));
        let outcome = store.put(b"k".to_vec(), b"second".to_vec(), meta(100));
        assert_eq!(outcome, PutOutcome::SkippedOlder);
        assert_eq!(store.get(b"k").unwrap().value, b"first");
    }

    #[test]
    fn get_on_missing_key_is_none() {
        let store = LocalStore::new();
        assert!(store.get(b"nope").is_none());
    }

    #[test]
    fn keys_enumerates_stored_entries() {
        let store = LocalStore::new();
        store.put(b"a".to_vec(), b"1".to_vec(), meta(1));
        store.put(b"b".to_vec(), b"2".to_vec(), meta(1));
        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
