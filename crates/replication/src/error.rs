//! Error kinds the coordinator raises (§7). Per-replica outcomes
//! (`peer_timeout`, `peer_not_connected`) are data tallied into a result,
//! not errors — only conditions that leave the operation itself unable to
//! proceed are represented here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplicationError>;

#[derive(Debug, Error)]
pub enum ReplicationError {
    /// PUT/GET attempted before any node has joined the ring.
    #[error("ring has no nodes")]
    RingEmpty,
    /// No seed accepted a bootstrap connection during `join`.
    #[error("no seed accepted the join request")]
    JoinFailed,
}
