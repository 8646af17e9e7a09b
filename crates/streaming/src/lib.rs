//! Peer Link transport, wire protocol, and failure detection for the
//! replicated key-value store.
//!
//! This crate owns everything node-to-node: the framed wire protocol
//! (`protocol`, `codec`), the per-peer multiplexed channel built on top of
//! it (`link`), the heartbeat-driven liveness tracker (`failure_detector`),
//! and the ring-snapshot payload used when a node joins (`snapshot`).

pub mod codec;
pub mod error;
pub mod failure_detector;
pub mod link;
pub mod peer_table;
pub mod protocol;
pub mod snapshot;

pub use error::{Result, StreamingError};
pub use failure_detector::FailureDetector;
pub use link::{IncomingRequest, LinkState, PeerLink, ReplyHandle, Unsolicited, DEFAULT_REQUEST_TIMEOUT};
pub use peer_table::PeerTable;
pub use protocol::{Envelope, NodeSnapshot, PeerMessage};
