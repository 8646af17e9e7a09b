//! Error types for peer links and the wire protocol.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamingError>;

#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("peer request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("peer is not connected")]
    NotConnected,
    #[error("link is closed")]
    Closed,
    #[error("message arrived before identify")]
    NotIdentified,
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode/decode error: {0}")]
    Codec(#[from] bincode::Error),
}
