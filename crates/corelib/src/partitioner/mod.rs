//! Partitioner abstraction for consistent hashing.
//!
//! Partitioners are responsible for converting keys into tokens
//! that can be placed on the hash ring.

pub mod sha256;
pub mod traits;

pub use sha256::Sha256Partitioner;
pub use traits::Partitioner;
