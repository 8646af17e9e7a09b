//! Core token trait definition.
//!
//! A token is a position in a partitioner's token space. The ring only needs
//! tokens to be ordered, comparable, and able to report a clockwise distance
//! to another token — everything else (how a token is produced from a key)
//! is the partitioner's job.

use std::fmt::Debug;
use std::hash::Hash;

/// Position in a partitioner's token space.
pub trait Token: Copy + Clone + Debug + Eq + Ord + Hash + Send + Sync + 'static {
    /// The smallest value in the token space.
    fn zero() -> Self;

    /// The largest value in the token space.
    fn max() -> Self;

    fn is_zero(&self) -> bool;

    fn is_max(&self) -> bool;

    /// Clockwise distance from `self` to `other`, wrapping around the ring
    /// if `other` is numerically smaller than `self`.
    fn distance_to(&self, other: &Self) -> Self;
}
