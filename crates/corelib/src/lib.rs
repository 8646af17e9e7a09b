//! Core library for the replicated key-value store.
//!
//! This crate provides the fundamental abstractions shared by every other
//! crate in the workspace:
//! - Token types and partitioners for consistent hashing
//! - The hash ring and its topology views
//! - Node and virtual node abstractions
//! - The in-memory Local Store

pub mod clock;
pub mod error;
pub mod node;
pub mod partitioner;
pub mod ring;
pub mod store;
pub mod token;
pub mod topology;
pub mod vnode;

pub use clock::{Clock, SystemClock, TestClock};
pub use error::{Error, Result};
pub use node::{Liveness, Node, NodeId};
pub use partitioner::Partitioner;
pub use ring::{Ring, RingBuilder};
pub use store::{LocalStore, Metadata, PutOutcome, Record};
pub use token::Token;
pub use topology::Topology;
pub use vnode::VirtualNode;
