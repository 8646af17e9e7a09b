//! SHA-256 ring-position token.
//!
//! This is the token type the key-value store's ring actually uses: a
//! position is the first 4 bytes of `SHA-256(key)` read as a big-endian
//! `u32`, giving a 2^32 token space.

use crate::token::traits::Token;
use sha2::{Digest, Sha256};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Sha256Token(pub u32);

impl Token for Sha256Token {
    fn zero() -> Self {
        Sha256Token(0)
    }

    fn max() -> Self {
        Sha256Token(u32::MAX)
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }

    fn is_max(&self) -> bool {
        self.0 == u32::MAX
    }

    fn distance_to(&self, other: &Self) -> Self {
        if other.0 >= self.0 {
            Sha256Token(other.0 - self.0)
        } else {
            Sha256Token((u32::MAX - self.0) + other.0 + 1)
        }
    }
}

impl Sha256Token {
    /// Hashes `data` with SHA-256 and takes the first 4 bytes, big-endian,
    /// as the ring position.
    pub fn from_bytes(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&digest[0..4]);
        Sha256Token(u32::from_be_bytes(buf))
    }

    pub fn from_key(key: &str) -> Self {
        Self::from_bytes(key.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector_is_deterministic() {
        let a = Sha256Token::from_key("hello");
        let b = Sha256Token::from_key("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_usually_differ() {
        assert_ne!(Sha256Token::from_key("a"), Sha256Token::from_key("b"));
    }

    #[test]
    fn distance_wraps_around_the_ring() {
        let a = Sha256Token(u32::MAX - 10);
        let b = Sha256Token(5);
        // 10 steps to wrap to zero, then 5 more.
        assert_eq!(a.distance_to(&b), Sha256Token(16));
    }

    #[test]
    fn distance_forward_is_simple_subtraction() {
        let a = Sha256Token(100);
        let b = Sha256Token(250);
        assert_eq!(a.distance_to(&b), Sha256Token(150));
    }
}
