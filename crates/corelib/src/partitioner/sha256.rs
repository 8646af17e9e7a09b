//! SHA-256 partitioner: the partitioner backing the key-value store's ring.

use crate::partitioner::traits::Partitioner;
use crate::token::sha256::Sha256Token;
use crate::token::Token;

#[derive(Clone, Debug, Default)]
pub struct Sha256Partitioner;

impl Partitioner for Sha256Partitioner {
    type TokenType = Sha256Token;

    fn partition(&self, key: &[u8]) -> Self::TokenType {
        Sha256Token::from_bytes(key)
    }

    fn min_token(&self) -> Self::TokenType {
        Sha256Token::zero()
    }

    fn max_token(&self) -> Self::TokenType {
        <Sha256Token as Token>::max()
    }

    fn name(&self) -> &'static str {
        "Sha256Partitioner"
    }
}
