//! ByteOrderedPartitioner: the token *is* the raw routing-key bytes, ordered
//! lexicographically (§4.A).

use super::{Partitioner, Token};
use crate::errors::TokenParseError;

pub struct ByteOrderedPartitioner;

impl Partitioner for ByteOrderedPartitioner {
    fn name() -> &'static str {
        "ByteOrderedPartitioner"
    }

    fn hash(data: &[u8]) -> Token {
        Token::ByteOrdered(data.to_vec())
    }

    /// System tables render byte-ordered tokens as hex strings.
    fn parse(s: &str) -> Result<Token, TokenParseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TokenParseError::Empty);
        }
        if trimmed.len() % 2 != 0 {
            return Err(TokenParseError::NotAnInteger(s.to_string()));
        }
        let mut bytes = Vec::with_capacity(trimmed.len() / 2);
        let chars: Vec<char> = trimmed.chars().collect();
        for pair in chars.chunks(2) {
            let byte_str: String = pair.iter().collect();
            let byte = u8::from_str_radix(&byte_str, 16)
                .map_err(|_| TokenParseError::NotAnInteger(s.to_string()))?;
            bytes.push(byte);
        }
        Ok(Token::ByteOrdered(bytes))
    }

    fn format(token: &Token) -> String {
        match token {
            Token::ByteOrdered(bytes) => bytes.iter().map(|b| format!("{:02x}", b)).collect(),
            _ => panic!("format called with a token from a different partitioner"),
        }
    }
}
