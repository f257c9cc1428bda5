//! Token hashing and lexical parsing of token strings (§4.A).

mod byte_ordered;
mod murmur3;
mod random;

pub use byte_ordered::ByteOrderedPartitioner;
pub use murmur3::Murmur3Partitioner;
pub use random::RandomPartitioner;

use std::cmp::Ordering;

use crate::errors::TokenParseError;

/// A partitioner-parametric token (§3.1). Partitioners never mix: a
/// `Token::Murmur3` is only ever compared against another `Token::Murmur3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Murmur3(i64),
    Random(u128),
    ByteOrdered(Vec<u8>),
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Token::Murmur3(a), Token::Murmur3(b)) => a.partial_cmp(b),
            (Token::Random(a), Token::Random(b)) => a.partial_cmp(b),
            (Token::ByteOrdered(a), Token::ByteOrdered(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .expect("tokens from different partitioners are never compared")
    }
}

/// Shared capability set every partitioner variant implements (§4.A).
pub trait Partitioner {
    /// Partitioner name suffix as advertised by `system.local.partitioner`
    /// (e.g. `"Murmur3Partitioner"`).
    fn name() -> &'static str;

    /// Hashes a routing-key byte slice into this partitioner's token space.
    fn hash(data: &[u8]) -> Token;

    /// Parses a token's decimal-string representation.
    fn parse(s: &str) -> Result<Token, TokenParseError>;

    /// Renders a token back to the decimal-string representation `parse`
    /// accepts (§8.2's round-trip law).
    fn format(token: &Token) -> String;
}

/// Picks the partitioner implied by a `system.local.partitioner` class name,
/// matching on a suffix the way `cass::TokenMap::from_partitioner` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionerKind {
    Murmur3,
    Random,
    ByteOrdered,
}

impl PartitionerKind {
    pub fn from_class_name(class_name: &str) -> Option<Self> {
        if class_name.ends_with(Murmur3Partitioner::name()) {
            Some(PartitionerKind::Murmur3)
        } else if class_name.ends_with(RandomPartitioner::name()) {
            Some(PartitionerKind::Random)
        } else if class_name.ends_with(ByteOrderedPartitioner::name()) {
            Some(PartitionerKind::ByteOrdered)
        } else {
            None
        }
    }

    pub fn hash(&self, data: &[u8]) -> Token {
        match self {
            PartitionerKind::Murmur3 => Murmur3Partitioner::hash(data),
            PartitionerKind::Random => RandomPartitioner::hash(data),
            PartitionerKind::ByteOrdered => ByteOrderedPartitioner::hash(data),
        }
    }

    pub fn parse(&self, s: &str) -> Result<Token, TokenParseError> {
        match self {
            PartitionerKind::Murmur3 => Murmur3Partitioner::parse(s),
            PartitionerKind::Random => RandomPartitioner::parse(s),
            PartitionerKind::ByteOrdered => ByteOrderedPartitioner::parse(s),
        }
    }

    pub fn format(&self, token: &Token) -> String {
        match self {
            PartitionerKind::Murmur3 => Murmur3Partitioner::format(token),
            PartitionerKind::Random => RandomPartitioner::format(token),
            PartitionerKind::ByteOrdered => ByteOrderedPartitioner::format(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitioner_kind_matches_on_suffix() {
        assert_eq!(
            PartitionerKind::from_class_name("org.apache.cassandra.dht.Murmur3Partitioner"),
            Some(PartitionerKind::Murmur3)
        );
        assert_eq!(
            PartitionerKind::from_class_name("org.apache.cassandra.dht.RandomPartitioner"),
            Some(PartitionerKind::Random)
        );
        assert_eq!(
            PartitionerKind::from_class_name("org.apache.cassandra.dht.ByteOrderedPartitioner"),
            Some(PartitionerKind::ByteOrdered)
        );
        assert_eq!(PartitionerKind::from_class_name("unknown.Strategy"), None);
    }
}
