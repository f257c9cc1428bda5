//! The token ring and per-keyspace replica tables (§4.C).

mod precomputed_replicas;
mod token_map;

pub use token_map::TokenMap;

use std::cmp::Ordering;
use std::sync::Arc;

use crate::host::Host;
use crate::partitioner::Token;

/// A sorted, deduplicated `(Token, Host)` sequence for one partitioner
/// (§3.1). Lookup of a token `t` yields the first pair whose token is `> t`,
/// wrapping around if none exists (§3.1, §4.C).
#[derive(Debug, Default, Clone)]
pub struct TokenRing {
    entries: Vec<(Token, Arc<Host>)>,
}

impl TokenRing {
    pub fn entries(&self) -> &[(Token, Arc<Host>)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuilds from scratch out of an arbitrary unsorted, possibly
    /// duplicate-token set of pending inserts: sorts by token, and where two
    /// entries share a token the most recently-inserted one wins (§4.C
    /// "duplicates are the most recent insertion wins"). Insertion order in
    /// `pending` is assumed to reflect recency (later entries are newer).
    pub fn rebuild(pending: Vec<(Token, Arc<Host>)>) -> Self {
        let mut by_token: Vec<(Token, Arc<Host>)> = Vec::with_capacity(pending.len());
        let mut last_index: std::collections::HashMap<Token, usize> = std::collections::HashMap::new();
        for (token, host) in pending {
            if let Some(&idx) = last_index.get(&token) {
                by_token[idx] = (token, host);
            } else {
                last_index.insert(token.clone(), by_token.len());
                by_token.push((token, host));
            }
        }
        by_token.sort_by(|a, b| a.0.cmp(&b.0));
        TokenRing { entries: by_token }
    }

    /// First entry with token strictly greater than `t`, wrapping to the
    /// first entry of the ring if `t` is `>=` every token present (§3.1).
    pub fn owner_of(&self, t: &Token) -> Option<&(Token, Arc<Host>)> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = self
            .entries
            .partition_point(|(token, _)| matches!(token.cmp(t), Ordering::Less | Ordering::Equal));
        Some(&self.entries[idx % self.entries.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Address;

    fn host(ip: &str) -> Arc<Host> {
        Arc::new(Host::new(Address::new(ip, 9042), "r1".into(), "dc1".into()))
    }

    #[test]
    fn rebuild_sorts_and_dedups_most_recent_wins() {
        let h1 = host("1.0.0.1");
        let h2 = host("1.0.0.2");
        let ring = TokenRing::rebuild(vec![
            (Token::Murmur3(10), h1.clone()),
            (Token::Murmur3(5), h1.clone()),
            (Token::Murmur3(10), h2.clone()),
        ]);
        assert_eq!(ring.len(), 2);
        let (_, owner_of_10) = ring.owner_of(&Token::Murmur3(9)).unwrap();
        assert_eq!(owner_of_10.address, h2.address);
    }

    #[test]
    fn owner_of_wraps_around() {
        let h1 = host("1.0.0.1");
        let h2 = host("1.0.0.2");
        let ring = TokenRing::rebuild(vec![
            (Token::Murmur3(-100), h1.clone()),
            (Token::Murmur3(100), h2.clone()),
        ]);
        let (_, owner) = ring.owner_of(&Token::Murmur3(1000)).unwrap();
        assert_eq!(owner.address, h1.address);
    }

    #[test]
    fn empty_ring_has_no_owner() {
        let ring = TokenRing::default();
        assert!(ring.owner_of(&Token::Murmur3(0)).is_none());
    }
}
