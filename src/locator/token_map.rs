//! `TokenMap`: partitioner + ring + per-keyspace replicas (§4.C).

use std::collections::HashMap;
use std::sync::Arc;

use super::precomputed_replicas::PrecomputedReplicas;
use super::TokenRing;
use crate::host::{Address, Host};
use crate::partitioner::{PartitionerKind, Token};
use crate::topology::{KeyspaceMetadata, ReplicationSpec, ReplicationStrategy};

struct KeyspaceEntry {
    metadata: KeyspaceMetadata,
    strategy: Box<dyn ReplicationStrategy>,
    replicas: Vec<(Token, Vec<Arc<Host>>)>,
}

/// Owns the sorted ring, per-keyspace replica tables, and answers replica
/// lookups for a routing key (§4.C).
pub struct TokenMap {
    partitioner: PartitionerKind,
    ring: TokenRing,
    pending_ring_entries: Vec<(Token, Arc<Host>)>,
    keyspaces: HashMap<String, KeyspaceEntry>,
    pending_keyspaces: HashMap<String, KeyspaceMetadata>,
}

impl TokenMap {
    pub fn new(partitioner: PartitionerKind) -> Self {
        Self {
            partitioner,
            ring: TokenRing::default(),
            pending_ring_entries: Vec::new(),
            keyspaces: HashMap::new(),
            pending_keyspaces: HashMap::new(),
        }
    }

    pub fn ring(&self) -> &TokenRing {
        &self.ring
    }

    /// Inserts `(token, host)` pairs for every token of `host` into a pending
    /// list; does not rebuild (§4.C).
    pub fn add_host(&mut self, host: &Arc<Host>) {
        for token_str in &host.tokens {
            if let Ok(token) = self.partitioner.parse(token_str) {
                self.pending_ring_entries.push((token, host.clone()));
            } else {
                tracing::warn!(
                    token = %token_str,
                    address = %host.address,
                    "failed to parse token string for host"
                );
            }
        }
    }

    /// Removes existing entries for `host`'s address, inserts the fresh
    /// tokens, sorts, and rebuilds every keyspace's replicas (§4.C).
    pub fn update_host_and_build(&mut self, host: &Arc<Host>) {
        self.drop_entries_for(&host.address);
        self.add_host(host);
        self.build();
    }

    /// Removes all ring entries for `address`, rebuilds (§4.C).
    pub fn remove_host_and_build(&mut self, address: &Address) {
        self.drop_entries_for(address);
        self.build();
    }

    fn drop_entries_for(&mut self, address: &Address) {
        self.pending_ring_entries.retain(|(_, h)| &h.address != address);
        let survivors: Vec<_> = self
            .ring
            .entries()
            .iter()
            .filter(|(_, h)| &h.address != address)
            .cloned()
            .collect();
        self.pending_ring_entries.extend(survivors);
    }

    /// Parses replication specs out of `keyspaces` and queues them (§4.C).
    pub fn add_keyspaces(&mut self, keyspaces: Vec<KeyspaceMetadata>) {
        for ks in keyspaces {
            self.pending_keyspaces.insert(ks.name.clone(), ks);
        }
    }

    /// Parses and rebuilds replicas only for keyspaces whose strategy
    /// actually changed (§4.C).
    pub fn update_keyspaces_and_build(&mut self, keyspaces: Vec<KeyspaceMetadata>) {
        self.add_keyspaces(keyspaces);
        self.build();
    }

    /// Erases replicas and strategy for `name` (§4.C).
    pub fn drop_keyspace(&mut self, name: &str) {
        self.keyspaces.remove(name);
        self.pending_keyspaces.remove(name);
    }

    /// Sorts the ring (merging pending inserts into the existing sorted
    /// sequence) and materializes replicas for every known keyspace (§4.C).
    /// Only keyspaces whose strategy actually changed (or that are new) are
    /// recomputed when the ring itself didn't move; the rest keep their
    /// cached replica table.
    ///
    /// Recomputation itself goes through `PrecomputedReplicas`: rather than
    /// walking the ring once per keyspace, the ring is walked once at the
    /// highest `rf` (SimpleStrategy) and once at the highest per-DC `rf`
    /// (NetworkTopologyStrategy) that any current keyspace asks for, and
    /// every keyspace's own table is then a cheap prefix/filter of that
    /// shared walk (§4.C).
    pub fn build(&mut self) {
        let ring_changed = !self.pending_ring_entries.is_empty();
        if ring_changed {
            let mut all = self.ring.entries().to_vec();
            all.append(&mut self.pending_ring_entries);
            self.ring = TokenRing::rebuild(all);
        }

        let mut changed_keyspaces: Vec<String> = Vec::new();
        for (name, metadata) in self.pending_keyspaces.drain() {
            let new_strategy = metadata.replication.strategy();
            let needs_rebuild = match self.keyspaces.get(&name) {
                Some(existing) => !existing.strategy.equals(new_strategy.as_ref()),
                None => true,
            };

            if needs_rebuild {
                self.keyspaces.insert(
                    name.clone(),
                    KeyspaceEntry {
                        metadata,
                        strategy: new_strategy,
                        replicas: Vec::new(),
                    },
                );
                changed_keyspaces.push(name);
            } else if let Some(existing) = self.keyspaces.get_mut(&name) {
                existing.metadata = metadata;
            }
        }

        if !ring_changed && changed_keyspaces.is_empty() {
            return;
        }

        let precomputed = PrecomputedReplicas::compute(
            &self.ring,
            self.keyspaces.values().map(|ks| &ks.metadata.replication),
        );

        let to_rebuild: Vec<String> = if ring_changed {
            self.keyspaces.keys().cloned().collect()
        } else {
            changed_keyspaces
        };

        for name in to_rebuild {
            if let Some(ks) = self.keyspaces.get_mut(&name) {
                ks.replicas = match &ks.metadata.replication {
                    ReplicationSpec::Simple { rf } => precomputed.simple_replicas(*rf),
                    ReplicationSpec::NonReplicated => precomputed.simple_replicas(1),
                    ReplicationSpec::NetworkTopology { rf_per_dc } => precomputed.network_replicas(rf_per_dc),
                };
            }
        }
    }

    /// `t = partitioner.hash(routing_key)`; binary-searches the replica
    /// table for the first entry with token `> t`, wrapping around; returns
    /// the replica list, or an empty list if the keyspace is unknown (§4.C).
    pub fn get_replicas(&self, keyspace: &str, routing_key: &[u8]) -> Vec<Arc<Host>> {
        let entry = match self.keyspaces.get(keyspace) {
            Some(e) => e,
            None => return Vec::new(),
        };
        if entry.replicas.is_empty() {
            return Vec::new();
        }
        let token = self.partitioner.hash(routing_key);
        let idx = entry
            .replicas
            .partition_point(|(t, _)| matches!(t.cmp(&token), std::cmp::Ordering::Less | std::cmp::Ordering::Equal));
        let idx = idx % entry.replicas.len();
        entry.replicas[idx].1.clone()
    }

    pub fn keyspace_replication(&self, keyspace: &str) -> Option<&crate::topology::ReplicationSpec> {
        self.keyspaces.get(keyspace).map(|e| &e.metadata.replication)
    }

    pub fn partitioner(&self) -> PartitionerKind {
        self.partitioner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::ReplicationSpec;

    fn host_with_token(ip: &str, dc: &str, token: i64) -> Arc<Host> {
        let mut h = Host::new(Address::new(ip, 9042), "r1".into(), dc.into());
        h.tokens = vec![token.to_string()];
        Arc::new(h)
    }

    fn simple_keyspace(name: &str, rf: u16) -> KeyspaceMetadata {
        KeyspaceMetadata {
            name: name.to_string(),
            durable_writes: true,
            replication: ReplicationSpec::Simple { rf },
        }
    }

    #[test]
    fn build_then_lookup_routes_to_owning_replica_set() {
        let mut map = TokenMap::new(PartitionerKind::Murmur3);
        let h1 = host_with_token("1.0.0.1", "dc1", 0);
        let h2 = host_with_token("1.0.0.2", "dc1", 1000);
        map.add_host(&h1);
        map.add_host(&h2);
        map.add_keyspaces(vec![simple_keyspace("ks", 2)]);
        map.build();

        let replicas = map.get_replicas("ks", b"some-key");
        assert_eq!(replicas.len(), 2);
    }

    #[test]
    fn unknown_keyspace_returns_empty() {
        let mut map = TokenMap::new(PartitionerKind::Murmur3);
        let h1 = host_with_token("1.0.0.1", "dc1", 0);
        map.add_host(&h1);
        map.build();
        assert!(map.get_replicas("nope", b"x").is_empty());
    }

    #[test]
    fn remove_host_and_build_shrinks_ring() {
        let mut map = TokenMap::new(PartitionerKind::Murmur3);
        let h1 = host_with_token("1.0.0.1", "dc1", 0);
        let h2 = host_with_token("1.0.0.2", "dc1", 1000);
        map.add_host(&h1);
        map.add_host(&h2);
        map.add_keyspaces(vec![simple_keyspace("ks", 2)]);
        map.build();
        assert_eq!(map.ring().len(), 2);

        map.remove_host_and_build(&h2.address);
        assert_eq!(map.ring().len(), 1);
        let replicas = map.get_replicas("ks", b"some-key");
        assert_eq!(replicas.len(), 1);
    }

    #[test]
    fn drop_keyspace_clears_replicas() {
        let mut map = TokenMap::new(PartitionerKind::Murmur3);
        let h1 = host_with_token("1.0.0.1", "dc1", 0);
        map.add_host(&h1);
        map.add_keyspaces(vec![simple_keyspace("ks", 1)]);
        map.build();
        assert!(!map.get_replicas("ks", b"x").is_empty());

        map.drop_keyspace("ks");
        assert!(map.get_replicas("ks", b"x").is_empty());
    }

    #[test]
    fn unchanged_strategy_skips_recompute_but_keeps_replicas() {
        let mut map = TokenMap::new(PartitionerKind::Murmur3);
        let h1 = host_with_token("1.0.0.1", "dc1", 0);
        map.add_host(&h1);
        map.add_keyspaces(vec![simple_keyspace("ks", 1)]);
        map.build();
        let before = map.get_replicas("ks", b"x");

        // Re-add the identical keyspace spec; strategy compares equal so the
        // cached replica table is reused rather than recomputed.
        map.add_keyspaces(vec![simple_keyspace("ks", 1)]);
        map.build();
        let after = map.get_replicas("ks", b"x");
        assert_eq!(before.len(), after.len());
    }
}
