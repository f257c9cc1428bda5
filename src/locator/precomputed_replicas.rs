//! Precomputes replica lists at the maximal replication factor any known
//! keyspace asks for, so that a weaker-RF keyspace reuses the stronger walk
//! as a prefix (SimpleStrategy) or a per-datacenter filter
//! (NetworkTopologyStrategy) instead of re-walking the ring (§4.C). Grounded
//! in `scylla/src/transport/locator/precomputed_replicas.rs`'s observation
//! that a SimpleStrategy (or datacenter-local NetworkTopologyStrategy)
//! replica list for `rf = n` is always a prefix of the list for `rf = n+1`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::host::Host;
use crate::partitioner::Token;
use crate::topology::replication::{NetworkTopologyStrategy, SimpleStrategy};
use crate::topology::ReplicationStrategy;

use super::TokenRing;

type ReplicaTable = Vec<(Token, Vec<Arc<Host>>)>;

pub(super) struct PrecomputedReplicas {
    simple: Option<ReplicaTable>,
    network: Option<ReplicaTable>,
}

impl PrecomputedReplicas {
    /// Walks the ring once for SimpleStrategy at the highest `rf` any
    /// keyspace currently needs, and once for NetworkTopologyStrategy at the
    /// highest per-DC `rf` any keyspace currently needs (unioned across
    /// datacenters). `simple_replicas`/`network_replicas` then derive every
    /// individual keyspace's table from these two walks.
    pub(super) fn compute<'a>(
        ring: &TokenRing,
        specs: impl Iterator<Item = &'a crate::topology::ReplicationSpec>,
    ) -> Self {
        use crate::topology::ReplicationSpec;

        let mut max_simple_rf: u16 = 0;
        let mut max_rf_per_dc: HashMap<String, u16> = HashMap::new();

        for spec in specs {
            match spec {
                ReplicationSpec::Simple { rf } => max_simple_rf = max_simple_rf.max(*rf),
                ReplicationSpec::NonReplicated => max_simple_rf = max_simple_rf.max(1),
                ReplicationSpec::NetworkTopology { rf_per_dc } => {
                    for (dc, rf) in rf_per_dc {
                        let entry = max_rf_per_dc.entry(dc.clone()).or_insert(0);
                        *entry = (*entry).max(*rf);
                    }
                }
            }
        }

        let simple = (max_simple_rf > 0)
            .then(|| SimpleStrategy { rf: max_simple_rf }.compute_replicas(ring.entries()));

        let network = (!max_rf_per_dc.is_empty()).then(|| {
            NetworkTopologyStrategy {
                rf_per_dc: max_rf_per_dc,
            }
            .compute_replicas(ring.entries())
        });

        Self { simple, network }
    }

    /// Truncates the precomputed maximal SimpleStrategy walk to `rf`
    /// replicas per token. `None` only when no keyspace needed a Simple
    /// walk at all (an empty ring, or `rf` somehow exceeding what was
    /// precomputed, which `compute` never allows).
    pub(super) fn simple_replicas(&self, rf: u16) -> ReplicaTable {
        match &self.simple {
            Some(table) => table
                .iter()
                .map(|(token, replicas)| (token.clone(), replicas.iter().take(rf as usize).cloned().collect()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Filters the precomputed maximal NetworkTopologyStrategy walk down to
    /// `rf_per_dc`: keeps each datacenter's first `rf_per_dc[dc]` entries in
    /// their original walk order, and drops datacenters absent from the map
    /// entirely (a keyspace that doesn't replicate to a DC some other
    /// keyspace does).
    pub(super) fn network_replicas(&self, rf_per_dc: &HashMap<String, u16>) -> ReplicaTable {
        let table = match &self.network {
            Some(table) => table,
            None => return Vec::new(),
        };

        table
            .iter()
            .map(|(token, replicas)| {
                let mut seen: HashMap<&str, u16> = HashMap::new();
                let filtered = replicas
                    .iter()
                    .filter(|host| {
                        let target = match rf_per_dc.get(host.datacenter.as_str()) {
                            Some(target) => *target,
                            None => return false,
                        };
                        let count = seen.entry(host.datacenter.as_str()).or_insert(0);
                        if *count < target {
                            *count += 1;
                            true
                        } else {
                            false
                        }
                    })
                    .cloned()
                    .collect();
                (token.clone(), filtered)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Address;
    use crate::topology::ReplicationSpec;

    fn host(ip: &str, dc: &str, rack: &str) -> Arc<Host> {
        Arc::new(Host::new(Address::new(ip, 9042), rack.to_string(), dc.to_string()))
    }

    fn ring_of(hosts: Vec<Arc<Host>>) -> TokenRing {
        let entries = hosts
            .into_iter()
            .enumerate()
            .map(|(i, h)| (Token::Murmur3(i as i64 * 100), h))
            .collect();
        TokenRing::rebuild(entries)
    }

    #[test]
    fn simple_smaller_rf_is_a_prefix_of_larger_rf() {
        let ring = ring_of(vec![
            host("1.0.0.1", "dc1", "r1"),
            host("1.0.0.2", "dc1", "r1"),
            host("1.0.0.3", "dc1", "r1"),
            host("1.0.0.4", "dc1", "r1"),
        ]);
        let specs = vec![
            ReplicationSpec::Simple { rf: 2 },
            ReplicationSpec::Simple { rf: 4 },
        ];
        let precomputed = PrecomputedReplicas::compute(&ring, specs.iter());

        let small = precomputed.simple_replicas(2);
        let large = precomputed.simple_replicas(4);
        for ((_, small_replicas), (_, large_replicas)) in small.iter().zip(large.iter()) {
            assert_eq!(small_replicas.len(), 2);
            assert_eq!(large_replicas.len(), 4);
            assert_eq!(small_replicas.as_slice(), &large_replicas[..2]);
        }
    }

    #[test]
    fn network_topology_filters_per_dc_independent_of_other_keyspaces_rf() {
        let ring = ring_of(vec![
            host("1.0.0.1", "dc1", "r1"),
            host("1.0.0.2", "dc1", "r2"),
            host("1.0.0.3", "dc2", "r1"),
            host("1.0.0.4", "dc2", "r1"),
        ]);

        let mut wide = HashMap::new();
        wide.insert("dc1".to_string(), 2);
        wide.insert("dc2".to_string(), 2);
        let mut narrow = HashMap::new();
        narrow.insert("dc1".to_string(), 1);

        let specs = vec![
            ReplicationSpec::NetworkTopology { rf_per_dc: wide.clone() },
            ReplicationSpec::NetworkTopology { rf_per_dc: narrow.clone() },
        ];
        let precomputed = PrecomputedReplicas::compute(&ring, specs.iter());

        let wide_table = precomputed.network_replicas(&wide);
        let narrow_table = precomputed.network_replicas(&narrow);

        for (_, replicas) in &wide_table {
            assert_eq!(replicas.iter().filter(|h| h.datacenter == "dc1").count(), 2);
            assert_eq!(replicas.iter().filter(|h| h.datacenter == "dc2").count(), 2);
        }
        for (_, replicas) in &narrow_table {
            assert_eq!(replicas.iter().filter(|h| h.datacenter == "dc1").count(), 1);
            assert!(replicas.iter().all(|h| h.datacenter == "dc1"));
        }
    }

    #[test]
    fn no_keyspaces_precomputes_nothing() {
        let ring = ring_of(vec![host("1.0.0.1", "dc1", "r1")]);
        let specs: Vec<ReplicationSpec> = Vec::new();
        let precomputed = PrecomputedReplicas::compute(&ring, specs.iter());
        assert!(precomputed.simple_replicas(1).is_empty());
        assert!(precomputed.network_replicas(&HashMap::new()).is_empty());
    }
}
