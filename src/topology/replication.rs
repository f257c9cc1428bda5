//! Replication strategies: ring walk → per-token replica lists (§4.B).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::host::Host;
use crate::partitioner::Token;

/// A keyspace's replication configuration (§3.1), parsed from
/// `system_schema.keyspaces.replication` (§6.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationSpec {
    Simple { rf: u16 },
    NetworkTopology { rf_per_dc: HashMap<String, u16> },
    NonReplicated,
}

impl ReplicationSpec {
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let class = map.get("class").map(String::as_str).unwrap_or("");
        if class.ends_with("SimpleStrategy") {
            let rf = map
                .get("replication_factor")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(0);
            ReplicationSpec::Simple { rf }
        } else if class.ends_with("NetworkTopologyStrategy") {
            let rf_per_dc = map
                .iter()
                .filter(|(k, _)| k.as_str() != "class")
                .filter_map(|(k, v)| v.parse::<u16>().ok().filter(|rf| *rf > 0).map(|rf| (k.clone(), rf)))
                .collect();
            ReplicationSpec::NetworkTopology { rf_per_dc }
        } else {
            ReplicationSpec::NonReplicated
        }
    }

    /// Builds the strategy implementation for this spec.
    pub fn strategy(&self) -> Box<dyn ReplicationStrategy> {
        match self {
            ReplicationSpec::Simple { rf } => Box::new(SimpleStrategy { rf: *rf }),
            ReplicationSpec::NetworkTopology { rf_per_dc } => Box::new(NetworkTopologyStrategy {
                rf_per_dc: rf_per_dc.clone(),
            }),
            ReplicationSpec::NonReplicated => Box::new(SimpleStrategy { rf: 1 }),
        }
    }
}

/// `compute_replicas(ring) -> TokenReplicas` (§4.B): for every token in the
/// ring, the ordered replica list encountered walking forward from it.
pub trait ReplicationStrategy: std::fmt::Debug + std::any::Any {
    fn compute_replicas(&self, ring: &[(Token, Arc<Host>)]) -> Vec<(Token, Vec<Arc<Host>>)>;

    fn as_any(&self) -> &dyn std::any::Any;

    /// Structural equality, used to decide whether a keyspace's replicas must
    /// be recomputed (§4.B). The default compares `Debug` renderings of two
    /// values that first pass a same-concrete-type check.
    fn equals(&self, other: &dyn ReplicationStrategy) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleStrategy {
    pub rf: u16,
}

impl ReplicationStrategy for SimpleStrategy {
    fn compute_replicas(&self, ring: &[(Token, Arc<Host>)]) -> Vec<(Token, Vec<Arc<Host>>)> {
        if ring.is_empty() {
            return Vec::new();
        }
        let n = ring.len();
        let mut out = Vec::with_capacity(n);
        for start in 0..n {
            let mut replicas = Vec::new();
            let mut seen = HashSet::new();
            let mut idx = start;
            loop {
                let host = &ring[idx].1;
                if seen.insert(host.address.clone()) {
                    replicas.push(host.clone());
                }
                if replicas.len() >= self.rf as usize || replicas.len() >= distinct_host_count(ring)
                {
                    break;
                }
                idx = (idx + 1) % n;
                if idx == start {
                    break;
                }
            }
            out.push((ring[start].0.clone(), replicas));
        }
        out
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn equals(&self, other: &dyn ReplicationStrategy) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTopologyStrategy {
    pub rf_per_dc: HashMap<String, u16>,
}

impl ReplicationStrategy for NetworkTopologyStrategy {
    fn compute_replicas(&self, ring: &[(Token, Arc<Host>)]) -> Vec<(Token, Vec<Arc<Host>>)> {
        if ring.is_empty() {
            return Vec::new();
        }
        let n = ring.len();

        // Racks observed per DC, for the "all racks seen" completion rule.
        let mut dc_racks: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (_, host) in ring {
            if !host.datacenter.is_empty() && !host.rack.is_empty() {
                dc_racks
                    .entry(host.datacenter.as_str())
                    .or_default()
                    .insert(host.rack.as_str());
            }
        }

        let target_total: usize = self.rf_per_dc.values().map(|&rf| rf as usize).sum();

        let mut out = Vec::with_capacity(n);
        for start in 0..n {
            let mut replicas: Vec<Arc<Host>> = Vec::new();
            let mut replicas_found: HashMap<String, usize> =
                self.rf_per_dc.keys().map(|dc| (dc.clone(), 0)).collect();
            let mut racks_observed: HashMap<String, HashSet<String>> = HashMap::new();
            let mut skipped: HashMap<String, Vec<Arc<Host>>> = HashMap::new();

            let mut idx = start;
            let mut visited = 0;
            while visited < n {
                let host = &ring[idx].1;
                let dc = &host.datacenter;

                let target = self.rf_per_dc.get(dc).copied();
                if let Some(target) = target {
                    let found = replicas_found.get(dc.as_str()).copied().unwrap_or(0);
                    if found < target as usize {
                        let rack_count = dc_racks.get(dc.as_str()).map(HashSet::len).unwrap_or(0);
                        let observed = racks_observed.entry(dc.clone()).or_default();

                        if host.rack.is_empty() || observed.len() == rack_count {
                            replicas.push(host.clone());
                            *replicas_found.get_mut(dc.as_str()).unwrap() += 1;
                        } else if observed.contains(&host.rack) {
                            skipped.entry(dc.clone()).or_default().push(host.clone());
                        } else {
                            replicas.push(host.clone());
                            *replicas_found.get_mut(dc.as_str()).unwrap() += 1;
                            observed.insert(host.rack.clone());
                            if observed.len() == rack_count {
                                let quota = target as usize;
                                let pending = skipped.entry(dc.clone()).or_default();
                                while !pending.is_empty()
                                    && *replicas_found.get(dc.as_str()).unwrap() < quota
                                {
                                    let extra = pending.remove(0);
                                    replicas.push(extra);
                                    *replicas_found.get_mut(dc.as_str()).unwrap() += 1;
                                }
                            }
                        }
                    }
                }

                if replicas_found
                    .iter()
                    .all(|(dc, found)| *found >= *self.rf_per_dc.get(dc).unwrap_or(&0) as usize)
                    || replicas.len() >= target_total
                {
                    break;
                }

                idx = (idx + 1) % n;
                visited += 1;
            }

            out.push((ring[start].0.clone(), replicas));
        }
        out
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn equals(&self, other: &dyn ReplicationStrategy) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

fn distinct_host_count(ring: &[(Token, Arc<Host>)]) -> usize {
    ring.iter()
        .map(|(_, h)| &h.address)
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Address;

    fn host(ip: &str, dc: &str, rack: &str) -> Arc<Host> {
        Arc::new(Host::new(Address::new(ip, 9042), rack.to_string(), dc.to_string()))
    }

    /// Scenario fixture 7 (spec §8.3): SimpleStrategy rf=3, four hosts placed
    /// at specific tokens; replicas of token 0 are [1.0.0.2, 1.0.0.3, 1.0.0.4].
    #[test]
    fn simple_strategy_fixture() {
        let h1 = host("1.0.0.1", "dc1", "r1");
        let h2 = host("1.0.0.2", "dc1", "r1");
        let h3 = host("1.0.0.3", "dc1", "r1");
        let h4 = host("1.0.0.4", "dc1", "r1");

        let ring = vec![
            (Token::Murmur3(i64::MIN / 2), h1),
            (Token::Murmur3(0), h2.clone()),
            (Token::Murmur3(i64::MAX / 2), h3.clone()),
            (Token::Murmur3(i64::MAX), h4.clone()),
        ];

        let strategy = SimpleStrategy { rf: 3 };
        let replicas = strategy.compute_replicas(&ring);

        let (_, replicas_of_zero) = replicas
            .iter()
            .find(|(t, _)| *t == Token::Murmur3(0))
            .unwrap();
        let addrs: Vec<_> = replicas_of_zero.iter().map(|h| h.address.to_string()).collect();
        assert_eq!(addrs, vec!["1.0.0.2:9042", "1.0.0.3:9042", "1.0.0.4:9042"]);
    }

    #[test]
    fn simple_strategy_saturates_at_distinct_host_count() {
        let h1 = host("1.0.0.1", "dc1", "r1");
        let h2 = host("1.0.0.2", "dc1", "r1");
        let ring = vec![(Token::Murmur3(0), h1), (Token::Murmur3(100), h2)];

        let strategy = SimpleStrategy { rf: 10 };
        let replicas = strategy.compute_replicas(&ring);
        for (_, r) in &replicas {
            assert_eq!(r.len(), 2);
        }
    }

    #[test]
    fn network_topology_strategy_groups_by_rack() {
        // dc1 has two racks (r1, r2), dc2 has one rack (r1). rf_per_dc {dc1:2, dc2:2}.
        let hosts = vec![
            host("1.0.0.1", "dc1", "r1"),
            host("1.0.0.2", "dc1", "r2"),
            host("1.0.0.3", "dc1", "r1"),
            host("1.0.0.4", "dc2", "r1"),
            host("1.0.0.5", "dc2", "r1"),
        ];
        let ring: Vec<(Token, Arc<Host>)> = hosts
            .iter()
            .enumerate()
            .map(|(i, h)| (Token::Murmur3(i as i64 * 100), h.clone()))
            .collect();

        let mut rf_per_dc = HashMap::new();
        rf_per_dc.insert("dc1".to_string(), 2);
        rf_per_dc.insert("dc2".to_string(), 2);
        let strategy = NetworkTopologyStrategy { rf_per_dc };

        let replicas = strategy.compute_replicas(&ring);
        let (_, first_token_replicas) = &replicas[0];

        let dc1_count = first_token_replicas.iter().filter(|h| h.datacenter == "dc1").count();
        let dc2_count = first_token_replicas.iter().filter(|h| h.datacenter == "dc2").count();
        assert_eq!(dc1_count, 2);
        assert_eq!(dc2_count, 2);

        // dc1's two replicas must come from distinct racks (r1 and r2), since
        // both racks exist and aren't yet fully observed when walking from host 0.
        let dc1_racks: HashSet<_> = first_token_replicas
            .iter()
            .filter(|h| h.datacenter == "dc1")
            .map(|h| h.rack.clone())
            .collect();
        assert_eq!(dc1_racks.len(), 2);
    }

    #[test]
    fn non_replicated_behaves_like_rf_one() {
        let h1 = host("1.0.0.1", "dc1", "r1");
        let h2 = host("1.0.0.2", "dc1", "r1");
        let ring = vec![(Token::Murmur3(0), h1), (Token::Murmur3(100), h2)];
        let strategy = ReplicationSpec::NonReplicated.strategy();
        let replicas = strategy.compute_replicas(&ring);
        for (_, r) in &replicas {
            assert_eq!(r.len(), 1);
        }
    }
}
