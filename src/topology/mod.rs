//! Keyspace/replication metadata (§3.1, §4.B).

pub mod replication;

pub use replication::{ReplicationSpec, ReplicationStrategy};

/// A keyspace as known to the token map (§3.1).
#[derive(Debug, Clone)]
pub struct KeyspaceMetadata {
    pub name: String,
    pub durable_writes: bool,
    pub replication: ReplicationSpec,
}

impl KeyspaceMetadata {
    /// Parses `system_schema.keyspaces.replication`, a `map<varchar, varchar>`
    /// whose `class` entry names the strategy (§6.3).
    pub fn from_replication_map(
        name: String,
        durable_writes: bool,
        replication_map: &std::collections::HashMap<String, String>,
    ) -> Self {
        let replication = ReplicationSpec::from_map(replication_map);
        Self {
            name,
            durable_writes,
            replication,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_simple_strategy() {
        let mut map = HashMap::new();
        map.insert("class".to_string(), "org.apache.cassandra.locator.SimpleStrategy".to_string());
        map.insert("replication_factor".to_string(), "3".to_string());
        let ks = KeyspaceMetadata::from_replication_map("ks".to_string(), true, &map);
        assert_eq!(ks.replication, ReplicationSpec::Simple { rf: 3 });
    }

    #[test]
    fn parses_network_topology_strategy() {
        let mut map = HashMap::new();
        map.insert(
            "class".to_string(),
            "org.apache.cassandra.locator.NetworkTopologyStrategy".to_string(),
        );
        map.insert("dc1".to_string(), "2".to_string());
        map.insert("dc2".to_string(), "2".to_string());
        let ks = KeyspaceMetadata::from_replication_map("ks".to_string(), true, &map);
        match ks.replication {
            ReplicationSpec::NetworkTopology { ref rf_per_dc } => {
                assert_eq!(rf_per_dc.get("dc1"), Some(&2));
                assert_eq!(rf_per_dc.get("dc2"), Some(&2));
            }
            _ => panic!("expected NetworkTopology"),
        }
    }
}
