//! Turns decoded `system.local`/`system.peers`/`system_schema.keyspaces`
//! rows into `Host`/`KeyspaceMetadata` (§4.G step 3, §6.2, §6.3). Row
//! decoding itself is the wire codec's job (out of scope); these types are
//! the shape the codec is expected to hand back.

use std::collections::HashMap;

use uuid::Uuid;

use crate::host::{Address, Host};
use crate::partitioner::PartitionerKind;
use crate::topology::KeyspaceMetadata;

/// A decoded `system.local` row.
#[derive(Debug, Clone)]
pub struct LocalRow {
    pub rack: String,
    pub data_center: String,
    pub host_id: Option<Uuid>,
    pub tokens: Vec<String>,
    pub release_version: Option<String>,
    pub partitioner: Option<String>,
    pub schema_version: Option<Uuid>,
}

/// A decoded `system.peers` row.
#[derive(Debug, Clone)]
pub struct PeerRow {
    pub rpc_address: String,
    pub rack: String,
    pub data_center: String,
    pub host_id: Option<Uuid>,
    pub tokens: Vec<String>,
    pub release_version: Option<String>,
    pub schema_version: Option<Uuid>,
}

/// A decoded `system_schema.keyspaces` row.
#[derive(Debug, Clone)]
pub struct KeyspaceRow {
    pub name: String,
    pub durable_writes: bool,
    pub replication: HashMap<String, String>,
}

/// Builds the connected host plus every peer, per §4.G step 3.
pub fn bootstrap_hosts(connected_address: Address, port: u16, local: &LocalRow, peers: &[PeerRow]) -> Vec<Host> {
    let mut hosts = Vec::with_capacity(1 + peers.len());

    let mut connected_host = Host::new(connected_address, local.rack.clone(), local.data_center.clone());
    connected_host.host_id = local.host_id;
    connected_host.tokens = local.tokens.clone();
    connected_host.cassandra_version = local.release_version.clone();
    hosts.push(connected_host);

    for peer in peers {
        let address = Address::new(peer.rpc_address.clone(), port);
        let mut host = Host::new(address, peer.rack.clone(), peer.data_center.clone());
        host.host_id = peer.host_id;
        host.tokens = peer.tokens.clone();
        host.cassandra_version = peer.release_version.clone();
        hosts.push(host);
    }

    hosts
}

/// Resolves `system.local.partitioner` into a `PartitionerKind`, per §4.G
/// step 4. `None` means "unsupported partitioner"; the caller logs and
/// continues without token-awareness.
pub fn resolve_partitioner(local: &LocalRow) -> Option<PartitionerKind> {
    local
        .partitioner
        .as_deref()
        .and_then(PartitionerKind::from_class_name)
}

pub fn parse_keyspaces(rows: &[KeyspaceRow]) -> Vec<KeyspaceMetadata> {
    rows.iter()
        .map(|row| KeyspaceMetadata::from_replication_map(row.name.clone(), row.durable_writes, &row.replication))
        .collect()
}
