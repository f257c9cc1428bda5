//! The control connection driver (§4.G): protocol negotiation, system-table
//! bootstrap, event subscription, schema agreement, and reconnection. The
//! wire codec and transport socket are external collaborators — this module
//! only depends on the [`ControlChannel`] seam they implement.

mod bootstrap;
mod protocol;
mod reconnect;
mod schema_agreement;

pub use bootstrap::{bootstrap_hosts, parse_keyspaces, resolve_partitioner, KeyspaceRow, LocalRow, PeerRow};
pub use protocol::{downgrade, ProtocolVersion};
pub use reconnect::reconnect_loop;
pub use schema_agreement::wait_for_schema_agreement;

#[cfg(test)]
use uuid::Uuid;

use crate::errors::{ClusterError, ControlConnectionError, SslErrorCode};
use crate::host::{Address, Host};
use crate::partitioner::PartitionerKind;
use crate::settings::{ClusterSettings, PlainTextAuthProvider};
use crate::topology::KeyspaceMetadata;

/// The classified outcome of a STARTUP attempt (§4.G step 2).
#[derive(Debug)]
pub enum StartupOutcome {
    Ready,
    AuthenticationRequired,
    ProtocolError,
    SslError(SslErrorCode),
}

/// The external wire-codec/transport seam the control connection drives.
/// Implemented elsewhere against the real CQL codec (§6.1); this core only
/// calls through it.
#[async_trait::async_trait]
pub trait ControlChannel: Send + Sync {
    async fn startup(&self, version: ProtocolVersion) -> Result<StartupOutcome, ControlConnectionError>;
    async fn authenticate(&self, provider: &PlainTextAuthProvider) -> Result<(), ControlConnectionError>;
    async fn query_local(&self) -> Result<LocalRow, ControlConnectionError>;
    async fn query_peers(&self) -> Result<Vec<PeerRow>, ControlConnectionError>;
    async fn query_keyspaces(&self) -> Result<Vec<KeyspaceRow>, ControlConnectionError>;
    async fn subscribe_events(&self) -> Result<(), ControlConnectionError>;
}

/// What a successful bootstrap (§4.G steps 2-5) hands back to the cluster
/// connector.
#[derive(Debug)]
pub struct BootstrapResult {
    pub negotiated_version: ProtocolVersion,
    pub hosts: Vec<Host>,
    pub keyspaces: Vec<KeyspaceMetadata>,
    pub partitioner: Option<PartitionerKind>,
}

/// Runs §4.G steps 2-5 against one resolved `address`: negotiate the
/// protocol (downgrading on rejection), authenticate if required, populate
/// hosts from `system.local`/`system.peers`, resolve the partitioner, and
/// subscribe to events unless disabled.
#[tracing::instrument(skip(channel, settings), fields(address = %address))]
pub async fn bootstrap(
    channel: &dyn ControlChannel,
    address: &Address,
    settings: &ClusterSettings,
    lowest_cassandra: u8,
    highest_cassandra: u8,
    lowest_dse: u8,
) -> Result<BootstrapResult, ClusterError> {
    let mut version = ProtocolVersion {
        number: settings.protocol_version,
        dse: settings.dse_protocol,
    };

    loop {
        match channel.startup(version).await {
            Ok(StartupOutcome::Ready) => break,
            Ok(StartupOutcome::AuthenticationRequired) => {
                let provider = settings
                    .auth_provider
                    .as_ref()
                    .ok_or_else(|| ClusterError::AuthError("server requires authentication but none configured".into()))?;
                channel
                    .authenticate(provider)
                    .await
                    .map_err(|e| ClusterError::AuthError(e.to_string()))?;
                break;
            }
            Ok(StartupOutcome::SslError(sub_code)) => {
                return Err(ClusterError::SslError {
                    message: format!("TLS handshake with {address} failed"),
                    sub_code: Some(sub_code),
                });
            }
            Ok(StartupOutcome::ProtocolError) => {
                tracing::debug!(?version, "protocol version rejected, attempting downgrade");
                match downgrade(version, lowest_cassandra, highest_cassandra, lowest_dse) {
                    Some(next) => version = next,
                    None => return Err(ClusterError::InvalidProtocol(format!("{address} rejected lowest supported protocol version"))),
                }
            }
            Err(e) => return Err(ClusterError::UnableToConnect(e.to_string())),
        }
    }

    let local = channel.query_local().await.map_err(|e| ClusterError::UnableToConnect(e.to_string()))?;
    let peers = channel.query_peers().await.map_err(|e| ClusterError::UnableToConnect(e.to_string()))?;
    let keyspace_rows = channel.query_keyspaces().await.map_err(|e| ClusterError::UnableToConnect(e.to_string()))?;

    let partitioner = resolve_partitioner(&local);
    if partitioner.is_none() {
        tracing::warn!(partitioner = ?local.partitioner, "unsupported partitioner class, continuing without token-awareness");
    }

    let hosts = bootstrap_hosts(address.clone(), settings.port, &local, &peers);
    let keyspaces = parse_keyspaces(&keyspace_rows);

    if !settings.disable_events_on_startup {
        channel
            .subscribe_events()
            .await
            .map_err(|e| ClusterError::UnableToConnect(e.to_string()))?;
    }

    Ok(BootstrapResult {
        negotiated_version: version,
        hosts,
        keyspaces,
        partitioner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ClusterSettingsBuilder;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Mutex;

    struct FakeChannel {
        /// STARTUP is rejected for any version number above this ceiling.
        accepted_max: AtomicU8,
        require_auth: bool,
        local: Mutex<Option<LocalRow>>,
    }

    fn sample_local() -> LocalRow {
        LocalRow {
            rack: "r1".into(),
            data_center: "dc1".into(),
            host_id: Some(Uuid::new_v4()),
            tokens: vec!["0".into()],
            release_version: Some("4.0.0".into()),
            partitioner: Some("org.apache.cassandra.dht.Murmur3Partitioner".into()),
            schema_version: Some(Uuid::new_v4()),
        }
    }

    #[async_trait::async_trait]
    impl ControlChannel for FakeChannel {
        async fn startup(&self, version: ProtocolVersion) -> Result<StartupOutcome, ControlConnectionError> {
            if version.number > self.accepted_max.load(Ordering::SeqCst) {
                return Ok(StartupOutcome::ProtocolError);
            }
            if self.require_auth {
                Ok(StartupOutcome::AuthenticationRequired)
            } else {
                Ok(StartupOutcome::Ready)
            }
        }
        async fn authenticate(&self, _provider: &PlainTextAuthProvider) -> Result<(), ControlConnectionError> {
            Ok(())
        }
        async fn query_local(&self) -> Result<LocalRow, ControlConnectionError> {
            Ok(self.local.lock().unwrap().clone().unwrap())
        }
        async fn query_peers(&self) -> Result<Vec<PeerRow>, ControlConnectionError> {
            Ok(vec![])
        }
        async fn query_keyspaces(&self) -> Result<Vec<KeyspaceRow>, ControlConnectionError> {
            Ok(vec![])
        }
        async fn subscribe_events(&self) -> Result<(), ControlConnectionError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn successful_bootstrap_returns_partitioner_and_hosts() {
        let channel = FakeChannel {
            accepted_max: AtomicU8::new(4),
            require_auth: false,
            local: Mutex::new(Some(sample_local())),
        };
        let settings = ClusterSettingsBuilder::new().contact_points(["10.0.0.1"]).build().unwrap();
        let result = bootstrap(&channel, &Address::new("10.0.0.1", 9042), &settings, 3, 4, 1).await.unwrap();
        assert_eq!(result.partitioner, Some(PartitionerKind::Murmur3));
        assert_eq!(result.hosts.len(), 1);
    }

    #[tokio::test]
    async fn protocol_downgrade_retries_until_accepted() {
        let channel = FakeChannel {
            accepted_max: AtomicU8::new(3),
            require_auth: false,
            local: Mutex::new(Some(sample_local())),
        };
        let settings = ClusterSettingsBuilder::new().contact_points(["10.0.0.1"]).protocol_version(4, false).build().unwrap();
        let result = bootstrap(&channel, &Address::new("10.0.0.1", 9042), &settings, 3, 4, 1).await.unwrap();
        assert_eq!(result.negotiated_version.number, 3);
    }

    #[tokio::test]
    async fn exhausted_downgrade_reports_invalid_protocol() {
        let channel = FakeChannel {
            accepted_max: AtomicU8::new(0),
            require_auth: false,
            local: Mutex::new(Some(sample_local())),
        };
        let settings = ClusterSettingsBuilder::new().contact_points(["10.0.0.1"]).protocol_version(4, false).build().unwrap();
        let result = bootstrap(&channel, &Address::new("10.0.0.1", 9042), &settings, 3, 4, 1).await;
        assert!(matches!(result, Err(ClusterError::InvalidProtocol(_))));
    }

    #[tokio::test]
    async fn auth_required_without_provider_fails() {
        let channel = FakeChannel {
            accepted_max: AtomicU8::new(4),
            require_auth: true,
            local: Mutex::new(Some(sample_local())),
        };
        let settings = ClusterSettingsBuilder::new().contact_points(["10.0.0.1"]).build().unwrap();
        let result = bootstrap(&channel, &Address::new("10.0.0.1", 9042), &settings, 3, 4, 1).await;
        assert!(matches!(result, Err(ClusterError::AuthError(_))));
    }
}
