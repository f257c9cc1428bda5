//! Cluster Connector: multi-contact-point resolution, parallel bootstrap
//! attempts, and error-priority classification (§4.H).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use rand::seq::SliceRandom;

use crate::control_connection::{bootstrap, BootstrapResult, ControlChannel};
use crate::errors::{ClusterError, ControlConnectionError, ErrorSeverity};
use crate::host::Address;
use crate::settings::ClusterSettings;

/// The external transport + codec hookup that turns a resolved address into
/// a live [`ControlChannel`] (socket connect, optional TLS handshake). Out
/// of scope per spec §1; this trait is the seam.
#[async_trait::async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn connect(&self, address: &Address) -> Result<Box<dyn ControlChannel>, ControlConnectionError>;
}

/// Top-level orchestrator invoked with `(contact_points, settings, on_complete)`
/// in the source; here `connect` returns the future directly (§4.H).
#[derive(Debug, Default)]
pub struct ClusterConnector {
    cancelled: Arc<AtomicBool>,
}

impl ClusterConnector {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Idempotent; outstanding attempts observe it at their next poll and
    /// the in-flight `connect` call reports `Canceled` (§5).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves `contact_points`, attempts a control connection to each
    /// concurrently, and returns the first success — canceling the rest by
    /// dropping their futures. On total failure, classifies by the worst
    /// error category observed (§4.H steps 1-5).
    pub async fn connect(
        &self,
        contact_points: &[String],
        settings: &ClusterSettings,
        factory: &dyn ChannelFactory,
        lowest_cassandra: u8,
        highest_cassandra: u8,
        lowest_dse: u8,
    ) -> Result<(Address, BootstrapResult), ClusterError> {
        if self.is_cancelled() {
            return Err(ClusterError::Canceled);
        }

        let mut addresses: Vec<Address> = contact_points
            .iter()
            .flat_map(|cp| settings.cluster_metadata_resolver_factory.resolve(cp, settings.port))
            .collect();

        if settings.use_randomized_contact_points {
            addresses.shuffle(&mut rand::thread_rng());
        }

        if addresses.is_empty() {
            return Err(ClusterError::NoHostsAvailable("no contact points resolved to an address".into()));
        }

        let mut attempts = FuturesUnordered::new();
        for address in addresses {
            attempts.push(async move {
                let channel = factory
                    .connect(&address)
                    .await
                    .map_err(|e| ClusterError::UnableToConnect(e.to_string()))?;
                bootstrap(channel.as_ref(), &address, settings, lowest_cassandra, highest_cassandra, lowest_dse)
                    .await
                    .map(|result| (address.clone(), result))
            });
        }

        let mut worst: Option<ClusterError> = None;
        while let Some(outcome) = attempts.next().await {
            if self.is_cancelled() {
                return Err(ClusterError::Canceled);
            }
            match outcome {
                Ok(success) => return Ok(success),
                Err(e) => worst = worse(worst, e),
            }
        }

        Err(worst.unwrap_or_else(|| ClusterError::NoHostsAvailable("every contact point attempt failed".into())))
    }
}

/// §4.H's fixed priority: `SSL_ERROR > AUTH_ERROR > INVALID_PROTOCOL >
/// NO_HOSTS_AVAILABLE`. Errors outside that taxonomy (transport-level
/// connect failures) rank below every classified kind.
fn worse(current: Option<ClusterError>, candidate: ClusterError) -> Option<ClusterError> {
    match &current {
        None => Some(candidate),
        Some(cur) => {
            if ErrorSeverity::of(&candidate) >= ErrorSeverity::of(cur) {
                Some(candidate)
            } else {
                current
            }
        }
    }
}
