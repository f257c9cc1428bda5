//! Cluster configuration (§3.1) and its builder.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::BuildError;
use crate::load_balancing::{LoadBalancingPolicy, LoadBalancingPolicyBuilder};

/// `ConstantDelay{ms}` or `Exponential{base_ms, max_ms}` (§3.1).
#[derive(Debug, Clone, Copy)]
pub enum ReconnectionPolicy {
    ConstantDelay { delay: Duration },
    Exponential { base: Duration, max: Duration },
}

impl ReconnectionPolicy {
    /// The delay before the `attempt`-th reconnection attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            ReconnectionPolicy::ConstantDelay { delay } => *delay,
            ReconnectionPolicy::Exponential { base, max } => {
                let scaled = base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
                scaled.min(*max)
            }
        }
    }
}

/// Plain-text credentials, the only `auth_provider` variant this core
/// implements directly; pluggable providers are an external collaborator
/// hook (§3.1). Under the `secret` feature the password is wrapped in
/// `secrecy::SecretString` so it never shows up in a `Debug` dump or a
/// cloned-and-logged settings value.
#[derive(Clone)]
pub struct PlainTextAuthProvider {
    pub username: String,
    #[cfg(feature = "secret")]
    password: secrecy::SecretString,
    #[cfg(not(feature = "secret"))]
    password: String,
}

impl PlainTextAuthProvider {
    #[cfg(feature = "secret")]
    pub fn password(&self) -> &str {
        use secrecy::ExposeSecret;
        self.password.expose_secret()
    }

    #[cfg(not(feature = "secret"))]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for PlainTextAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainTextAuthProvider")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// TLS verification knobs (§3.1). The TLS engine itself is an external
/// collaborator reached through `ChannelFactory`; this struct only carries
/// the configuration handed to it. The `ssl` feature is a marker — enabling
/// it pulls in no extra crate here, it documents that the deployment expects
/// an encrypted `ChannelFactory` behind these settings.
#[derive(Debug, Clone, Default)]
pub struct SslContext {
    pub verify_peer_cert: bool,
    pub verify_peer_identity: bool,
    pub trusted_certs_pem: Vec<String>,
}

/// Turns contact points into resolved addresses plus an optional local
/// datacenter (§3.1's `cluster_metadata_resolver_factory`). The default is
/// DNS-and-port; the `cloud` feature's SNI resolver is an alternate
/// implementation.
pub trait ClusterMetadataResolverFactory: Send + Sync + std::fmt::Debug {
    fn resolve(&self, contact_point: &str, default_port: u16) -> Vec<crate::host::Address>;
    fn local_datacenter(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Default)]
pub struct DnsMetadataResolverFactory;

impl ClusterMetadataResolverFactory for DnsMetadataResolverFactory {
    fn resolve(&self, contact_point: &str, default_port: u16) -> Vec<crate::host::Address> {
        match contact_point.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => vec![crate::host::Address::new(host, port)],
                Err(_) => vec![crate::host::Address::new(contact_point, default_port)],
            },
            None => vec![crate::host::Address::new(contact_point, default_port)],
        }
    }
}

/// Every cluster-wide option the connector, control connection, and policy
/// chain consult (§3.1).
#[derive(Clone)]
pub struct ClusterSettings {
    pub port: u16,
    pub protocol_version: u8,
    pub dse_protocol: bool,
    pub reconnection_policy: ReconnectionPolicy,
    pub reconnect_timeout: Duration,
    pub connect_timeout: Duration,
    pub resolve_timeout: Duration,
    pub keepalive_interval: Option<Duration>,
    pub keepalive_timeout: Option<Duration>,
    pub load_balancing_policy: Arc<dyn LoadBalancingPolicy>,
    /// Additional policies for multi-execution-profile sessions, keyed by
    /// profile name (§3.1). Each entry is a builder, not a shared policy
    /// instance: every profile gets its own freshly initialized chain from
    /// `LoadBalancingPolicyBuilder::build()` rather than cloning the base
    /// policy's mutable state (§9 design notes).
    pub load_balancing_policies: HashMap<String, Arc<dyn LoadBalancingPolicyBuilder>>,
    pub auth_provider: Option<PlainTextAuthProvider>,
    pub ssl_context: Option<SslContext>,
    pub disable_events_on_startup: bool,
    pub use_randomized_contact_points: bool,
    pub cluster_metadata_resolver_factory: Arc<dyn ClusterMetadataResolverFactory>,
    pub schema_agreement_interval: Duration,
    pub schema_agreement_max_wait: Duration,
}

impl std::fmt::Debug for ClusterSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSettings")
            .field("port", &self.port)
            .field("protocol_version", &self.protocol_version)
            .field("reconnection_policy", &self.reconnection_policy)
            .field("load_balancing_policy", &self.load_balancing_policy.name())
            .field(
                "load_balancing_policies",
                &self.load_balancing_policies.keys().collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Method-chaining setters, validated at `build()`.
pub struct ClusterSettingsBuilder {
    contact_points: Vec<String>,
    port: u16,
    protocol_version: u8,
    dse_protocol: bool,
    reconnection_policy: ReconnectionPolicy,
    reconnect_timeout: Duration,
    connect_timeout: Duration,
    resolve_timeout: Duration,
    keepalive_interval: Option<Duration>,
    keepalive_timeout: Option<Duration>,
    load_balancing_policy: Option<Arc<dyn LoadBalancingPolicy>>,
    load_balancing_policies: HashMap<String, Arc<dyn LoadBalancingPolicyBuilder>>,
    auth_provider: Option<PlainTextAuthProvider>,
    ssl_context: Option<SslContext>,
    disable_events_on_startup: bool,
    use_randomized_contact_points: bool,
    cluster_metadata_resolver_factory: Option<Arc<dyn ClusterMetadataResolverFactory>>,
    schema_agreement_interval: Duration,
    schema_agreement_max_wait: Duration,
}

impl Default for ClusterSettingsBuilder {
    fn default() -> Self {
        Self {
            contact_points: Vec::new(),
            port: 9042,
            protocol_version: 4,
            dse_protocol: false,
            reconnection_policy: ReconnectionPolicy::Exponential {
                base: Duration::from_millis(100),
                max: Duration::from_secs(60),
            },
            reconnect_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            resolve_timeout: Duration::from_secs(5),
            keepalive_interval: None,
            keepalive_timeout: None,
            load_balancing_policy: None,
            load_balancing_policies: HashMap::new(),
            auth_provider: None,
            ssl_context: None,
            disable_events_on_startup: false,
            use_randomized_contact_points: false,
            cluster_metadata_resolver_factory: None,
            schema_agreement_interval: Duration::from_millis(200),
            schema_agreement_max_wait: Duration::from_secs(10),
        }
    }
}

impl ClusterSettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contact_points(mut self, points: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.contact_points = points.into_iter().map(Into::into).collect();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn protocol_version(mut self, version: u8, dse: bool) -> Self {
        self.protocol_version = version;
        self.dse_protocol = dse;
        self
    }

    pub fn reconnection_policy(mut self, policy: ReconnectionPolicy) -> Self {
        self.reconnection_policy = policy;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    pub fn keepalive(mut self, interval: Duration, timeout: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self.keepalive_timeout = Some(timeout);
        self
    }

    pub fn load_balancing_policy(mut self, policy: Arc<dyn LoadBalancingPolicy>) -> Self {
        self.load_balancing_policy = Some(policy);
        self
    }

    /// Registers a named execution profile's policy builder (§3.1). Each
    /// profile gets its own chain from `builder.build()` rather than sharing
    /// the base `load_balancing_policy`'s instance.
    pub fn execution_profile(mut self, name: impl Into<String>, builder: Arc<dyn LoadBalancingPolicyBuilder>) -> Self {
        self.load_balancing_policies.insert(name.into(), builder);
        self
    }

    #[cfg(feature = "secret")]
    pub fn auth_provider(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth_provider = Some(PlainTextAuthProvider {
            username: username.into(),
            password: secrecy::SecretString::new(password.into()),
        });
        self
    }

    #[cfg(not(feature = "secret"))]
    pub fn auth_provider(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth_provider = Some(PlainTextAuthProvider {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn ssl_context(mut self, ssl: SslContext) -> Self {
        self.ssl_context = Some(ssl);
        self
    }

    pub fn disable_events_on_startup(mut self, disable: bool) -> Self {
        self.disable_events_on_startup = disable;
        self
    }

    pub fn use_randomized_contact_points(mut self, randomize: bool) -> Self {
        self.use_randomized_contact_points = randomize;
        self
    }

    pub fn cluster_metadata_resolver_factory(mut self, factory: Arc<dyn ClusterMetadataResolverFactory>) -> Self {
        self.cluster_metadata_resolver_factory = Some(factory);
        self
    }

    pub fn schema_agreement_timing(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.schema_agreement_interval = interval;
        self.schema_agreement_max_wait = max_wait;
        self
    }

    pub fn contact_point_list(&self) -> &[String] {
        &self.contact_points
    }

    pub fn build(self) -> Result<ClusterSettings, BuildError> {
        if self.contact_points.is_empty() {
            return Err(BuildError::NoContactPoints);
        }
        let load_balancing_policy = self
            .load_balancing_policy
            .unwrap_or_else(|| Arc::new(crate::load_balancing::RoundRobinPolicy::new()));
        let cluster_metadata_resolver_factory = self
            .cluster_metadata_resolver_factory
            .unwrap_or_else(|| Arc::new(DnsMetadataResolverFactory));

        Ok(ClusterSettings {
            port: self.port,
            protocol_version: self.protocol_version,
            dse_protocol: self.dse_protocol,
            reconnection_policy: self.reconnection_policy,
            reconnect_timeout: self.reconnect_timeout,
            connect_timeout: self.connect_timeout,
            resolve_timeout: self.resolve_timeout,
            keepalive_interval: self.keepalive_interval,
            keepalive_timeout: self.keepalive_timeout,
            load_balancing_policy,
            load_balancing_policies: self.load_balancing_policies,
            auth_provider: self.auth_provider,
            ssl_context: self.ssl_context,
            disable_events_on_startup: self.disable_events_on_startup,
            use_randomized_contact_points: self.use_randomized_contact_points,
            cluster_metadata_resolver_factory,
            schema_agreement_interval: self.schema_agreement_interval,
            schema_agreement_max_wait: self.schema_agreement_max_wait,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_contact_points_fails() {
        let result = ClusterSettingsBuilder::new().build();
        assert!(matches!(result, Err(BuildError::NoContactPoints)));
    }

    #[test]
    fn build_with_contact_points_succeeds_with_defaults() {
        let settings = ClusterSettingsBuilder::new()
            .contact_points(["127.0.0.1"])
            .build()
            .unwrap();
        assert_eq!(settings.port, 9042);
        assert_eq!(settings.load_balancing_policy.name(), "RoundRobin");
    }

    #[test]
    fn exponential_policy_doubles_until_capped() {
        let policy = ReconnectionPolicy::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn execution_profile_builder_is_independent_of_base_policy() {
        use crate::load_balancing::{PolicyBuilder, PolicyChainBuilder, RoundRobinPolicy};

        let builder: Arc<dyn LoadBalancingPolicyBuilder> = Arc::new(PolicyBuilder::new(
            || Arc::new(RoundRobinPolicy::new()) as Arc<dyn LoadBalancingPolicy>,
            PolicyChainBuilder::new(),
        ));

        let settings = ClusterSettingsBuilder::new()
            .contact_points(["127.0.0.1"])
            .execution_profile("analytics", builder)
            .build()
            .unwrap();

        assert_eq!(settings.load_balancing_policies.len(), 1);
        let profile_policy = settings.load_balancing_policies["analytics"].build();
        assert!(!Arc::ptr_eq(
            &profile_policy,
            &(settings.load_balancing_policy.clone() as Arc<dyn LoadBalancingPolicy>)
        ));
    }

    #[test]
    fn dns_resolver_splits_host_and_port() {
        let resolver = DnsMetadataResolverFactory;
        let addrs = resolver.resolve("10.0.0.1:9142", 9042);
        assert_eq!(addrs[0].port(), 9142);
        let addrs = resolver.resolve("10.0.0.1", 9042);
        assert_eq!(addrs[0].port(), 9042);
    }
}
