//! Query-plan primitives and the load-balancing policy chain (§4.E, §4.F).

mod dc_aware;
mod host_targeting;
mod latency_aware;
mod list;
mod round_robin;
mod token_aware;

pub use dc_aware::DcAwarePolicy;
pub use host_targeting::HostTargetingPolicy;
pub use latency_aware::{LatencyAwarePolicy, LatencyAwareSettings};
pub use list::ListPolicy;
pub use round_robin::RoundRobinPolicy;
pub use token_aware::TokenAwarePolicy;

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::host::{Address, Host};
use crate::locator::TokenMap;

/// How a policy ranks a host relative to the local datacenter (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Local,
    Remote,
    Ignore,
}

/// The routing context a request supplies to a plan factory (§4.E).
#[derive(Debug, Clone, Default)]
pub struct RequestContext<'a> {
    pub keyspace: Option<&'a str>,
    pub routing_key: Option<&'a [u8]>,
    pub preferred_host: Option<&'a Address>,
    pub consistency_is_local: bool,
}

/// A lazy, finite, non-restartable sequence of hosts (§4.E). Does not hold
/// locks; it observes the copy-on-write snapshots it was built from and may
/// outlive them.
pub trait QueryPlan: Send {
    fn compute_next(&mut self) -> Option<Arc<Host>>;
}

impl Iterator for dyn QueryPlan + '_ {
    type Item = Arc<Host>;
    fn next(&mut self) -> Option<Arc<Host>> {
        self.compute_next()
    }
}

/// An empty plan, returned when a policy has nothing to offer.
pub struct EmptyPlan;
impl QueryPlan for EmptyPlan {
    fn compute_next(&mut self) -> Option<Arc<Host>> {
        None
    }
}

/// The capability set every load-balancing policy implements (§4.F).
pub trait LoadBalancingPolicy: Send + Sync + std::fmt::Debug {
    /// Called once, when the policy is attached to a connected cluster.
    fn init(&self, connected_host: Option<&Arc<Host>>, hosts: &[Arc<Host>], local_dc: Option<&str>);

    fn distance(&self, host: &Host) -> Distance;

    fn new_query_plan(&self, ctx: &RequestContext, token_map: Option<&TokenMap>) -> Box<dyn QueryPlan>;

    fn on_host_added(&self, _host: &Arc<Host>) {}
    fn on_host_removed(&self, _host: &Arc<Host>) {}
    fn on_host_up(&self, _host: &Arc<Host>) {}
    fn on_host_down(&self, _host: &Arc<Host>) {}

    fn is_host_up(&self, host: &Host) -> bool {
        host.is_up()
    }

    fn name(&self) -> &'static str;
}

/// Builds a seeded `SmallRng` the way policies needing randomization draw
/// theirs at `init` time (§4.F.1, §4.F.3).
pub(crate) fn new_rng() -> SmallRng {
    SmallRng::from_entropy()
}

/// Yields independent policy instances from shared configuration (§3.1's
/// `load_balancing_policies`, §9 design notes). Each `build()` call produces
/// a freshly initialized chain rather than handing out a clone of one
/// policy's mutable internals — the replacement for the source's
/// `new_instance` cloning, needed so multiple execution profiles don't
/// fight over one `RoundRobinPolicy`'s index or one `ListPolicy`'s cached
/// host set.
pub trait LoadBalancingPolicyBuilder: Send + Sync {
    fn build(&self) -> Arc<dyn LoadBalancingPolicy>;
}

/// A `LoadBalancingPolicyBuilder` built from a base-policy factory plus a
/// `PolicyChainBuilder` recipe: every `build()` call invokes the factory
/// fresh and wraps the result in a brand new chain.
pub struct PolicyBuilder {
    chain: PolicyChainBuilder,
    base_factory: Arc<dyn Fn() -> Arc<dyn LoadBalancingPolicy> + Send + Sync>,
}

impl PolicyBuilder {
    pub fn new(
        base_factory: impl Fn() -> Arc<dyn LoadBalancingPolicy> + Send + Sync + 'static,
        chain: PolicyChainBuilder,
    ) -> Self {
        Self {
            chain,
            base_factory: Arc::new(base_factory),
        }
    }
}

impl LoadBalancingPolicyBuilder for PolicyBuilder {
    fn build(&self) -> Arc<dyn LoadBalancingPolicy> {
        self.chain.clone().build((self.base_factory)())
    }
}

/// Composes the policy chain bottom-up, matching §4.F.7's fixed order:
/// base -> blacklist -> whitelist -> blacklist-DC -> whitelist-DC ->
/// token-aware -> latency-aware -> host-targeting. Every wrapper stage is
/// optional; `None` skips it. Cheap to `Clone`: it's pure configuration, no
/// policy state, which is what lets `PolicyBuilder` stamp out an
/// independent chain per `build()` call.
#[derive(Default, Clone)]
pub struct PolicyChainBuilder {
    blacklist_hosts: Option<Vec<Address>>,
    whitelist_hosts: Option<Vec<Address>>,
    blacklist_dcs: Option<Vec<String>>,
    whitelist_dcs: Option<Vec<String>>,
    token_aware: bool,
    token_aware_shuffle: bool,
    latency_aware: Option<LatencyAwareSettings>,
    host_targeting: bool,
}

impl PolicyChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blacklist_hosts(mut self, hosts: Vec<Address>) -> Self {
        self.blacklist_hosts = Some(hosts);
        self
    }
    pub fn whitelist_hosts(mut self, hosts: Vec<Address>) -> Self {
        self.whitelist_hosts = Some(hosts);
        self
    }
    pub fn blacklist_dcs(mut self, dcs: Vec<String>) -> Self {
        self.blacklist_dcs = Some(dcs);
        self
    }
    pub fn whitelist_dcs(mut self, dcs: Vec<String>) -> Self {
        self.whitelist_dcs = Some(dcs);
        self
    }
    pub fn token_aware(mut self, shuffle: bool) -> Self {
        self.token_aware = true;
        self.token_aware_shuffle = shuffle;
        self
    }
    pub fn latency_aware(mut self, settings: LatencyAwareSettings) -> Self {
        self.latency_aware = Some(settings);
        self
    }
    pub fn host_targeting(mut self) -> Self {
        self.host_targeting = true;
        self
    }

    pub fn build(self, base: Arc<dyn LoadBalancingPolicy>) -> Arc<dyn LoadBalancingPolicy> {
        let mut policy = base;

        if let Some(hosts) = self.blacklist_hosts {
            policy = Arc::new(ListPolicy::blacklist_hosts(policy, hosts));
        }
        if let Some(hosts) = self.whitelist_hosts {
            policy = Arc::new(ListPolicy::whitelist_hosts(policy, hosts));
        }
        if let Some(dcs) = self.blacklist_dcs {
            policy = Arc::new(ListPolicy::blacklist_dcs(policy, dcs));
        }
        if let Some(dcs) = self.whitelist_dcs {
            policy = Arc::new(ListPolicy::whitelist_dcs(policy, dcs));
        }
        if self.token_aware {
            policy = Arc::new(TokenAwarePolicy::new(policy, self.token_aware_shuffle));
        }
        if let Some(settings) = self.latency_aware {
            policy = Arc::new(LatencyAwarePolicy::new(policy, settings));
        }
        if self.host_targeting {
            policy = Arc::new(HostTargetingPolicy::new(policy));
        }

        policy
    }
}
