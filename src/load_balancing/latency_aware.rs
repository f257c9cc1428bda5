//! Wraps a child policy, deferring hosts whose latency average is
//! significantly above the cluster minimum (§4.F.4).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::host::Host;
use crate::locator::TokenMap;

use super::{Distance, LoadBalancingPolicy, QueryPlan, RequestContext};

#[derive(Debug, Clone)]
pub struct LatencyAwareSettings {
    pub scale_ns: f64,
    pub min_measured: u64,
    pub exclusion_threshold: f64,
    pub retry_period: Duration,
    pub update_rate: Duration,
}

impl LatencyAwareSettings {
    /// Warm-up sample count below which a host reports "not measured",
    /// `30% of min_measured` per §4.F.4.
    pub fn threshold_to_account(&self) -> u64 {
        (30 * self.min_measured) / 100
    }
}

impl Default for LatencyAwareSettings {
    fn default() -> Self {
        Self {
            scale_ns: 100_000_000.0,
            min_measured: 50,
            exclusion_threshold: 2.0,
            retry_period: Duration::from_secs(10),
            update_rate: Duration::from_millis(100),
        }
    }
}

#[derive(Debug)]
pub struct LatencyAwarePolicy {
    child: Arc<dyn LoadBalancingPolicy>,
    settings: LatencyAwareSettings,
    // Cluster-wide minimum average, in nanoseconds; refreshed by a periodic
    // `update_rate` timer. Caches as `-1` until at least one host has a
    // measured average.
    cluster_min_ns: AtomicI64,
}

impl LatencyAwarePolicy {
    pub fn new(child: Arc<dyn LoadBalancingPolicy>, settings: LatencyAwareSettings) -> Self {
        Self {
            child,
            settings,
            cluster_min_ns: AtomicI64::new(-1),
        }
    }

    /// Recomputes the cluster-wide minimum average across `hosts`. Called by
    /// the `update_rate_ms` timer (§4.F.4); exposed here so callers can drive
    /// it from their own reactor without this crate owning a timer.
    pub fn refresh_cluster_minimum(&self, hosts: &[Arc<Host>]) {
        let min = hosts
            .iter()
            .filter_map(|h| h.latency_stats.average(self.settings.min_measured))
            .map(|d| d.as_nanos() as i64)
            .min();
        if let Some(min) = min {
            self.cluster_min_ns.store(min, Ordering::Relaxed);
        }
    }

}

impl LoadBalancingPolicy for LatencyAwarePolicy {
    fn init(&self, connected_host: Option<&Arc<Host>>, hosts: &[Arc<Host>], local_dc: Option<&str>) {
        self.child.init(connected_host, hosts, local_dc);
        self.refresh_cluster_minimum(hosts);
    }

    fn distance(&self, host: &Host) -> Distance {
        self.child.distance(host)
    }

    fn new_query_plan(&self, ctx: &RequestContext, token_map: Option<&TokenMap>) -> Box<dyn QueryPlan> {
        let child_plan = self.child.new_query_plan(ctx, token_map);
        Box::new(LatencyAwarePlan {
            child_plan,
            deferred: Vec::new(),
            draining_deferred: false,
            threshold_to_account: self.settings.threshold_to_account(),
            min_measured: self.settings.min_measured,
            exclusion_threshold: self.settings.exclusion_threshold,
            retry_period: self.settings.retry_period,
            cluster_min_ns: self.cluster_min_ns.load(Ordering::Relaxed),
        })
    }

    fn on_host_added(&self, host: &Arc<Host>) {
        self.child.on_host_added(host);
    }
    fn on_host_removed(&self, host: &Arc<Host>) {
        self.child.on_host_removed(host);
    }
    fn on_host_up(&self, host: &Arc<Host>) {
        self.child.on_host_up(host);
    }
    fn on_host_down(&self, host: &Arc<Host>) {
        self.child.on_host_down(host);
    }

    fn is_host_up(&self, host: &Host) -> bool {
        self.child.is_host_up(host)
    }

    fn name(&self) -> &'static str {
        "LatencyAware"
    }
}

/// A snapshot of the settings `new_query_plan` needs, frozen at plan
/// creation so the plan doesn't borrow the policy (§4.E: plans outlive the
/// snapshot they were built from).
struct LatencyAwarePlan {
    child_plan: Box<dyn QueryPlan>,
    deferred: Vec<Arc<Host>>,
    draining_deferred: bool,
    threshold_to_account: u64,
    min_measured: u64,
    exclusion_threshold: f64,
    retry_period: Duration,
    cluster_min_ns: i64,
}

impl LatencyAwarePlan {
    fn is_penalized(&self, host: &Host) -> bool {
        if host.latency_stats.sample_count() < self.threshold_to_account {
            return false;
        }
        if self.cluster_min_ns < 0 {
            return false;
        }
        let Some(avg) = host.latency_stats.average(self.min_measured) else {
            return false;
        };
        if (avg.as_nanos() as f64) <= (self.cluster_min_ns as f64) * self.exclusion_threshold {
            return false;
        }
        match host.latency_stats.last_high_latency_age() {
            Some(age) => age < self.retry_period,
            None => true,
        }
    }
}

impl QueryPlan for LatencyAwarePlan {
    fn compute_next(&mut self) -> Option<Arc<Host>> {
        if !self.draining_deferred {
            while let Some(host) = self.child_plan.compute_next() {
                if self.is_penalized(&host) {
                    self.deferred.push(host);
                } else {
                    return Some(host);
                }
            }
            self.draining_deferred = true;
        }
        if self.deferred.is_empty() {
            None
        } else {
            Some(self.deferred.remove(0))
        }
    }
}
