//! Datacenter-aware round robin with bounded remote failover (§4.F.2).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::host::{Host, HostVec};
use crate::locator::TokenMap;

use super::{Distance, LoadBalancingPolicy, QueryPlan, RequestContext};

/// Yields local-DC hosts round-robin, then up to `used_hosts_per_remote_dc`
/// hosts from each other datacenter (§4.F.2).
#[derive(Debug)]
pub struct DcAwarePolicy {
    local_dc: std::sync::RwLock<String>,
    used_hosts_per_remote_dc: usize,
    skip_remote_dcs_for_local_cl: bool,
    hosts: HostVec,
    local_index: AtomicUsize,
    remote_index: AtomicUsize,
}

impl DcAwarePolicy {
    pub fn new(local_dc: impl Into<String>, used_hosts_per_remote_dc: usize, skip_remote_dcs_for_local_cl: bool) -> Self {
        Self {
            local_dc: std::sync::RwLock::new(local_dc.into()),
            used_hosts_per_remote_dc,
            skip_remote_dcs_for_local_cl,
            hosts: HostVec::default(),
            local_index: AtomicUsize::new(0),
            remote_index: AtomicUsize::new(0),
        }
    }

    fn local_dc(&self) -> String {
        self.local_dc.read().unwrap().clone()
    }

    fn is_local(&self, host: &Host) -> bool {
        let local_dc = self.local_dc();
        if local_dc.is_empty() {
            true
        } else {
            host.datacenter == local_dc || (host.datacenter.is_empty() && local_dc.is_empty())
        }
    }
}

impl LoadBalancingPolicy for DcAwarePolicy {
    fn init(&self, connected_host: Option<&Arc<Host>>, hosts: &[Arc<Host>], local_dc: Option<&str>) {
        self.hosts.replace(hosts.to_vec());
        if self.local_dc().is_empty() {
            let adopted = local_dc
                .map(str::to_string)
                .or_else(|| connected_host.map(|h| h.datacenter.clone()))
                .unwrap_or_default();
            *self.local_dc.write().unwrap() = adopted;
        }
    }

    fn distance(&self, host: &Host) -> Distance {
        if self.is_local(host) {
            return Distance::Local;
        }
        if self.used_hosts_per_remote_dc == 0 {
            return Distance::Ignore;
        }
        let local_dc = self.local_dc();
        let rank = self
            .hosts
            .load()
            .iter()
            .filter(|h| h.datacenter == host.datacenter && h.datacenter != local_dc)
            .position(|h| h.address == host.address);
        match rank {
            Some(r) if r < self.used_hosts_per_remote_dc => Distance::Remote,
            _ => Distance::Ignore,
        }
    }

    fn new_query_plan(&self, ctx: &RequestContext, _token_map: Option<&TokenMap>) -> Box<dyn QueryPlan> {
        let snapshot = self.hosts.load();
        let local_dc = self.local_dc();

        let mut local: Vec<Arc<Host>> = snapshot
            .iter()
            .filter(|h| self.is_local(h))
            .cloned()
            .collect();
        let local_start = self.local_index.fetch_add(1, Ordering::Relaxed);
        if !local.is_empty() {
            let n = local.len();
            local.rotate_left(local_start % n);
        }

        let allow_remote = self.used_hosts_per_remote_dc > 0
            && !(self.skip_remote_dcs_for_local_cl && ctx.consistency_is_local);

        let mut remote = Vec::new();
        // Hosts with no known datacenter are their own pseudo-remote-DC
        // (matching `distance()`'s grouping); they're collected separately
        // so they can be appended after every named remote DC rather than
        // interleaved with or dropped from the plan.
        let mut empty_dc = Vec::new();
        if allow_remote {
            let mut by_dc: std::collections::HashMap<&str, Vec<Arc<Host>>> = std::collections::HashMap::new();
            for h in snapshot.iter() {
                if h.datacenter == local_dc {
                    continue;
                }
                if h.datacenter.is_empty() {
                    empty_dc.push(h.clone());
                } else {
                    by_dc.entry(h.datacenter.as_str()).or_default().push(h.clone());
                }
            }
            let remote_start = self.remote_index.fetch_add(1, Ordering::Relaxed);
            for hosts in by_dc.values_mut() {
                let n = hosts.len();
                if n > 0 {
                    hosts.rotate_left(remote_start % n);
                }
                remote.extend(hosts.iter().take(self.used_hosts_per_remote_dc).cloned());
            }
            if !empty_dc.is_empty() {
                let n = empty_dc.len();
                empty_dc.rotate_left(remote_start % n);
                remote.extend(empty_dc.iter().take(self.used_hosts_per_remote_dc).cloned());
            }
        }

        local.extend(remote);
        Box::new(DcAwarePlan { ordered: local, offset: 0 })
    }

    fn on_host_added(&self, host: &Arc<Host>) {
        self.hosts.push(host.clone());
    }

    fn on_host_removed(&self, host: &Arc<Host>) {
        self.hosts.remove(&host.address);
    }

    fn name(&self) -> &'static str {
        "DCAware"
    }
}

struct DcAwarePlan {
    ordered: Vec<Arc<Host>>,
    offset: usize,
}

impl QueryPlan for DcAwarePlan {
    fn compute_next(&mut self) -> Option<Arc<Host>> {
        while self.offset < self.ordered.len() {
            let host = self.ordered[self.offset].clone();
            self.offset += 1;
            if host.is_up() {
                return Some(host);
            }
        }
        None
    }
}
