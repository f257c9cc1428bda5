//! Plain round-robin over all known hosts (§4.F.1).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::host::{Host, HostVec};
use crate::locator::TokenMap;

use super::{new_rng, Distance, LoadBalancingPolicy, QueryPlan, RequestContext};

/// A copy-on-write host vector walked `hosts[(index + i) mod n]`, skipping
/// hosts that are down. `index` increments atomically per plan so
/// concurrent plans fan out across different starting points (§4.F.1).
#[derive(Debug)]
pub struct RoundRobinPolicy {
    hosts: HostVec,
    index: AtomicUsize,
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self {
            hosts: HostVec::default(),
            index: AtomicUsize::new(0),
        }
    }
}

impl LoadBalancingPolicy for RoundRobinPolicy {
    fn init(&self, _connected_host: Option<&Arc<Host>>, hosts: &[Arc<Host>], _local_dc: Option<&str>) {
        self.hosts.replace(hosts.to_vec());
        // Randomize the starting point the way an RNG supplied at init would (§4.F.1).
        let mut rng = new_rng();
        if !hosts.is_empty() {
            self.index.store(rng.gen_range(0..hosts.len()), Ordering::Relaxed);
        }
    }

    fn distance(&self, _host: &Host) -> Distance {
        Distance::Local
    }

    fn new_query_plan(&self, _ctx: &RequestContext, _token_map: Option<&TokenMap>) -> Box<dyn QueryPlan> {
        let snapshot = self.hosts.load();
        let start = self.index.fetch_add(1, Ordering::Relaxed);
        Box::new(RoundRobinPlan {
            snapshot,
            start,
            offset: 0,
        })
    }

    fn on_host_added(&self, host: &Arc<Host>) {
        self.hosts.push(host.clone());
    }

    fn on_host_removed(&self, host: &Arc<Host>) {
        self.hosts.remove(&host.address);
    }

    fn name(&self) -> &'static str {
        "RoundRobin"
    }
}

struct RoundRobinPlan {
    snapshot: Arc<Vec<Arc<Host>>>,
    start: usize,
    offset: usize,
}

impl QueryPlan for RoundRobinPlan {
    fn compute_next(&mut self) -> Option<Arc<Host>> {
        let n = self.snapshot.len();
        while self.offset < n {
            let idx = (self.start + self.offset) % n;
            self.offset += 1;
            let host = &self.snapshot[idx];
            if host.is_up() {
                return Some(host.clone());
            }
        }
        None
    }
}
