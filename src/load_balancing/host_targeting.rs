//! Wraps a child policy, preferring a request's explicitly-requested host
//! (§4.F.6).

use std::collections::VecDeque;
use std::sync::Arc;

use crate::host::Host;
use crate::locator::TokenMap;

use super::{Distance, LoadBalancingPolicy, QueryPlan, RequestContext};

#[derive(Debug)]
pub struct HostTargetingPolicy {
    child: Arc<dyn LoadBalancingPolicy>,
}

impl HostTargetingPolicy {
    pub fn new(child: Arc<dyn LoadBalancingPolicy>) -> Self {
        Self { child }
    }
}

impl LoadBalancingPolicy for HostTargetingPolicy {
    fn init(&self, connected_host: Option<&Arc<Host>>, hosts: &[Arc<Host>], local_dc: Option<&str>) {
        self.child.init(connected_host, hosts, local_dc);
    }

    fn distance(&self, host: &Host) -> Distance {
        self.child.distance(host)
    }

    fn new_query_plan(&self, ctx: &RequestContext, token_map: Option<&TokenMap>) -> Box<dyn QueryPlan> {
        let child_plan = self.child.new_query_plan(ctx, token_map);
        let preferred = ctx.preferred_host.cloned();
        Box::new(HostTargetingPlan {
            child_plan,
            preferred,
            preferred_yielded: false,
            started: false,
            pending: VecDeque::new(),
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
        "HostTargeting"
    }
}

struct HostTargetingPlan {
    child_plan: Box<dyn QueryPlan>,
    preferred: Option<crate::host::Address>,
    preferred_yielded: bool,
    started: bool,
    /// Hosts pulled from the child plan while searching for `preferred` on
    /// the very first call, in their original order minus the preferred
    /// host itself. Drained before falling back to the child plan directly.
    pending: VecDeque<Arc<Host>>,
}

impl QueryPlan for HostTargetingPlan {
    fn compute_next(&mut self) -> Option<Arc<Host>> {
        if !self.started {
            self.started = true;
            if let Some(addr) = self.preferred.clone() {
                while let Some(host) = self.child_plan.compute_next() {
                    if host.address == addr {
                        self.preferred_yielded = true;
                        return Some(host);
                    }
                    self.pending.push_back(host);
                }
                // Child plan exhausted without ever offering the preferred
                // host; fall through to draining what was buffered.
            }
        }

        if let Some(host) = self.pending.pop_front() {
            return Some(host);
        }

        loop {
            let host = self.child_plan.compute_next()?;
            if self.preferred_yielded {
                if let Some(addr) = &self.preferred {
                    if &host.address == addr {
                        continue;
                    }
                }
            }
            return Some(host);
        }
    }
}
