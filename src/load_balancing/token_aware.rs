//! Wraps a child policy, preferring replicas of the request's routing key
//! (§4.F.3).

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::host::{Address, Host};
use crate::locator::TokenMap;

use super::{new_rng, Distance, LoadBalancingPolicy, QueryPlan, RequestContext};

#[derive(Debug)]
pub struct TokenAwarePolicy {
    child: Arc<dyn LoadBalancingPolicy>,
    shuffle_replicas: bool,
}

impl TokenAwarePolicy {
    pub fn new(child: Arc<dyn LoadBalancingPolicy>, shuffle_replicas: bool) -> Self {
        Self { child, shuffle_replicas }
    }
}

impl LoadBalancingPolicy for TokenAwarePolicy {
    fn init(&self, connected_host: Option<&Arc<Host>>, hosts: &[Arc<Host>], local_dc: Option<&str>) {
        self.child.init(connected_host, hosts, local_dc);
    }

    fn distance(&self, host: &Host) -> Distance {
        self.child.distance(host)
    }

    fn new_query_plan(&self, ctx: &RequestContext, token_map: Option<&TokenMap>) -> Box<dyn QueryPlan> {
        let replicas = match (ctx.keyspace, ctx.routing_key, token_map) {
            (Some(ks), Some(key), Some(tm)) => {
                let mut replicas: Vec<Arc<Host>> = tm
                    .get_replicas(ks, key)
                    .into_iter()
                    .filter(|h| self.child.distance(h) == Distance::Local && self.child.is_host_up(h))
                    .collect();
                if self.shuffle_replicas {
                    replicas.shuffle(&mut new_rng());
                }
                replicas
            }
            _ => Vec::new(),
        };

        let already_yielded: HashSet<Address> = replicas.iter().map(|h| h.address.clone()).collect();
        let child_plan = self.child.new_query_plan(ctx, token_map);

        Box::new(TokenAwarePlan {
            replicas: replicas.into_iter(),
            child_plan,
            already_yielded,
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
        "TokenAware"
    }
}

struct TokenAwarePlan {
    replicas: std::vec::IntoIter<Arc<Host>>,
    child_plan: Box<dyn QueryPlan>,
    already_yielded: HashSet<Address>,
}

impl QueryPlan for TokenAwarePlan {
    fn compute_next(&mut self) -> Option<Arc<Host>> {
        if let Some(host) = self.replicas.next() {
            return Some(host);
        }
        loop {
            let host = self.child_plan.compute_next()?;
            if !self.already_yielded.contains(&host.address) {
                return Some(host);
            }
        }
    }
}
