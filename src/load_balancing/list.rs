//! Whitelist/blacklist wrappers, by host or by datacenter (§4.F.5).

use std::collections::HashSet;
use std::sync::Arc;

use crate::host::{Address, Host};
use crate::locator::TokenMap;

use super::{Distance, LoadBalancingPolicy, QueryPlan, RequestContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    WhitelistHosts,
    BlacklistHosts,
    WhitelistDcs,
    BlacklistDcs,
}

/// Filters a child policy's hosts by an address or datacenter predicate
/// (§4.F.5). `distance` reports `IGNORE` for anything the predicate rejects.
#[derive(Debug)]
pub struct ListPolicy {
    child: Arc<dyn LoadBalancingPolicy>,
    mode: Mode,
    hosts: HashSet<Address>,
    dcs: HashSet<String>,
}

impl ListPolicy {
    pub fn whitelist_hosts(child: Arc<dyn LoadBalancingPolicy>, hosts: Vec<Address>) -> Self {
        Self { child, mode: Mode::WhitelistHosts, hosts: hosts.into_iter().collect(), dcs: HashSet::new() }
    }
    pub fn blacklist_hosts(child: Arc<dyn LoadBalancingPolicy>, hosts: Vec<Address>) -> Self {
        Self { child, mode: Mode::BlacklistHosts, hosts: hosts.into_iter().collect(), dcs: HashSet::new() }
    }
    pub fn whitelist_dcs(child: Arc<dyn LoadBalancingPolicy>, dcs: Vec<String>) -> Self {
        Self { child, mode: Mode::WhitelistDcs, hosts: HashSet::new(), dcs: dcs.into_iter().collect() }
    }
    pub fn blacklist_dcs(child: Arc<dyn LoadBalancingPolicy>, dcs: Vec<String>) -> Self {
        Self { child, mode: Mode::BlacklistDcs, hosts: HashSet::new(), dcs: dcs.into_iter().collect() }
    }

    fn matches(&self, host: &Host) -> bool {
        match self.mode {
            Mode::WhitelistHosts => self.hosts.contains(&host.address),
            Mode::BlacklistHosts => !self.hosts.contains(&host.address),
            Mode::WhitelistDcs => self.dcs.contains(&host.datacenter),
            Mode::BlacklistDcs => !self.dcs.contains(&host.datacenter),
        }
    }
}

impl LoadBalancingPolicy for ListPolicy {
    fn init(&self, connected_host: Option<&Arc<Host>>, hosts: &[Arc<Host>], local_dc: Option<&str>) {
        let filtered: Vec<Arc<Host>> = hosts.iter().filter(|h| self.matches(h)).cloned().collect();
        self.child.init(connected_host, &filtered, local_dc);
    }

    fn distance(&self, host: &Host) -> Distance {
        if !self.matches(host) {
            return Distance::Ignore;
        }
        self.child.distance(host)
    }

    fn new_query_plan(&self, ctx: &RequestContext, token_map: Option<&TokenMap>) -> Box<dyn QueryPlan> {
        self.child.new_query_plan(ctx, token_map)
    }

    fn on_host_added(&self, host: &Arc<Host>) {
        if self.matches(host) {
            self.child.on_host_added(host);
        }
    }
    fn on_host_removed(&self, host: &Arc<Host>) {
        if self.matches(host) {
            self.child.on_host_removed(host);
        }
    }
    fn on_host_up(&self, host: &Arc<Host>) {
        if self.matches(host) {
            self.child.on_host_up(host);
        }
    }
    fn on_host_down(&self, host: &Arc<Host>) {
        if self.matches(host) {
            self.child.on_host_down(host);
        }
    }

    fn is_host_up(&self, host: &Host) -> bool {
        self.matches(host) && self.child.is_host_up(host)
    }

    fn name(&self) -> &'static str {
        "List"
    }
}
