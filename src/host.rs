//! Address/Host entities and the collections that hold them (§3.1).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use uuid::Uuid;

/// A network endpoint: host/IP, port, and an optional SNI server name used
/// by cloud-style proxy resolvers (§3.1).
#[derive(Debug, Clone)]
pub struct Address {
    host_or_ip: String,
    port: u16,
    sni_server_name: Option<String>,
}

impl Address {
    pub fn new(host_or_ip: impl Into<String>, port: u16) -> Self {
        Self {
            host_or_ip: host_or_ip.into(),
            port,
            sni_server_name: None,
        }
    }

    pub fn with_sni(mut self, sni_server_name: impl Into<String>) -> Self {
        self.sni_server_name = Some(sni_server_name.into());
        self
    }

    pub fn host_or_ip(&self) -> &str {
        &self.host_or_ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn sni_server_name(&self) -> Option<&str> {
        self.sni_server_name.as_deref()
    }

    /// A literal IP or non-empty hostname with a nonzero port.
    pub fn is_valid(&self) -> bool {
        !self.host_or_ip.is_empty() && self.port != 0
    }

    /// True for the IPv4/IPv6 "any" address, which never identifies a real peer.
    pub fn is_unspecified(&self) -> bool {
        self.host_or_ip == "0.0.0.0" || self.host_or_ip == "::" || self.host_or_ip == "[::]"
    }

    /// Canonical `host:port` rendering.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.host_or_ip, self.port)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.host_or_ip == other.host_or_ip
            && self.port == other.port
            && self.sni_server_name == other.sni_server_name
    }
}
impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host_or_ip.hash(state);
        self.port.hash(state);
        self.sni_server_name.hash(state);
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Address {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.host_or_ip, self.port, &self.sni_server_name).cmp(&(
            &other.host_or_ip,
            other.port,
            &other.sni_server_name,
        ))
    }
}

/// A timestamped exponentially-weighted moving average used by the
/// latency-aware policy (§4.F.4). Updated without locking: a CAS loop packs
/// `(average_ns, last_update_ns_since_epoch)` isn't attempted here because the
/// two fields don't need to be read atomically together; each is independent
/// state read by a policy that tolerates slightly-stale pairs (matches the
/// spec's "lock-free update protocol" wording in §5, not a strict fence).
#[derive(Debug)]
pub struct LatencyStats {
    average_ns: AtomicI64,
    sample_count: AtomicU64,
    last_high_latency_ns: AtomicI64,
    started: Instant,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self {
            average_ns: AtomicI64::new(-1),
            sample_count: AtomicU64::new(0),
            last_high_latency_ns: AtomicI64::new(-1),
            started: Instant::now(),
        }
    }
}

impl LatencyStats {
    /// Records a new latency sample, folding it into the EWMA with the given
    /// time-constant `scale_ns`.
    pub fn record(&self, latency: Duration, scale_ns: f64) {
        let sample_ns = latency.as_nanos() as i64;
        self.sample_count.fetch_add(1, Ordering::Relaxed);

        loop {
            let prev = self.average_ns.load(Ordering::Relaxed);
            let next = if prev < 0 {
                sample_ns
            } else {
                let alpha = 1.0 - (-1.0 * (sample_ns as f64) / scale_ns).exp();
                let prev_f = prev as f64;
                (prev_f + alpha * (sample_ns as f64 - prev_f)) as i64
            };
            if self
                .average_ns
                .compare_exchange(prev, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    pub fn mark_high_latency(&self, at: Instant) {
        self.last_high_latency_ns
            .store(at.duration_since(self.started).as_nanos() as i64, Ordering::Relaxed);
    }

    pub fn last_high_latency_age(&self) -> Option<Duration> {
        let ns = self.last_high_latency_ns.load(Ordering::Relaxed);
        if ns < 0 {
            return None;
        }
        let at = self.started + Duration::from_nanos(ns as u64);
        Some(Instant::now().saturating_duration_since(at))
    }

    /// Average in nanoseconds, or `None` if fewer than `min_measured` samples
    /// have been recorded yet (warm-up, §4.F.4).
    pub fn average(&self, min_measured: u64) -> Option<Duration> {
        if self.sample_count.load(Ordering::Relaxed) < min_measured {
            return None;
        }
        let ns = self.average_ns.load(Ordering::Relaxed);
        if ns < 0 {
            None
        } else {
            Some(Duration::from_nanos(ns as u64))
        }
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count.load(Ordering::Relaxed)
    }
}

/// A cluster node (§3.1). Immutable except for `is_up` and `latency_stats`;
/// shared between the registry and every query plan via `Arc`.
#[derive(Debug)]
pub struct Host {
    pub address: Address,
    pub rack: String,
    pub datacenter: String,
    pub host_id: Option<Uuid>,
    pub tokens: Vec<String>,
    pub listen_address: Option<Address>,
    pub cassandra_version: Option<String>,
    pub dse_version: Option<String>,
    is_up: AtomicBool,
    pub latency_stats: LatencyStats,
}

impl Host {
    pub fn new(address: Address, rack: String, datacenter: String) -> Self {
        Self {
            address,
            rack,
            datacenter,
            host_id: None,
            tokens: Vec::new(),
            listen_address: None,
            cassandra_version: None,
            dse_version: None,
            is_up: AtomicBool::new(false),
            latency_stats: LatencyStats::default(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.is_up.load(Ordering::Acquire)
    }

    /// Flips liveness. Per §I5 transitions are monotonic per event source: the
    /// caller (the control-connection thread, per §4.D) is the sole writer, so
    /// a plain store is sufficient — there is no concurrent writer to race.
    pub fn set_up(&self, up: bool) {
        self.is_up.store(up, Ordering::Release);
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}
impl Eq for Host {}

/// Authoritative `Address -> Host` membership (§3.1). Backed by `DashMap` so
/// readers on arbitrary threads never block the control-connection thread's
/// writes (§5's "owned exclusively by the event loop thread; snapshots are
/// cheap clones" becomes, in a lock-free map, "writes are serialized through
/// the single writer by convention, reads never block").
#[derive(Debug, Default)]
pub struct HostMap {
    inner: DashMap<Address, Arc<Host>>,
}

impl HostMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, host: Arc<Host>) -> Option<Arc<Host>> {
        self.inner.insert(host.address.clone(), host)
    }

    pub fn remove(&self, address: &Address) -> Option<Arc<Host>> {
        self.inner.remove(address).map(|(_, h)| h)
    }

    pub fn get(&self, address: &Address) -> Option<Arc<Host>> {
        self.inner.get(address).map(|r| r.value().clone())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.inner.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// A stable snapshot of every currently-known host.
    pub fn snapshot(&self) -> Vec<Arc<Host>> {
        self.inner.iter().map(|r| r.value().clone()).collect()
    }
}

/// A copy-on-write ordered sequence of hosts (§3.1). Readers clone the `Arc`
/// cheaply and never block; a writer that holds the sole reference mutates in
/// place via `Arc::get_mut`, otherwise clones the underlying `Vec` first —
/// the usual `arc-swap` read/write trade-off.
#[derive(Debug)]
pub struct HostVec {
    inner: ArcSwap<Vec<Arc<Host>>>,
}

impl Default for HostVec {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl HostVec {
    pub fn new(hosts: Vec<Arc<Host>>) -> Self {
        Self {
            inner: ArcSwap::from_pointee(hosts),
        }
    }

    /// A stable, lock-free snapshot `Arc` readers can iterate without racing
    /// a concurrent writer.
    pub fn load(&self) -> Arc<Vec<Arc<Host>>> {
        self.inner.load_full()
    }

    pub fn push(&self, host: Arc<Host>) {
        self.inner.rcu(|cur| {
            let mut next = (**cur).clone();
            next.push(host.clone());
            next
        });
    }

    pub fn remove(&self, address: &Address) {
        self.inner.rcu(|cur| {
            cur.iter()
                .filter(|h| &h.address != address)
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    pub fn replace(&self, hosts: Vec<Arc<Host>>) {
        self.inner.store(Arc::new(hosts));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_equality_is_field_wise() {
        let a = Address::new("10.0.0.1", 9042);
        let b = Address::new("10.0.0.1", 9042);
        let c = Address::new("10.0.0.1", 9043);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn address_unspecified_predicate() {
        assert!(Address::new("0.0.0.0", 9042).is_unspecified());
        assert!(Address::new("::", 9042).is_unspecified());
        assert!(!Address::new("10.0.0.1", 9042).is_unspecified());
    }

    #[test]
    fn host_liveness_starts_down_and_flips() {
        let host = Host::new(Address::new("10.0.0.1", 9042), "r1".into(), "dc1".into());
        assert!(!host.is_up());
        host.set_up(true);
        assert!(host.is_up());
        host.set_up(false);
        assert!(!host.is_up());
    }

    #[test]
    fn host_map_insert_remove_snapshot() {
        let map = HostMap::new();
        let addr = Address::new("10.0.0.1", 9042);
        let host = Arc::new(Host::new(addr.clone(), "r1".into(), "dc1".into()));
        map.insert(host.clone());
        assert!(map.contains(&addr));
        assert_eq!(map.snapshot().len(), 1);
        map.remove(&addr);
        assert!(!map.contains(&addr));
    }

    #[test]
    fn host_vec_copy_on_write_push_and_remove() {
        let vec = HostVec::default();
        let addr1 = Address::new("10.0.0.1", 9042);
        let addr2 = Address::new("10.0.0.2", 9042);
        vec.push(Arc::new(Host::new(addr1.clone(), "r1".into(), "dc1".into())));
        vec.push(Arc::new(Host::new(addr2.clone(), "r1".into(), "dc1".into())));
        assert_eq!(vec.load().len(), 2);
        vec.remove(&addr1);
        let snapshot = vec.load();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].address, addr2);
    }

    #[test]
    fn latency_stats_warms_up_before_reporting() {
        let stats = LatencyStats::default();
        stats.record(Duration::from_millis(10), 100_000_000.0);
        assert!(stats.average(2).is_none());
        stats.record(Duration::from_millis(12), 100_000_000.0);
        assert!(stats.average(2).is_some());
    }
}
