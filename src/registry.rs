//! Host registry: authoritative membership plus listener dispatch (§4.D).

use std::sync::Arc;
use std::sync::Mutex;

use crate::host::{Address, Host, HostMap};
use crate::locator::TokenMap;

/// Topology/liveness callbacks (§4.D). Invoked synchronously on the
/// control-connection thread; implementations must not block.
pub trait ClusterListener: Send + Sync {
    fn on_host_up(&self, _host: &Arc<Host>) {}
    fn on_host_down(&self, _host: &Arc<Host>) {}
    fn on_host_added(&self, _host: &Arc<Host>) {}
    fn on_host_removed(&self, _host: &Arc<Host>) {}
    fn on_token_map_updated(&self, _token_map: &TokenMap) {}
    fn on_close(&self) {}
    fn on_reconnect(&self, _address: &Address) {}
}

/// Authoritative `Address -> Host` membership plus the listener fan-out
/// (§4.D). Owned by the cluster; every mutation runs on the
/// control-connection thread, matching §5's single-writer shared-resource
/// policy for `HostMap`.
pub struct HostRegistry {
    hosts: HostMap,
    listeners: Mutex<Vec<Arc<dyn ClusterListener>>>,
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRegistry {
    pub fn new() -> Self {
        Self {
            hosts: HostMap::new(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn ClusterListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    /// A stable snapshot of every currently-known host.
    pub fn hosts(&self) -> Vec<Arc<Host>> {
        self.hosts.snapshot()
    }

    pub fn get(&self, address: &Address) -> Option<Arc<Host>> {
        self.hosts.get(address)
    }

    /// Inserts `host` and fires `on_host_added`. Per §5's ordering
    /// guarantee, this must run before the first `notify_up` for the same
    /// host — callers are responsible for that sequencing (the control
    /// connection always adds before marking up).
    pub fn on_add(&self, host: Arc<Host>) {
        self.hosts.insert(host.clone());
        self.dispatch(|l| l.on_host_added(&host));
    }

    /// Removes `address` and fires `on_host_removed`, if it was known.
    pub fn on_remove(&self, address: &Address) {
        if let Some(host) = self.hosts.remove(address) {
            self.dispatch(|l| l.on_host_removed(&host));
        }
    }

    /// Flips liveness to up and fires `on_host_up`, unless the host was
    /// already up (no spurious repeat callbacks).
    pub fn notify_up(&self, address: &Address) {
        if let Some(host) = self.hosts.get(address) {
            if !host.is_up() {
                host.set_up(true);
                self.dispatch(|l| l.on_host_up(&host));
            }
        } else {
            tracing::warn!(address = %address, "notify_up for unknown host");
        }
    }

    /// Flips liveness to down and fires `on_host_down`, unless the host was
    /// already down.
    pub fn notify_down(&self, address: &Address) {
        if let Some(host) = self.hosts.get(address) {
            if host.is_up() {
                host.set_up(false);
                self.dispatch(|l| l.on_host_down(&host));
            }
        } else {
            tracing::warn!(address = %address, "notify_down for unknown host");
        }
    }

    /// Fired after a ring rebuild that changed at least one keyspace's
    /// replicas (§5's `on_token_map_updated` causality guarantee).
    pub fn notify_token_map_updated(&self, token_map: &TokenMap) {
        self.dispatch(|l| l.on_token_map_updated(token_map));
    }

    /// Fired strictly before any event emitted by the new connection
    /// (§5's reconnection ordering guarantee).
    pub fn notify_reconnect(&self, address: &Address) {
        self.dispatch(|l| l.on_reconnect(address));
    }

    pub fn notify_close(&self) {
        self.dispatch(|l| l.on_close());
    }

    fn dispatch(&self, f: impl Fn(&Arc<dyn ClusterListener>)) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            f(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        added: AtomicUsize,
        removed: AtomicUsize,
        up: AtomicUsize,
        down: AtomicUsize,
    }

    impl ClusterListener for CountingListener {
        fn on_host_added(&self, _host: &Arc<Host>) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }
        fn on_host_removed(&self, _host: &Arc<Host>) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_host_up(&self, _host: &Arc<Host>) {
            self.up.fetch_add(1, Ordering::SeqCst);
        }
        fn on_host_down(&self, _host: &Arc<Host>) {
            self.down.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn host(ip: &str) -> Arc<Host> {
        Arc::new(Host::new(Address::new(ip, 9042), "r1".into(), "dc1".into()))
    }

    #[test]
    fn add_precedes_up_for_same_host() {
        let registry = HostRegistry::new();
        let listener = Arc::new(CountingListener::default());
        registry.register_listener(listener.clone());

        let h = host("10.0.0.1");
        registry.on_add(h.clone());
        assert_eq!(listener.added.load(Ordering::SeqCst), 1);
        assert_eq!(listener.up.load(Ordering::SeqCst), 0);

        registry.notify_up(&h.address);
        assert_eq!(listener.up.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_notify_up_does_not_double_fire() {
        let registry = HostRegistry::new();
        let listener = Arc::new(CountingListener::default());
        registry.register_listener(listener.clone());

        let h = host("10.0.0.1");
        registry.on_add(h.clone());
        registry.notify_up(&h.address);
        registry.notify_up(&h.address);
        assert_eq!(listener.up.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_up_for_unknown_host_is_a_noop() {
        let registry = HostRegistry::new();
        let listener = Arc::new(CountingListener::default());
        registry.register_listener(listener.clone());
        registry.notify_up(&Address::new("10.0.0.9", 9042));
        assert_eq!(listener.up.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_fires_on_host_removed_and_drops_from_snapshot() {
        let registry = HostRegistry::new();
        let listener = Arc::new(CountingListener::default());
        registry.register_listener(listener.clone());

        let h = host("10.0.0.1");
        registry.on_add(h.clone());
        registry.on_remove(&h.address);
        assert_eq!(listener.removed.load(Ordering::SeqCst), 1);
        assert!(registry.hosts().is_empty());
    }
}
