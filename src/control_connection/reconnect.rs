//! Reconnection loop: walks the load-balancing policy's query plan under
//! the configured reconnection policy until a host accepts or the plan
//! exhausts (§4.G step 7).

use std::future::Future;
use std::sync::Arc;

use crate::host::{Address, Host};
use crate::load_balancing::QueryPlan;
use crate::settings::ReconnectionPolicy;

/// Drives `connect` against each host `plan` yields, in order, waiting
/// `policy`'s backoff between failed attempts. Calls `on_reconnect` before
/// every attempt — strictly before any event the new connection could
/// itself emit (§5's reconnection ordering guarantee). Returns the host
/// that accepted, or `None` once the plan is exhausted (the caller
/// transitions the cluster to closed).
pub async fn reconnect_loop<C, Fut, E>(
    mut plan: Box<dyn QueryPlan>,
    policy: &ReconnectionPolicy,
    mut connect: C,
    mut on_reconnect: impl FnMut(&Address),
) -> Option<Arc<Host>>
where
    C: FnMut(Address) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut attempt = 0u32;
    while let Some(host) = plan.compute_next() {
        on_reconnect(&host.address);
        match connect(host.address.clone()).await {
            Ok(()) => return Some(host),
            Err(_) => {
                let delay = policy.delay_for_attempt(attempt);
                attempt += 1;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Address as Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct VecPlan {
        hosts: std::vec::IntoIter<Arc<Host>>,
    }
    impl QueryPlan for VecPlan {
        fn compute_next(&mut self) -> Option<Arc<Host>> {
            self.hosts.next()
        }
    }

    fn host(ip: &str) -> Arc<Host> {
        Arc::new(Host::new(Addr::new(ip, 9042), "r1".into(), "dc1".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_reachable_host() {
        let plan: Box<dyn QueryPlan> = Box::new(VecPlan {
            hosts: vec![host("1.0.0.1"), host("1.0.0.2")].into_iter(),
        });
        let policy = ReconnectionPolicy::ConstantDelay { delay: Duration::from_millis(10) };
        let attempts = AtomicUsize::new(0);
        let on_reconnect_calls = AtomicUsize::new(0);

        let result = reconnect_loop(
            plan,
            &policy,
            |_addr| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), ()>(()) }
            },
            |_addr| {
                on_reconnect_calls.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert!(result.is_some());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(on_reconnect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_through_to_next_host_on_failure() {
        let plan: Box<dyn QueryPlan> = Box::new(VecPlan {
            hosts: vec![host("1.0.0.1"), host("1.0.0.2")].into_iter(),
        });
        let policy = ReconnectionPolicy::ConstantDelay { delay: Duration::from_millis(10) };

        let result = reconnect_loop(
            plan,
            &policy,
            |addr| {
                let ok = addr.host_or_ip() == "1.0.0.2";
                async move { if ok { Ok(()) } else { Err(()) } }
            },
            |_| {},
        )
        .await;

        assert_eq!(result.unwrap().address.host_or_ip(), "1.0.0.2");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_plan_yields_none() {
        let plan: Box<dyn QueryPlan> = Box::new(VecPlan { hosts: vec![].into_iter() });
        let policy = ReconnectionPolicy::ConstantDelay { delay: Duration::from_millis(1) };
        let result = reconnect_loop(plan, &policy, |_| async { Err::<(), ()>(()) }, |_| {}).await;
        assert!(result.is_none());
    }
}
