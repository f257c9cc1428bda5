//! Schema-agreement polling (§4.G step 6).

use std::time::Duration;

use uuid::Uuid;

/// Polls `fetch_versions` (local + every up peer's `schema_version`) every
/// `poll_interval` until every reported version matches or `max_wait`
/// elapses. On timeout, logs a warning and reports success anyway — "warn
/// and proceed", per §9's Open Question resolution; no strict mode.
pub async fn wait_for_schema_agreement<F, Fut>(mut fetch_versions: F, poll_interval: Duration, max_wait: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Vec<Uuid>>,
{
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        let versions = fetch_versions().await;
        if agrees(&versions) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("schema agreement wait timed out after {:?}; proceeding anyway", max_wait);
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

fn agrees(versions: &[Uuid]) -> bool {
    match versions.split_first() {
        None => true,
        Some((first, rest)) => rest.iter().all(|v| v == first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn agreement_on_first_poll_returns_immediately() {
        let v = Uuid::new_v4();
        let agreed = wait_for_schema_agreement(|| async { vec![v, v, v] }, Duration::from_millis(200), Duration::from_secs(10)).await;
        assert!(agreed);
    }

    #[tokio::test(start_paused = true)]
    async fn disagreement_converges_after_a_few_polls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let agreed = wait_for_schema_agreement(
            move || {
                let n = calls_clone.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { vec![a, b] } else { vec![a, a] } }
            },
            Duration::from_millis(10),
            Duration::from_secs(10),
        )
        .await;
        assert!(agreed);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_disagreement_times_out_and_still_reports_success() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let agreed = wait_for_schema_agreement(
            || async { vec![a, b] },
            Duration::from_millis(10),
            Duration::from_millis(50),
        )
        .await;
        assert!(agreed);
    }

    #[test]
    fn single_version_trivially_agrees() {
        assert!(agrees(&[Uuid::new_v4()]));
        assert!(agrees(&[]));
    }
}
