use crate::ports::{PolicyRefresh, PolicyStore, SweepOutcome};
use crate::use_cases::ResolvePolicyUseCase;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tlspol_domain::{EXPIRY_JITTER_MAX, PREFETCH_INTERVAL};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// One prefetch sweep: refresh entries whose remaining TTL dropped below the
/// sweep interval, drop entries that stopped earning their keep.
///
/// Entries are refreshed in place; `last_update` is only ever set by a real
/// MTA query, so a domain nobody asks about ages out after a day and is
/// removed once expired.
pub struct RefreshPoliciesUseCase {
    store: Arc<dyn PolicyStore>,
    resolver: Arc<ResolvePolicyUseCase>,
    semaphore: Arc<Semaphore>,
}

impl RefreshPoliciesUseCase {
    pub fn new(store: Arc<dyn PolicyStore>, resolver: Arc<ResolvePolicyUseCase>) -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            store,
            resolver,
            semaphore: Arc::new(Semaphore::new(parallelism * 4 + 2)),
        }
    }

    pub fn with_concurrency(mut self, permits: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(permits.max(1)));
        self
    }
}

#[async_trait]
impl PolicyRefresh for RefreshPoliciesUseCase {
    async fn run_sweep(&self) -> SweepOutcome {
        let now = SystemTime::now();
        let mut outcome = SweepOutcome::default();
        let mut refreshes: JoinSet<bool> = JoinSet::new();

        for entry in self.store.items().await {
            let remaining = entry.remaining_secs(now);
            let aged_dead =
                entry.is_aged_out(now) && remaining + (PREFETCH_INTERVAL as i64) <= 0;

            if entry.policy.is_empty() || entry.is_aged_out(now) {
                if aged_dead || (entry.policy.is_empty() && remaining <= 0) {
                    self.store.remove(&entry.domain).await;
                    outcome.removed += 1;
                }
                continue;
            }
            if remaining > PREFETCH_INTERVAL as i64 {
                continue;
            }

            outcome.candidates += 1;
            let store = Arc::clone(&self.store);
            let resolver = Arc::clone(&self.resolver);
            let semaphore = Arc::clone(&self.semaphore);
            refreshes.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return false;
                };
                let decision = resolver.execute(&entry.domain).await;
                if decision.is_none() || decision.is_temp() {
                    return false;
                }
                // Re-read instead of writing back the snapshot copy, so a
                // concurrent PURGE is not resurrected.
                let Some(mut current) = store.get(&entry.domain).await else {
                    return false;
                };
                debug!(
                    domain = %entry.domain,
                    policy = %decision.policy,
                    ttl = decision.ttl,
                    "Prefetched policy"
                );
                current.policy = decision.policy;
                current.report = decision.report;
                current.ttl = decision.ttl;
                current.expires_at = SystemTime::now()
                    + Duration::from_secs(decision.ttl as u64 + fastrand::u64(..EXPIRY_JITTER_MAX));
                store.set(current).await;
                true
            });
        }

        while let Some(res) = refreshes.join_next().await {
            if matches!(res, Ok(true)) {
                outcome.refreshed += 1;
            }
        }
        outcome.cache_size = self.store.len();
        outcome
    }
}
