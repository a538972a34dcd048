use std::sync::Arc;
use std::time::Duration;
use tlspol_application::ports::PolicyRefresh;
use tlspol_domain::PREFETCH_INTERVAL;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Background prefetcher: periodically sweeps the policy cache and refreshes
/// entries that are about to expire. One sweep at a time — a tick that fires
/// while the previous sweep is still running waits for it.
pub struct PrefetchJob {
    refresh: Arc<dyn PolicyRefresh>,
    interval_secs: u64,
    shutdown: CancellationToken,
}

impl PrefetchJob {
    pub fn new(refresh: Arc<dyn PolicyRefresh>) -> Self {
        Self {
            refresh,
            interval_secs: PREFETCH_INTERVAL,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        info!(interval_secs = self.interval_secs, "Starting policy prefetcher");
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Prefetcher: shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let outcome = self.refresh.run_sweep().await;
                    if outcome.candidates > 0 || outcome.removed > 0 {
                        debug!(
                            candidates = outcome.candidates,
                            refreshed = outcome.refreshed,
                            removed = outcome.removed,
                            cache_size = outcome.cache_size,
                            "Prefetch sweep completed"
                        );
                    }
                }
            }
        }
    }
}
