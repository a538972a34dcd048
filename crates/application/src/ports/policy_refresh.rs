use async_trait::async_trait;

/// Counters reported by one prefetch sweep.
#[derive(Debug, Default, Clone)]
pub struct SweepOutcome {
    /// Entries close enough to expiry to be re-resolved.
    pub candidates: usize,
    /// Entries updated in place with a fresh policy.
    pub refreshed: usize,
    /// Dead entries dropped during the sweep.
    pub removed: usize,
    pub cache_size: usize,
}

/// Port driven by the background prefetch job.
#[async_trait]
pub trait PolicyRefresh: Send + Sync {
    async fn run_sweep(&self) -> SweepOutcome;
}
