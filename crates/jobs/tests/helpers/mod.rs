#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tlspol_application::ports::{PolicyRefresh, SweepOutcome};

pub struct MockPolicyRefresh {
    sweeps: AtomicU64,
}

impl MockPolicyRefresh {
    pub fn new() -> Self {
        Self {
            sweeps: AtomicU64::new(0),
        }
    }

    pub fn sweep_count(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PolicyRefresh for MockPolicyRefresh {
    async fn run_sweep(&self) -> SweepOutcome {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        SweepOutcome::default()
    }
}
