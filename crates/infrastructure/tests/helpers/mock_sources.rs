#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tlspol_application::ports::{PolicyDecision, PolicySource};

pub struct MockPolicySource {
    decision: PolicyDecision,
    calls: AtomicU64,
}

impl MockPolicySource {
    pub fn new(policy: &str, ttl: u32) -> Self {
        Self {
            decision: PolicyDecision {
                policy: policy.to_string(),
                report: String::new(),
                ttl,
            },
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_report(mut self, report: &str) -> Self {
        self.decision.report = report.to_string();
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PolicySource for MockPolicySource {
    async fn evaluate(&self, _domain: &str) -> PolicyDecision {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.decision.clone()
    }
}
