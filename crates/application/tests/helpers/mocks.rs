#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tlspol_application::ports::{PolicyDecision, PolicySource, PolicyStore};
use tlspol_domain::{PolicyEntry, TlspolError};

pub struct MockPolicySource {
    decision: RwLock<PolicyDecision>,
    delay: RwLock<Duration>,
    calls: AtomicU64,
}

impl MockPolicySource {
    pub fn new(policy: &str, ttl: u32) -> Self {
        Self {
            decision: RwLock::new(PolicyDecision {
                policy: policy.to_string(),
                report: String::new(),
                ttl,
            }),
            delay: RwLock::new(Duration::ZERO),
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_report(self, report: &str) -> Self {
        self.decision.write().unwrap().report = report.to_string();
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write().unwrap() = delay;
        self
    }

    pub fn set_decision(&self, policy: &str, ttl: u32) {
        let mut decision = self.decision.write().unwrap();
        decision.policy = policy.to_string();
        decision.ttl = ttl;
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PolicySource for MockPolicySource {
    async fn evaluate(&self, _domain: &str) -> PolicyDecision {
        let delay = *self.delay.read().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.decision.read().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MockPolicyStore {
    entries: RwLock<HashMap<String, PolicyEntry>>,
    set_calls: AtomicU64,
}

impl MockPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: PolicyEntry) {
        self.entries
            .write()
            .unwrap()
            .insert(entry.domain.clone(), entry);
    }

    pub fn set_call_count(&self) -> u64 {
        self.set_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PolicyStore for MockPolicyStore {
    async fn get(&self, domain: &str) -> Option<PolicyEntry> {
        self.entries.read().unwrap().get(domain).cloned()
    }

    async fn set(&self, entry: PolicyEntry) {
        self.set_calls.fetch_add(1, Ordering::Relaxed);
        self.entries
            .write()
            .unwrap()
            .insert(entry.domain.clone(), entry);
    }

    async fn remove(&self, domain: &str) {
        self.entries.write().unwrap().remove(domain);
    }

    async fn purge(&self) {
        self.entries.write().unwrap().clear();
    }

    async fn items(&self) -> Vec<PolicyEntry> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    async fn save(&self) -> Result<(), TlspolError> {
        Ok(())
    }

    async fn tidy(&self) {}

    async fn close(&self) {}
}
