use crate::ports::{PolicyDecision, PolicyStore};
use crate::use_cases::ResolvePolicyUseCase;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tlspol_domain::{normalize_domain, validators, PolicyEntry, EXPIRY_JITTER_MAX, POLICY_TEMP};
use tracing::{debug, info, warn};

/// Result of one `QUERY` lookup.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Argument is an IP literal, a parent-domain pattern or not a DNS name.
    Invalid,
    /// Served from the cache; no resolution took place.
    Cached {
        policy: String,
        report: String,
        remaining: u32,
    },
    /// Freshly resolved; the caller replies first, then calls `commit`.
    Fresh {
        domain: String,
        decision: PolicyDecision,
    },
}

/// Cache-aware domain query: normalise, validate, consult the cache, fall
/// back to the combined resolvers.
pub struct QueryPolicyUseCase {
    store: Arc<dyn PolicyStore>,
    resolver: Arc<ResolvePolicyUseCase>,
}

impl QueryPolicyUseCase {
    pub fn new(store: Arc<dyn PolicyStore>, resolver: Arc<ResolvePolicyUseCase>) -> Self {
        Self { store, resolver }
    }

    pub async fn execute(&self, raw_domain: &str) -> QueryOutcome {
        let domain = normalize_domain(raw_domain);

        if domain.starts_with('.') {
            debug!(domain = %domain, "Skipping policy for parent domain");
            return QueryOutcome::Invalid;
        }
        if !validators::is_dns_name(&domain) {
            debug!(domain = %domain, "Skipping policy for non-domain");
            return QueryOutcome::Invalid;
        }

        if let Some(entry) = self.store.get(&domain).await {
            let remaining = entry.remaining_ttl(SystemTime::now());
            if remaining > 0 {
                if entry.policy.is_empty() {
                    info!(domain = %domain, remaining, "No policy found (from cache)");
                } else {
                    info!(
                        domain = %domain,
                        policy = %entry.policy,
                        remaining,
                        "Evaluated policy (from cache)"
                    );
                }
                return QueryOutcome::Cached {
                    policy: entry.policy,
                    report: entry.report,
                    remaining,
                };
            }
        }

        let decision = self.resolver.execute(&domain).await;
        if decision.is_none() {
            info!(domain = %domain, ttl = decision.ttl, "No policy found");
        } else if decision.is_temp() {
            warn!(domain = %domain, "Policy evaluation failed temporarily");
        } else {
            info!(
                domain = %domain,
                policy = %decision.policy,
                ttl = decision.ttl,
                "Evaluated policy"
            );
        }

        QueryOutcome::Fresh { domain, decision }
    }

    /// Store a fresh resolution. Transient failures (`ttl == 0`) are never
    /// cached, so the MTA's retry gets a real answer.
    pub async fn commit(&self, domain: &str, decision: &PolicyDecision) {
        if decision.ttl == 0 || decision.policy == POLICY_TEMP {
            return;
        }
        let now = SystemTime::now();
        let jitter = fastrand::u64(..EXPIRY_JITTER_MAX);
        self.store
            .set(PolicyEntry {
                domain: domain.to_string(),
                policy: decision.policy.clone(),
                report: decision.report.clone(),
                ttl: decision.ttl,
                expires_at: now + Duration::from_secs(decision.ttl as u64 + jitter),
                last_update: now,
            })
            .await;
    }
}
