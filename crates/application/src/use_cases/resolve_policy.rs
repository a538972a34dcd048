use crate::ports::{PolicyDecision, PolicySource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tlspol_domain::{CACHE_MAX_TTL, CACHE_MIN_TTL, CACHE_NOTFOUND_TTL, REQUEST_TIMEOUT};
use tokio::time::timeout;

/// Raw per-mechanism results for the `JSON` command: no cache, no TTL
/// normalisation, per-source wall time.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub dane: PolicyDecision,
    pub dane_elapsed: Duration,
    pub mta_sts: PolicyDecision,
    pub mta_sts_elapsed: Duration,
}

/// Races the DANE and MTA-STS resolvers under one shared deadline and
/// combines their results. A non-empty DANE policy wins unconditionally;
/// otherwise the MTA-STS result stands.
pub struct ResolvePolicyUseCase {
    dane: Arc<dyn PolicySource>,
    mta_sts: Arc<dyn PolicySource>,
    deadline: Duration,
}

impl ResolvePolicyUseCase {
    pub fn new(dane: Arc<dyn PolicySource>, mta_sts: Arc<dyn PolicySource>) -> Self {
        Self {
            dane,
            mta_sts,
            deadline: REQUEST_TIMEOUT * 2,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn execute(&self, domain: &str) -> PolicyDecision {
        let mut dane_task = self.spawn_dane(domain);
        let mut sts_task = self.spawn_mta_sts(domain);

        let mut dane_done = false;
        let mut sts_result = None;
        loop {
            tokio::select! {
                res = &mut dane_task, if !dane_done => {
                    let decision = res.unwrap_or_else(|_| PolicyDecision::temp());
                    if !decision.is_none() {
                        // DANE precedence; the MTA-STS lookup is moot.
                        sts_task.abort();
                        return normalize_ttl(decision);
                    }
                    dane_done = true;
                }
                res = &mut sts_task, if sts_result.is_none() => {
                    sts_result = Some(res.unwrap_or_else(|_| PolicyDecision::none()));
                }
            }
            if dane_done {
                if let Some(decision) = sts_result.take() {
                    return normalize_ttl(decision);
                }
            }
        }
    }

    /// Runs both mechanisms to completion in parallel.
    pub async fn probe(&self, domain: &str) -> ProbeOutcome {
        let dane_task = spawn_timed(
            Arc::clone(&self.dane),
            domain,
            self.deadline,
            PolicyDecision::temp,
        );
        let sts_task = spawn_timed(
            Arc::clone(&self.mta_sts),
            domain,
            self.deadline,
            PolicyDecision::none,
        );

        let (dane, mta_sts) = tokio::join!(dane_task, sts_task);
        let (dane, dane_elapsed) = dane.unwrap_or_else(|_| (PolicyDecision::temp(), Duration::ZERO));
        let (mta_sts, mta_sts_elapsed) =
            mta_sts.unwrap_or_else(|_| (PolicyDecision::none(), Duration::ZERO));

        ProbeOutcome {
            dane,
            dane_elapsed,
            mta_sts,
            mta_sts_elapsed,
        }
    }

    fn spawn_dane(&self, domain: &str) -> tokio::task::JoinHandle<PolicyDecision> {
        let source = Arc::clone(&self.dane);
        let domain = domain.to_string();
        let deadline = self.deadline;
        tokio::spawn(async move {
            timeout(deadline, source.evaluate(&domain))
                .await
                .unwrap_or_else(|_| PolicyDecision::temp())
        })
    }

    fn spawn_mta_sts(&self, domain: &str) -> tokio::task::JoinHandle<PolicyDecision> {
        let source = Arc::clone(&self.mta_sts);
        let domain = domain.to_string();
        let deadline = self.deadline;
        tokio::spawn(async move {
            timeout(deadline, source.evaluate(&domain))
                .await
                .unwrap_or_else(|_| PolicyDecision::none())
        })
    }
}

fn spawn_timed(
    source: Arc<dyn PolicySource>,
    domain: &str,
    deadline: Duration,
    on_timeout: fn() -> PolicyDecision,
) -> tokio::task::JoinHandle<(PolicyDecision, Duration)> {
    let domain = domain.to_string();
    tokio::spawn(async move {
        let started = Instant::now();
        let decision = timeout(deadline, source.evaluate(&domain))
            .await
            .unwrap_or_else(|_| on_timeout());
        (decision, started.elapsed())
    })
}

/// TTL post-processing shared by cached and prefetched resolutions.
fn normalize_ttl(mut decision: PolicyDecision) -> PolicyDecision {
    if decision.is_none() {
        decision.ttl = CACHE_NOTFOUND_TTL;
    } else if decision.is_temp() {
        decision.ttl = 0;
    } else {
        decision.ttl = decision.ttl.clamp(CACHE_MIN_TTL, CACHE_MAX_TTL);
    }
    decision
}
