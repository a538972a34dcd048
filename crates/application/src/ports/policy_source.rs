use async_trait::async_trait;
use tlspol_domain::POLICY_TEMP;

/// Outcome of a single resolver pass for one domain.
///
/// `policy` is one of `""`, `"dane"`, `"dane-only"`, `"TEMP"` or a
/// `secure match=…` string; resolvers fold their internal errors into this
/// vocabulary and never error outward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDecision {
    pub policy: String,
    /// TLS-RPT report fragment; only MTA-STS produces one.
    pub report: String,
    pub ttl: u32,
}

impl PolicyDecision {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn temp() -> Self {
        Self {
            policy: POLICY_TEMP.to_string(),
            report: String::new(),
            ttl: 0,
        }
    }

    pub fn is_temp(&self) -> bool {
        self.policy == POLICY_TEMP
    }

    pub fn is_none(&self) -> bool {
        self.policy.is_empty()
    }
}

/// One transport-security policy mechanism (DANE or MTA-STS).
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn evaluate(&self, domain: &str) -> PolicyDecision;
}
