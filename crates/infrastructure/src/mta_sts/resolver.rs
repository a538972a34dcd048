//! MTA-STS policy resolution (RFC 8461).
//!
//! Two stages: a TXT indicator at `_mta-sts.<domain>` and, only if present,
//! an HTTPS fetch of the policy file with redirects disabled. The indicator
//! lookup is deliberately forgiving — SERVFAIL and even a dead resolver are
//! read as "no policy published", so a DNS outage degrades to the MTA's
//! default instead of deferring all mail.

use super::policy_file::parse_policy;
use crate::dns::{AnswerRecord, DnsExchange, QueryType};
use async_trait::async_trait;
use std::sync::Arc;
use tlspol_application::ports::{PolicyDecision, PolicySource};
use tlspol_domain::{TlspolError, REQUEST_TIMEOUT, RETRY_DELAY};
use tracing::{debug, warn};

const STS_TXT_PREFIX: &str = "v=STSv1";

pub struct MtaStsResolver {
    dns: Arc<dyn DnsExchange>,
    http: reqwest::Client,
}

impl MtaStsResolver {
    pub fn new(dns: Arc<dyn DnsExchange>) -> Result<Self, TlspolError> {
        // Redirects are forbidden by RFC 8461 §3.3; a fresh handshake per
        // fetch keeps the policy host from correlating sessions.
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("postfix-tlspol/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TlspolError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { dns, http })
    }

    async fn has_sts_record(&self, domain: &str) -> Result<bool, TlspolError> {
        let name = format!("_mta-sts.{}", domain);
        let reply = match self.dns.lookup(&name, QueryType::Txt).await {
            Ok(reply) => reply,
            // A broken delegation under _mta-sts is common enough; treat it
            // like an absent indicator.
            Err(TlspolError::DnsFailure(code)) if code == "SERVFAIL" => return Ok(false),
            Err(err) => return Err(err),
        };
        Ok(reply.answers.iter().any(|answer| {
            matches!(answer, AnswerRecord::Txt { strings, .. }
                if strings.iter().any(|s| s.starts_with(STS_TXT_PREFIX)))
        }))
    }

    async fn indicator_with_retry(&self, domain: &str) -> Option<bool> {
        match self.has_sts_record(domain).await {
            Ok(found) => Some(found),
            Err(TlspolError::Cancelled) => None,
            Err(_) => {
                tokio::time::sleep(RETRY_DELAY).await;
                match self.has_sts_record(domain).await {
                    Ok(found) => Some(found),
                    Err(TlspolError::Cancelled) => None,
                    Err(err) => {
                        warn!(domain = %domain, error = %err, "DNS error during MTA-STS lookup");
                        Some(false)
                    }
                }
            }
        }
    }

    async fn fetch_policy_body(&self, url: &str) -> Result<Option<Vec<u8>>, TlspolError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TlspolError::Transport(e.to_string()))?;
        if response.status() != reqwest::StatusCode::OK {
            debug!(url = %url, status = %response.status(), "MTA-STS policy fetch rejected");
            return Ok(None);
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| TlspolError::Transport(e.to_string()))?;
        Ok(Some(body.to_vec()))
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<Option<Vec<u8>>, TlspolError> {
        match self.fetch_policy_body(url).await {
            Ok(body) => Ok(body),
            Err(_) => {
                tokio::time::sleep(RETRY_DELAY).await;
                self.fetch_policy_body(url).await
            }
        }
    }
}

#[async_trait]
impl PolicySource for MtaStsResolver {
    async fn evaluate(&self, domain: &str) -> PolicyDecision {
        match self.indicator_with_retry(domain).await {
            Some(true) => {}
            Some(false) | None => return PolicyDecision::none(),
        }

        let url = format!("https://mta-sts.{}/.well-known/mta-sts.txt", domain);
        let body = match self.fetch_with_retry(&url).await {
            Ok(Some(body)) => body,
            Ok(None) => return PolicyDecision::none(),
            Err(err) => {
                warn!(domain = %domain, error = %err, "MTA-STS policy fetch failed");
                return PolicyDecision::temp();
            }
        };

        let policy = match parse_policy(&body) {
            Ok(policy) => policy,
            Err(err) => {
                // Operator-remediable publishing mistake, not our outage.
                debug!(domain = %domain, error = %err, "Discarding malformed MTA-STS policy");
                return PolicyDecision::none();
            }
        };

        if !policy.is_enforced() {
            return PolicyDecision {
                policy: String::new(),
                report: String::new(),
                ttl: policy.max_age,
            };
        }

        PolicyDecision {
            policy: format!(
                "secure match={} servername=hostname",
                policy.mx_patterns.join(":")
            ),
            report: format!(
                "policy_type=sts policy_domain={}{}{}",
                domain, policy.mx_hosts, policy.policy_strings
            ),
            ttl: policy.max_age,
        }
    }
}
