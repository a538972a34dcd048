//! DANE policy resolution (RFC 7672).
//!
//! MX enumeration demands DNSSEC all the way down: the MX RRset itself and
//! the address records of every MX target must carry the authenticated-data
//! flag. A target without signed addresses does not break DANE for the rest
//! of the hosts, but it caps the aggregate at "dane" — Postfix must not be
//! told to enforce DANE against a host whose records an attacker could
//! swap.

use super::tlsa::is_tlsa_usable;
use crate::dns::{AnswerRecord, DnsExchange, QueryType};
use async_trait::async_trait;
use std::sync::Arc;
use tlspol_application::ports::{PolicyDecision, PolicySource};
use tlspol_domain::{validators, TlspolError, RETRY_DELAY};
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub struct DaneResolver {
    dns: Arc<dyn DnsExchange>,
}

struct MxEnumeration {
    hosts: Vec<String>,
    min_ttl: u32,
    /// An MX target had to be skipped because its address records are not
    /// DNSSEC-signed. Forbids upgrading the aggregate to "dane-only".
    incomplete: bool,
}

enum HostVerdict {
    /// At least one usable TLSA record.
    DaneOnly(u32),
    /// TLSA records exist but none is usable; Postfix may still downgrade.
    Dane(u32),
    /// No TLSA records published.
    NoTlsa(u32),
    Failed,
}

impl DaneResolver {
    pub fn new(dns: Arc<dyn DnsExchange>) -> Self {
        Self { dns }
    }

    async fn enumerate_mx(&self, domain: &str) -> Result<MxEnumeration, TlspolError> {
        let reply = lookup_with_retry(&self.dns, domain, QueryType::Mx).await?;

        let mut hosts = Vec::new();
        let mut ttls = Vec::new();
        let mut incomplete = false;

        if reply.authenticated {
            let mut checks: JoinSet<(String, u32, bool)> = JoinSet::new();
            for answer in &reply.answers {
                if let AnswerRecord::Mx { exchange, ttl, .. } = answer {
                    if !validators::is_dns_name(exchange) {
                        debug!(domain = %domain, mx = %exchange, "Skipping invalid MX target");
                        continue;
                    }
                    let dns = Arc::clone(&self.dns);
                    let exchange = exchange.clone();
                    let ttl = *ttl;
                    checks.spawn(async move {
                        let signed = address_is_authenticated(&dns, &exchange).await;
                        (exchange, ttl, signed)
                    });
                }
            }
            while let Some(res) = checks.join_next().await {
                match res {
                    Ok((host, ttl, true)) => {
                        hosts.push(host);
                        ttls.push(ttl);
                    }
                    Ok((host, _, false)) => {
                        debug!(domain = %domain, mx = %host, "MX target lacks signed address records");
                        incomplete = true;
                    }
                    Err(_) => incomplete = true,
                }
            }
        }

        Ok(MxEnumeration {
            hosts,
            min_ttl: ttls.iter().copied().min().unwrap_or(0),
            incomplete,
        })
    }
}

/// Whether the target has DNSSEC-signed address records (A first, AAAA as
/// fallback). Lookup failures count as unsigned: the host is skipped rather
/// than failing the whole resolution.
async fn address_is_authenticated(dns: &Arc<dyn DnsExchange>, host: &str) -> bool {
    for qtype in [QueryType::A, QueryType::Aaaa] {
        match dns.lookup(host, qtype).await {
            Ok(reply)
                if reply.authenticated
                    && reply
                        .answers
                        .iter()
                        .any(|a| matches!(a, AnswerRecord::Addr { .. })) =>
            {
                return true;
            }
            _ => {}
        }
    }
    false
}

async fn lookup_with_retry(
    dns: &Arc<dyn DnsExchange>,
    name: &str,
    qtype: QueryType,
) -> Result<crate::dns::DnsReply, TlspolError> {
    match dns.lookup(name, qtype).await {
        Ok(reply) => Ok(reply),
        Err(TlspolError::Cancelled) => Err(TlspolError::Cancelled),
        Err(_) => {
            tokio::time::sleep(RETRY_DELAY).await;
            dns.lookup(name, qtype).await
        }
    }
}

async fn check_tlsa(dns: Arc<dyn DnsExchange>, host: String) -> HostVerdict {
    let name = format!("_25._tcp.{}", host);
    let reply = match lookup_with_retry(&dns, &name, QueryType::Tlsa).await {
        Ok(reply) => reply,
        Err(TlspolError::Cancelled) => return HostVerdict::Failed,
        Err(err) => {
            warn!(mx = %host, error = %err, "DNS error (TLSA)");
            return HostVerdict::Failed;
        }
    };
    if reply.answers.is_empty() || !reply.authenticated {
        return HostVerdict::NoTlsa(0);
    }

    let mut unusable_ttls = Vec::new();
    for answer in &reply.answers {
        if let AnswerRecord::Tlsa {
            usage,
            selector,
            matching_type,
            cert_data,
            ttl,
        } = answer
        {
            if is_tlsa_usable(*usage, *selector, *matching_type, cert_data) {
                // First usable record settles this host.
                return HostVerdict::DaneOnly(*ttl);
            }
            unusable_ttls.push(*ttl);
        }
    }
    match unusable_ttls.iter().copied().min() {
        Some(ttl) => HostVerdict::Dane(ttl),
        None => HostVerdict::NoTlsa(0),
    }
}

#[async_trait]
impl PolicySource for DaneResolver {
    async fn evaluate(&self, domain: &str) -> PolicyDecision {
        let enumeration = match self.enumerate_mx(domain).await {
            Ok(enumeration) => enumeration,
            Err(err) => {
                if !err.is_cancelled() {
                    warn!(domain = %domain, error = %err, "DNS error (MX)");
                }
                return PolicyDecision::temp();
            }
        };
        if enumeration.hosts.is_empty() {
            return PolicyDecision::none();
        }

        let mut lookups: JoinSet<HostVerdict> = JoinSet::new();
        for host in &enumeration.hosts {
            lookups.spawn(check_tlsa(Arc::clone(&self.dns), host.clone()));
        }

        let mut ttls = vec![enumeration.min_ttl];
        let mut can_dane = false;
        let mut has_error = false;
        while let Some(res) = lookups.join_next().await {
            let verdict = match res {
                Ok(verdict) => verdict,
                Err(_) => {
                    has_error = true;
                    continue;
                }
            };
            match verdict {
                HostVerdict::DaneOnly(ttl) => {
                    ttls.push(ttl);
                    if enumeration.incomplete {
                        // An unsigned MX target is in play; no enforcement.
                        can_dane = true;
                    } else {
                        lookups.abort_all();
                        return decision("dane-only", min_ttl(&ttls));
                    }
                }
                HostVerdict::Dane(ttl) => {
                    can_dane = true;
                    ttls.push(ttl);
                }
                HostVerdict::NoTlsa(ttl) => ttls.push(ttl),
                HostVerdict::Failed => has_error = true,
            }
        }

        if can_dane {
            return decision("dane", min_ttl(&ttls));
        }
        if has_error {
            return PolicyDecision::temp();
        }
        PolicyDecision {
            policy: String::new(),
            report: String::new(),
            ttl: min_ttl(&ttls),
        }
    }
}

fn decision(policy: &str, ttl: u32) -> PolicyDecision {
    PolicyDecision {
        policy: policy.to_string(),
        report: String::new(),
        ttl,
    }
}

fn min_ttl(ttls: &[u32]) -> u32 {
    ttls.iter().copied().min().unwrap_or(0)
}
