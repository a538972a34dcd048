use std::sync::Arc;
use tlspol_application::ports::PolicySource;
use tlspol_domain::TlspolError;
use tlspol_infrastructure::dane::DaneResolver;
use tlspol_infrastructure::dns::QueryType;

mod helpers;
use helpers::{addr, authenticated, mx, tlsa, unauthenticated, MockDnsExchange};

const SHA256_HEX: &str = "8d02536c887482bc34ff54e41d2ba659bf85b341a0a20afadb5813dcfbcf286d";

/// Script a fully signed MX host: signed A record plus the given TLSA reply.
fn host_with_tlsa(dns: &MockDnsExchange, host: &str, tlsa_records: Vec<tlspol_infrastructure::dns::AnswerRecord>) {
    dns.on(host, QueryType::A, Ok(authenticated(vec![addr(300)])));
    dns.on(
        &format!("_25._tcp.{}", host),
        QueryType::Tlsa,
        Ok(authenticated(tlsa_records)),
    );
}

fn resolver(dns: Arc<MockDnsExchange>) -> DaneResolver {
    DaneResolver::new(dns)
}

#[tokio::test]
async fn empty_mx_list_means_no_policy() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on("nomail.example", QueryType::Mx, Ok(authenticated(vec![])));
    let decision = resolver(dns).evaluate("nomail.example").await;
    assert!(decision.policy.is_empty());
}

#[tokio::test]
async fn unauthenticated_mx_response_means_no_policy() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(unauthenticated(vec![mx("mail.example.com.", 300)])),
    );
    let decision = resolver(dns.clone()).evaluate("example.com").await;
    assert!(decision.policy.is_empty());
    // No TLSA traffic for an unsigned MX RRset.
    assert_eq!(dns.call_count("_25._tcp.mail.example.com.", QueryType::Tlsa), 0);
}

#[tokio::test]
async fn single_mx_with_usable_tlsa_enforces_dane() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![mx("mail.example.com.", 300)])),
    );
    host_with_tlsa(&dns, "mail.example.com.", vec![tlsa(3, 1, 1, SHA256_HEX, 7200)]);

    let decision = resolver(dns).evaluate("example.com").await;
    assert_eq!(decision.policy, "dane-only");
    assert_eq!(decision.ttl, 300);
}

#[tokio::test]
async fn usable_tlsa_short_circuits_over_unusable_sibling() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![
            mx("mx1.example.com.", 600),
            mx("mx2.example.com.", 600),
        ])),
    );
    host_with_tlsa(&dns, "mx1.example.com.", vec![tlsa(3, 1, 1, SHA256_HEX, 900)]);
    // Only an unusable record on the second host.
    host_with_tlsa(&dns, "mx2.example.com.", vec![tlsa(0, 0, 1, SHA256_HEX, 900)]);

    let decision = resolver(dns).evaluate("example.com").await;
    assert_eq!(decision.policy, "dane-only");
}

#[tokio::test]
async fn only_unusable_records_allow_opportunistic_dane() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![mx("mail.example.com.", 450)])),
    );
    host_with_tlsa(
        &dns,
        "mail.example.com.",
        vec![tlsa(1, 1, 1, SHA256_HEX, 450), tlsa(3, 1, 1, "zz", 450)],
    );

    let decision = resolver(dns).evaluate("example.com").await;
    assert_eq!(decision.policy, "dane");
}

#[tokio::test]
async fn no_tlsa_records_means_no_policy() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![mx("mail.example.com.", 300)])),
    );
    host_with_tlsa(&dns, "mail.example.com.", vec![]);

    let decision = resolver(dns).evaluate("example.com").await;
    assert!(decision.policy.is_empty());
}

#[tokio::test]
async fn unauthenticated_tlsa_is_ignored() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![mx("mail.example.com.", 300)])),
    );
    dns.on("mail.example.com.", QueryType::A, Ok(authenticated(vec![addr(300)])));
    dns.on(
        "_25._tcp.mail.example.com.",
        QueryType::Tlsa,
        Ok(unauthenticated(vec![tlsa(3, 1, 1, SHA256_HEX, 300)])),
    );

    let decision = resolver(dns).evaluate("example.com").await;
    assert!(decision.policy.is_empty());
}

#[tokio::test]
async fn unsigned_mx_target_blocks_enforcement_but_not_dane() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![
            mx("signed.example.com.", 600),
            mx("unsigned.example.com.", 600),
        ])),
    );
    host_with_tlsa(&dns, "signed.example.com.", vec![tlsa(3, 1, 1, SHA256_HEX, 900)]);
    // Address records exist but are not DNSSEC-signed.
    dns.on(
        "unsigned.example.com.",
        QueryType::A,
        Ok(unauthenticated(vec![addr(300)])),
    );
    dns.on(
        "unsigned.example.com.",
        QueryType::Aaaa,
        Ok(unauthenticated(vec![addr(300)])),
    );

    let decision = resolver(dns.clone()).evaluate("example.com").await;
    // The usable TLSA on the signed host is demoted: an attacker-controlled
    // MX target is reachable, so enforcement would be a lie.
    assert_eq!(decision.policy, "dane");
    // The unsigned host never gets a TLSA lookup.
    assert_eq!(
        dns.call_count("_25._tcp.unsigned.example.com.", QueryType::Tlsa),
        0
    );
}

#[tokio::test]
async fn mx_failure_is_retried_then_surfaces_temp() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Err(TlspolError::Transport("connection refused".into())),
    );
    dns.on(
        "example.com",
        QueryType::Mx,
        Err(TlspolError::Transport("connection refused".into())),
    );

    let decision = resolver(dns.clone()).evaluate("example.com").await;
    assert_eq!(decision.policy, "TEMP");
    assert_eq!(decision.ttl, 0);
    assert_eq!(dns.call_count("example.com", QueryType::Mx), 2);
}

#[tokio::test]
async fn mx_failure_recovers_on_retry() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Err(TlspolError::Transport("timeout".into())),
    );
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![mx("mail.example.com.", 300)])),
    );
    host_with_tlsa(&dns, "mail.example.com.", vec![tlsa(3, 1, 1, SHA256_HEX, 600)]);

    let decision = resolver(dns).evaluate("example.com").await;
    assert_eq!(decision.policy, "dane-only");
}

#[tokio::test]
async fn persistent_tlsa_failure_surfaces_temp() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![mx("mail.example.com.", 300)])),
    );
    dns.on("mail.example.com.", QueryType::A, Ok(authenticated(vec![addr(300)])));
    dns.on(
        "_25._tcp.mail.example.com.",
        QueryType::Tlsa,
        Err(TlspolError::DnsFailure("SERVFAIL".into())),
    );
    dns.on(
        "_25._tcp.mail.example.com.",
        QueryType::Tlsa,
        Err(TlspolError::DnsFailure("SERVFAIL".into())),
    );

    let decision = resolver(dns.clone()).evaluate("example.com").await;
    assert_eq!(decision.policy, "TEMP");
    assert_eq!(
        dns.call_count("_25._tcp.mail.example.com.", QueryType::Tlsa),
        2
    );
}

#[tokio::test]
async fn tlsa_failure_on_one_host_does_not_mask_another() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![
            mx("good.example.com.", 600),
            mx("flaky.example.com.", 600),
        ])),
    );
    host_with_tlsa(
        &dns,
        "good.example.com.",
        vec![tlsa(2, 0, 2, &"c".repeat(128), 800)],
    );
    dns.on("flaky.example.com.", QueryType::A, Ok(authenticated(vec![addr(300)])));
    dns.on(
        "_25._tcp.flaky.example.com.",
        QueryType::Tlsa,
        Err(TlspolError::Transport("timeout".into())),
    );
    dns.on(
        "_25._tcp.flaky.example.com.",
        QueryType::Tlsa,
        Err(TlspolError::Transport("timeout".into())),
    );

    let decision = resolver(dns).evaluate("example.com").await;
    assert_eq!(decision.policy, "dane");
}

#[tokio::test]
async fn aaaa_signature_suffices_when_a_is_unsigned() {
    let dns = Arc::new(MockDnsExchange::new());
    dns.on(
        "example.com",
        QueryType::Mx,
        Ok(authenticated(vec![mx("v6only.example.com.", 300)])),
    );
    dns.on(
        "v6only.example.com.",
        QueryType::A,
        Ok(authenticated(vec![])),
    );
    dns.on(
        "v6only.example.com.",
        QueryType::Aaaa,
        Ok(authenticated(vec![addr(300)])),
    );
    dns.on(
        "_25._tcp.v6only.example.com.",
        QueryType::Tlsa,
        Ok(authenticated(vec![tlsa(3, 1, 1, SHA256_HEX, 600)])),
    );

    let decision = resolver(dns).evaluate("example.com").await;
    assert_eq!(decision.policy, "dane-only");
}
