//! DNSSEC-aware stub resolver client.
//!
//! Sends EDNS(0) queries with the DO bit over UDP and reduces responses to
//! the few record shapes the policy resolvers care about. NOERROR and
//! NXDOMAIN are answerable outcomes; every other RCODE surfaces as
//! `DnsFailure` with its name so callers can decide what to tolerate.

use super::message_builder::MessageBuilder;
use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{RData, RecordType};
use std::net::SocketAddr;
use std::time::Duration;
use tlspol_domain::{TlspolError, REQUEST_TIMEOUT};
use tokio::net::UdpSocket;
use tracing::debug;

/// Maximum UDP response size with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// RCODE name carried inside `DnsFailure`. The MTA-STS indicator lookup
/// matches on `SERVFAIL`, so the mnemonics must stay stable.
pub fn rcode_name(rcode: ResponseCode) -> &'static str {
    match rcode {
        ResponseCode::FormErr => "FORMERR",
        ResponseCode::ServFail => "SERVFAIL",
        ResponseCode::NotImp => "NOTIMP",
        ResponseCode::Refused => "REFUSED",
        ResponseCode::YXDomain => "YXDOMAIN",
        ResponseCode::YXRRSet => "YXRRSET",
        ResponseCode::NXRRSet => "NXRRSET",
        ResponseCode::NotAuth => "NOTAUTH",
        ResponseCode::NotZone => "NOTZONE",
        ResponseCode::BADVERS => "BADVERS",
        _ => "UNKNOWN",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Mx,
    A,
    Aaaa,
    Txt,
    Tlsa,
}

impl QueryType {
    fn to_hickory(self) -> RecordType {
        match self {
            QueryType::Mx => RecordType::MX,
            QueryType::A => RecordType::A,
            QueryType::Aaaa => RecordType::AAAA,
            QueryType::Txt => RecordType::TXT,
            QueryType::Tlsa => RecordType::TLSA,
        }
    }
}

/// Answer records reduced to resolver-shaped data.
#[derive(Debug, Clone)]
pub enum AnswerRecord {
    Mx {
        preference: u16,
        exchange: String,
        ttl: u32,
    },
    Addr {
        ttl: u32,
    },
    Txt {
        strings: Vec<String>,
        ttl: u32,
    },
    Tlsa {
        usage: u8,
        selector: u8,
        matching_type: u8,
        /// Certificate association data, hex-encoded.
        cert_data: String,
        ttl: u32,
    },
}

/// One parsed, answerable DNS response.
#[derive(Debug, Clone, Default)]
pub struct DnsReply {
    /// DNSSEC authenticated-data flag: the resolver validated the chain.
    pub authenticated: bool,
    pub nxdomain: bool,
    pub answers: Vec<AnswerRecord>,
    /// Minimum TTL over the answer set, 0 when empty.
    pub min_ttl: u32,
}

/// Seam between the resolvers and the wire, mockable in tests.
#[async_trait]
pub trait DnsExchange: Send + Sync {
    async fn lookup(&self, name: &str, qtype: QueryType) -> Result<DnsReply, TlspolError>;
}

pub struct UdpDnsClient {
    server_addr: SocketAddr,
    timeout: Duration,
}

impl UdpDnsClient {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(&self, id: u16, request: &[u8]) -> Result<Message, TlspolError> {
        let bind_addr: SocketAddr = if self.server_addr.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| TlspolError::Transport(format!("failed to bind UDP socket: {}", e)))?;
        socket.connect(self.server_addr).await.map_err(|e| {
            TlspolError::Transport(format!("failed to connect to {}: {}", self.server_addr, e))
        })?;
        socket
            .send(request)
            .await
            .map_err(|e| TlspolError::Transport(format!("failed to send query: {}", e)))?;

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        tokio::time::timeout(self.timeout, async {
            loop {
                let n = socket.recv(&mut recv_buf).await.map_err(|e| {
                    TlspolError::Transport(format!(
                        "failed to receive response from {}: {}",
                        self.server_addr, e
                    ))
                })?;
                let message = match Message::from_vec(&recv_buf[..n]) {
                    Ok(m) => m,
                    Err(e) => {
                        debug!(error = %e, "Discarding unparseable DNS response");
                        continue;
                    }
                };
                if message.id() != id {
                    debug!(
                        expected = id,
                        received = message.id(),
                        "Discarding DNS response with mismatched id"
                    );
                    continue;
                }
                return Ok(message);
            }
        })
        .await
        .map_err(|_| {
            TlspolError::Transport(format!("timeout waiting for {}", self.server_addr))
        })?
    }
}

#[async_trait]
impl DnsExchange for UdpDnsClient {
    async fn lookup(&self, name: &str, qtype: QueryType) -> Result<DnsReply, TlspolError> {
        let (id, request) = MessageBuilder::build_query(name, qtype.to_hickory())?;
        let message = self.exchange(id, &request).await?;

        let rcode = message.response_code();
        if rcode != ResponseCode::NoError && rcode != ResponseCode::NXDomain {
            return Err(TlspolError::DnsFailure(rcode_name(rcode).to_string()));
        }

        let mut answers = Vec::new();
        let mut min_ttl: Option<u32> = None;
        for record in message.answers() {
            let ttl = record.ttl();
            min_ttl = Some(min_ttl.map_or(ttl, |current| current.min(ttl)));
            match record.data() {
                RData::MX(mx) => answers.push(AnswerRecord::Mx {
                    preference: mx.preference(),
                    exchange: mx.exchange().to_utf8(),
                    ttl,
                }),
                RData::A(_) | RData::AAAA(_) => answers.push(AnswerRecord::Addr { ttl }),
                RData::TXT(txt) => answers.push(AnswerRecord::Txt {
                    strings: txt
                        .txt_data()
                        .iter()
                        .map(|s| String::from_utf8_lossy(s).into_owned())
                        .collect(),
                    ttl,
                }),
                RData::TLSA(tlsa) => answers.push(AnswerRecord::Tlsa {
                    usage: tlsa.cert_usage().into(),
                    selector: tlsa.selector().into(),
                    matching_type: tlsa.matching().into(),
                    cert_data: hex::encode(tlsa.cert_data()),
                    ttl,
                }),
                _ => {}
            }
        }

        Ok(DnsReply {
            authenticated: message.authentic_data(),
            nxdomain: rcode == ResponseCode::NXDomain,
            answers,
            min_ttl: min_ttl.unwrap_or(0),
        })
    }
}
