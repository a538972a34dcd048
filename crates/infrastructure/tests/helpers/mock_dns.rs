#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tlspol_domain::TlspolError;
use tlspol_infrastructure::dns::{AnswerRecord, DnsExchange, DnsReply, QueryType};

/// Scripted DNS exchange: replies are queued per (name, qtype). The last
/// queued reply for a key is sticky, so a single `on()` answers any number
/// of lookups. Unscripted lookups get an empty unauthenticated NOERROR.
#[derive(Default)]
pub struct MockDnsExchange {
    replies: Mutex<HashMap<(String, QueryType), VecDeque<Result<DnsReply, TlspolError>>>>,
    calls: Mutex<Vec<(String, QueryType)>>,
}

impl MockDnsExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, name: &str, qtype: QueryType, reply: Result<DnsReply, TlspolError>) {
        self.replies
            .lock()
            .unwrap()
            .entry((name.to_string(), qtype))
            .or_default()
            .push_back(reply);
    }

    pub fn call_count(&self, name: &str, qtype: QueryType) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, t)| n == name && *t == qtype)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DnsExchange for MockDnsExchange {
    async fn lookup(&self, name: &str, qtype: QueryType) -> Result<DnsReply, TlspolError> {
        self.calls.lock().unwrap().push((name.to_string(), qtype));
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(&(name.to_string(), qtype)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(DnsReply::default())),
            None => Ok(DnsReply::default()),
        }
    }
}

pub fn authenticated(answers: Vec<AnswerRecord>) -> DnsReply {
    let min_ttl = answers
        .iter()
        .map(|a| match a {
            AnswerRecord::Mx { ttl, .. }
            | AnswerRecord::Addr { ttl }
            | AnswerRecord::Txt { ttl, .. }
            | AnswerRecord::Tlsa { ttl, .. } => *ttl,
        })
        .min()
        .unwrap_or(0);
    DnsReply {
        authenticated: true,
        nxdomain: false,
        answers,
        min_ttl,
    }
}

pub fn unauthenticated(answers: Vec<AnswerRecord>) -> DnsReply {
    DnsReply {
        authenticated: false,
        ..authenticated(answers)
    }
}

pub fn mx(exchange: &str, ttl: u32) -> AnswerRecord {
    AnswerRecord::Mx {
        preference: 10,
        exchange: exchange.to_string(),
        ttl,
    }
}

pub fn addr(ttl: u32) -> AnswerRecord {
    AnswerRecord::Addr { ttl }
}

pub fn txt(value: &str, ttl: u32) -> AnswerRecord {
    AnswerRecord::Txt {
        strings: vec![value.to_string()],
        ttl,
    }
}

pub fn tlsa(usage: u8, selector: u8, matching_type: u8, cert_data: &str, ttl: u32) -> AnswerRecord {
    AnswerRecord::Tlsa {
        usage,
        selector,
        matching_type,
        cert_data: cert_data.to_string(),
        ttl,
    }
}
