//! Socket-map request handling.
//!
//! One connection, one loop: netstring-framed requests are dispatched in
//! order until EOF. `QUERY`/`QUERYwithTLSRPT`/`JSON` keep the connection
//! open; `DUMP`, `PURGE`, unknown commands and framing errors end it.

use super::netstring;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tlspol_application::ports::PolicyStore;
use tlspol_application::use_cases::{QueryOutcome, QueryPolicyUseCase, ResolvePolicyUseCase};
use tlspol_domain::{normalize_domain, POLICY_TEMP};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, WriteHalf};
use tracing::{debug, warn};

enum Flow {
    Continue,
    Close,
}

pub struct SocketmapHandler {
    query: Arc<QueryPolicyUseCase>,
    resolver: Arc<ResolvePolicyUseCase>,
    store: Arc<dyn PolicyStore>,
    /// Append the report fragment to plain QUERY replies as well.
    tlsrpt: bool,
}

#[derive(Serialize)]
struct DaneJson {
    policy: String,
    ttl: u32,
    time: String,
}

#[derive(Serialize)]
struct MtaStsJson {
    policy: String,
    ttl: u32,
    report: String,
    time: String,
}

#[derive(Serialize)]
struct ProbeJson {
    version: &'static str,
    domain: String,
    dane: DaneJson,
    #[serde(rename = "mta-sts")]
    mta_sts: MtaStsJson,
}

impl SocketmapHandler {
    pub fn new(
        query: Arc<QueryPolicyUseCase>,
        resolver: Arc<ResolvePolicyUseCase>,
        store: Arc<dyn PolicyStore>,
        tlsrpt: bool,
    ) -> Self {
        Self {
            query,
            resolver,
            store,
            tlsrpt,
        }
    }

    pub async fn handle_connection<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        loop {
            let frame = match netstring::read_frame(&mut reader).await {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(err) => {
                    debug!(error = %err, "Terminating connection on framing error");
                    let _ = write_half.write_all(&netstring::encode(b"PERM ")).await;
                    return;
                }
            };
            let request = String::from_utf8_lossy(&frame).into_owned();
            match self.dispatch(request.trim(), &mut write_half).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) | Err(_) => return,
            }
        }
    }

    async fn dispatch<S>(
        &self,
        request: &str,
        writer: &mut WriteHalf<S>,
    ) -> std::io::Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let (command, arg) = match request.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (request, ""),
        };

        match command.to_ascii_lowercase().as_str() {
            "query" if !arg.is_empty() => self.reply_policy(arg, self.tlsrpt, writer).await,
            "querywithtlsrpt" if !arg.is_empty() => self.reply_policy(arg, true, writer).await,
            "json" if !arg.is_empty() => self.reply_json(arg, writer).await,
            "dump" if arg.is_empty() => self.reply_dump(writer).await,
            "purge" if arg.is_empty() => {
                self.store.purge().await;
                writer.write_all(b"OK\n").await?;
                Ok(Flow::Close)
            }
            _ => {
                warn!(request = %request, "Malformed or unknown socketmap request");
                writer.write_all(&netstring::encode(b"PERM ")).await?;
                Ok(Flow::Close)
            }
        }
    }

    async fn reply_policy<S>(
        &self,
        raw_domain: &str,
        with_report: bool,
        writer: &mut WriteHalf<S>,
    ) -> std::io::Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        match self.query.execute(raw_domain).await {
            QueryOutcome::Invalid => {
                writer.write_all(&netstring::encode(b"NOTFOUND ")).await?;
            }
            QueryOutcome::Cached { policy, report, .. } => {
                write_policy_reply(writer, &policy, &report, with_report).await?;
            }
            QueryOutcome::Fresh { domain, decision } => {
                write_policy_reply(writer, &decision.policy, &decision.report, with_report)
                    .await?;
                // Reply first, then pay for the cache write.
                self.query.commit(&domain, &decision).await;
            }
        }
        Ok(Flow::Continue)
    }

    async fn reply_json<S>(
        &self,
        raw_domain: &str,
        writer: &mut WriteHalf<S>,
    ) -> std::io::Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let domain = normalize_domain(raw_domain);
        let outcome = self.resolver.probe(&domain).await;
        let reply = ProbeJson {
            version: env!("CARGO_PKG_VERSION"),
            domain,
            dane: DaneJson {
                policy: outcome.dane.policy,
                ttl: outcome.dane.ttl,
                time: format_elapsed(outcome.dane_elapsed),
            },
            mta_sts: MtaStsJson {
                policy: outcome.mta_sts.policy,
                ttl: outcome.mta_sts.ttl,
                report: outcome.mta_sts.report,
                time: format_elapsed(outcome.mta_sts_elapsed),
            },
        };
        let mut body = serde_json::to_vec(&reply).unwrap_or_else(|_| b"{}".to_vec());
        body.push(b'\n');
        writer.write_all(&body).await?;
        Ok(Flow::Continue)
    }

    async fn reply_dump<S>(&self, writer: &mut WriteHalf<S>) -> std::io::Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let now = SystemTime::now();
        let mut out = String::new();
        for entry in self.store.items().await {
            if !entry.policy.is_empty() && !entry.is_expired(now) {
                out.push_str(&entry.domain);
                out.push(' ');
                out.push_str(&entry.policy);
                out.push('\n');
            }
        }
        writer.write_all(out.as_bytes()).await?;
        Ok(Flow::Close)
    }
}

async fn write_policy_reply<S>(
    writer: &mut WriteHalf<S>,
    policy: &str,
    report: &str,
    with_report: bool,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let payload = if policy.is_empty() {
        "NOTFOUND ".to_string()
    } else if policy == POLICY_TEMP {
        "TEMP ".to_string()
    } else if with_report && !report.is_empty() {
        format!("OK {} {}", policy, report)
    } else {
        format!("OK {}", policy)
    };
    writer.write_all(&netstring::encode(payload.as_bytes())).await
}

fn format_elapsed(elapsed: Duration) -> String {
    format!("{}ms", elapsed.as_millis())
}
