//! Client-mode commands: talk to the running daemon over its listener.

use anyhow::Context;
use std::io::IsTerminal;
use tlspol_domain::validators;
use tlspol_infrastructure::socketmap::netstring;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};

type Connection = Box<dyn Stream>;

trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

async fn connect(address: &str) -> anyhow::Result<Connection> {
    let stream: Connection = if let Some(path) = address.strip_prefix("unix:") {
        Box::new(
            UnixStream::connect(path)
                .await
                .context("could not connect to socketmap instance; is postfix-tlspol running?")?,
        )
    } else {
        Box::new(
            TcpStream::connect(address)
                .await
                .context("could not connect to socketmap instance; is postfix-tlspol running?")?,
        )
    };
    Ok(stream)
}

pub async fn query(address: &str, domain: &str) -> anyhow::Result<()> {
    if !validators::is_dns_name(domain) {
        anyhow::bail!("invalid domain: {:?}", domain);
    }
    let mut stream = connect(address).await?;
    stream
        .write_all(&netstring::encode(format!("JSON {}", domain).as_bytes()))
        .await?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .with_context(|| format!("could not query domain {:?}", domain))?;

    let value: serde_json::Value =
        serde_json::from_str(&line).with_context(|| format!("bad reply for {:?}", domain))?;
    if std::io::stdout().is_terminal() {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", line.trim_end());
    }
    Ok(())
}

pub async fn dump(address: &str) -> anyhow::Result<()> {
    stream_command(address, b"DUMP").await
}

pub async fn purge(address: &str) -> anyhow::Result<()> {
    stream_command(address, b"PURGE").await
}

async fn stream_command(address: &str, command: &[u8]) -> anyhow::Result<()> {
    let mut stream = connect(address).await?;
    stream.write_all(&netstring::encode(command)).await?;
    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut stream, &mut stdout).await?;
    Ok(())
}
