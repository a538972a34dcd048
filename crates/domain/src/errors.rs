use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TlspolError {
    #[error("DNS transport error: {0}")]
    Transport(String),

    #[error("DNS error: {0}")]
    DnsFailure(String),

    #[error("Malformed policy: {0}")]
    Parse(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TlspolError {
    /// Deadline and shutdown cancellations are expected and must never be
    /// logged as failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TlspolError::Cancelled)
    }
}
