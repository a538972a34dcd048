use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dns: DnsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Listener spec: `unix:<path>` or a TCP `host:port`.
    #[serde(default = "default_address")]
    pub address: String,
    /// Path for the persisted cache snapshot. Unset disables persistence.
    #[serde(default)]
    pub cache_file: Option<String>,
    /// Octal file mode applied to a UNIX-domain listener socket.
    #[serde(default)]
    pub socket_permissions: Option<String>,
    /// Append the TLS-RPT report fragment to every policy reply.
    #[serde(default)]
    pub tlsrpt: bool,
    #[serde(default = "default_true")]
    pub prefetch: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DnsConfig {
    /// Resolver `host:port`. Unset falls back to the first nameserver in
    /// /etc/resolv.conf on port 53.
    #[serde(default)]
    pub address: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            cache_file: None,
            socket_permissions: None,
            tlsrpt: false,
            prefetch: true,
            log_level: default_log_level(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8642".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
