use anyhow::Context;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use tlspol_domain::Config;
use tracing_subscriber::EnvFilter;

pub fn load_config(path: &str) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("error reading config file {:?}", path))?;
    serde_yaml::from_str(&contents).with_context(|| format!("error parsing {:?}", path))
}

pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolver address: `dns.address` from the config, or the first nameserver
/// of /etc/resolv.conf on port 53.
pub fn resolve_dns_address(config: &Config) -> anyhow::Result<SocketAddr> {
    if let Some(address) = &config.dns.address {
        return address
            .to_socket_addrs()
            .with_context(|| format!("invalid dns.address {:?}", address))?
            .next()
            .with_context(|| format!("dns.address {:?} resolved to nothing", address));
    }
    let contents = std::fs::read_to_string("/etc/resolv.conf")
        .context("dns.address unset and /etc/resolv.conf unreadable")?;
    let ip = first_nameserver(&contents)
        .context("dns.address unset and /etc/resolv.conf lists no nameserver")?;
    Ok(SocketAddr::new(ip, 53))
}

fn first_nameserver(contents: &str) -> Option<IpAddr> {
    for line in contents.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("nameserver") {
            if let Ok(ip) = rest.trim().parse() {
                return Some(ip);
            }
        }
    }
    None
}
