use clap::Parser;
use tracing::info;

mod bootstrap;
mod client;
mod di;
mod server;

#[derive(Parser)]
#[command(name = "postfix-tlspol")]
#[command(about = "TLS transport-security policy daemon for Postfix (DANE + MTA-STS)")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Show version
    #[arg(long)]
    version: bool,

    /// Show license
    #[arg(long)]
    license: bool,

    /// Path to the config.yaml
    #[arg(short = 'c', long, value_name = "FILE", default_value = "configs/config.yaml")]
    config: String,

    /// Query a domain against the running daemon and print the JSON result
    #[arg(long, value_name = "DOMAIN")]
    query: Option<String>,

    /// Dump the running daemon's live cache entries
    #[arg(long)]
    dump: bool,

    /// Wipe the running daemon's cache
    #[arg(long)]
    purge: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("postfix-tlspol v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if cli.license {
        println!(
            "postfix-tlspol v{}\nThis program is licensed under the MIT License.",
            env!("CARGO_PKG_VERSION")
        );
        return Ok(());
    }

    let mut config = bootstrap::load_config(&cli.config)?;

    // Client modes talk to the running daemon over its listener.
    if let Some(domain) = &cli.query {
        return client::query(&config.server.address, domain).await;
    }
    if cli.dump {
        return client::dump(&config.server.address).await;
    }
    if cli.purge {
        return client::purge(&config.server.address).await;
    }

    if let Ok(value) = std::env::var("TLSPOL_PREFETCH") {
        config.server.prefetch = value == "1";
    }
    if let Ok(value) = std::env::var("TLSPOL_TLSRPT") {
        config.server.tlsrpt = value == "1";
    }

    bootstrap::init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting postfix-tlspol");

    let dns_address = bootstrap::resolve_dns_address(&config)?;
    let services = di::Services::build(&config, dns_address)?;

    server::run(&config, services).await
}
