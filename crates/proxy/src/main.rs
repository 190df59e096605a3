use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use coinfolio_core::models::settings::{API_KEY_ENV, DEFAULT_FEED_URL};
use coinfolio_proxy::{display_upstream, router, ProxyConfig};

#[derive(Parser)]
#[command(name = "coinfolio-proxy")]
#[command(about = "Forward dashboard requests to the CoinGecko API with open CORS", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "COINFOLIO_LISTEN", default_value = "127.0.0.1:8787")]
    listen: SocketAddr,

    /// Upstream API root
    #[arg(long, env = "COINFOLIO_UPSTREAM", default_value = DEFAULT_FEED_URL)]
    upstream: String,

    /// Path prefix stripped before forwarding
    #[arg(long, default_value = "/api")]
    prefix: String,

    /// Paid-tier API key appended to every upstream request
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = ProxyConfig {
        upstream_base: args.upstream,
        path_prefix: args.prefix,
        api_key: args.api_key,
        timeout: Duration::from_secs(args.timeout_secs),
    };

    tracing::info!(
        listen = %args.listen,
        upstream = %display_upstream(&config),
        prefix = %config.path_prefix,
        api_key = config.api_key.is_some(),
        "Starting coinfolio proxy"
    );

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, router(config)).await?;
    Ok(())
}
