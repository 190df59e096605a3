mod render;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use coinfolio_core::models::holding::HoldingConfig;
use coinfolio_core::models::settings::{QuoteEndpoint, Settings};
use coinfolio_core::services::refresh_service::RefreshScheduler;
use coinfolio_core::PortfolioDashboard;

#[derive(Parser)]
#[command(name = "coinfolio")]
#[command(about = "Crypto portfolio dashboard in the terminal", long_about = None)]
struct Cli {
    /// JSON file with the holdings to track (defaults to 0.5 BTC, 5 ETH, 1000 ADA)
    #[arg(long, global = true)]
    holdings: Option<PathBuf>,

    /// Feed base URL, or the URL of a coinfolio proxy
    #[arg(long, global = true)]
    feed_url: Option<String>,

    /// Paid-tier API key
    #[arg(long, global = true, hide_env_values = true, env = "COINGECKO_API_KEY")]
    api_key: Option<String>,

    /// Seconds between automatic refreshes
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Feed endpoint used for quotes
    #[arg(long, global = true, value_enum)]
    endpoint: Option<EndpointArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EndpointArg {
    Markets,
    SimplePrice,
}

impl From<EndpointArg> for QuoteEndpoint {
    fn from(arg: EndpointArg) -> Self {
        match arg {
            EndpointArg::Markets => QuoteEndpoint::Markets,
            EndpointArg::SimplePrice => QuoteEndpoint::SimplePrice,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the dashboard live: Enter refreshes, `/term` filters the market list, `q` quits
    Watch,
    /// Run one refresh cycle and print the view model as JSON
    Snapshot,
    /// Print the sample dashboard used while the feed is down, as JSON
    Fallback,
}

fn build_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::from_env()?;
    if let Some(url) = &cli.feed_url {
        settings.feed_base_url = url.clone();
    }
    if let Some(key) = &cli.api_key {
        settings.api_key = Some(key.clone());
    }
    if let Some(secs) = cli.interval {
        settings.refresh_interval_secs = secs;
    }
    if let Some(endpoint) = cli.endpoint {
        settings.quote_endpoint = endpoint.into();
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = build_settings(&cli)?;
    let holdings = match &cli.holdings {
        Some(path) => HoldingConfig::from_file(path)?,
        None => HoldingConfig::default(),
    };
    let mut dashboard = PortfolioDashboard::with_coingecko(settings, holdings)?;

    match cli.command {
        Commands::Watch => watch(dashboard).await,
        Commands::Snapshot => {
            let data = match dashboard.refresh().await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(error = %e, "Feed unavailable, printing sample data");
                    dashboard.fallback()
                }
            };
            println!("{}", serde_json::to_string_pretty(&data.view)?);
            Ok(())
        }
        Commands::Fallback => {
            println!("{}", serde_json::to_string_pretty(&dashboard.fallback().view)?);
            Ok(())
        }
    }
}

async fn watch(dashboard: PortfolioDashboard) -> Result<(), Box<dyn std::error::Error>> {
    let (scheduler, mut handle) = RefreshScheduler::new(dashboard);
    let task = tokio::spawn(scheduler.run());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut filter = String::new();

    loop {
        let input = tokio::select! {
            status = handle.changed() => match status {
                Some(status) => {
                    print!("{}", render::render_status(&status, &filter));
                    continue;
                }
                None => break,
            },
            line = lines.next_line() => line?,
        };

        match input {
            Some(line) if line.trim() == "q" => break,
            Some(line) if line.starts_with('/') => {
                filter = line[1..].trim().to_string();
                print!("{}", render::render_status(&handle.status(), &filter));
            }
            Some(_) => {
                if !handle.refresh() {
                    break;
                }
            }
            None => break,
        }
    }

    // Dropping the last handle closes the trigger channel and stops the scheduler.
    drop(handle);
    task.await?;
    Ok(())
}
