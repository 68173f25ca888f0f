//! scanwatch daemon
//!
//! Run with: cargo run -- --url http://engine:8080 --alert-url https://hooks.slack.com/...
//!
//! Every option can also be set through the environment:
//! - SCANWATCH_ENGINE_URL: Query engine base URL (required)
//! - SCANWATCH_ALERT_URL: Alert webhook URL (required)
//! - SCANWATCH_CONNECTOR: Connector whose inputs are checked (default: hive)
//! - SCANWATCH_MAX_PARTITIONS: Partition threshold per input (default: 30)
//! - SCANWATCH_INTERVAL: Poll interval in seconds (default: 20)
//! - SCANWATCH_HOST / SCANWATCH_PORT: Health endpoint bind (default: 0.0.0.0:8080)
//! - SCANWATCH_STATSD_ADDR: StatsD address (default: 127.0.0.1:8125)
//! - SCANWATCH_TIMEOUT: Outbound request timeout in seconds (default: 10)
//! - SCANWATCH_REPORTING_USER: Reporting tool session user (default: mode)
//! - RUST_LOG: Log filter (default: scanwatch=info)

use clap::error::ErrorKind;
use clap::Parser;
use scanwatch::api::run_server;
use scanwatch::config::{Cli, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_ARGUMENT_ERROR: i32 = 1;
const EXIT_VERSION: i32 = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            let _ = e.print();
            std::process::exit(0);
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(EXIT_ARGUMENT_ERROR);
        }
    };

    if cli.version {
        println!(
            "{} {} at your service.",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        std::process::exit(EXIT_VERSION);
    }

    // Initialize logging
    let default_filter = if cli.verbose {
        "scanwatch=debug,tower_http=debug"
    } else {
        "scanwatch=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("Command line options: {:?}", cli);

    let config = Config::try_from(cli).inspect_err(|e| {
        tracing::error!("{}. Try again with --help", e);
    })?;

    let hostname = hostname::get()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string());
    tracing::info!(
        "Starting {} version {} on host {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        hostname
    );
    tracing::info!("  Engine: {}", config.engine_url);
    tracing::info!("  Connector: {}", config.connector);
    tracing::info!("  Max partitions: {}", config.max_partitions);
    tracing::info!("  Poll interval: {} seconds", config.poll_interval.as_secs());
    tracing::info!("  Request timeout: {} seconds", config.request_timeout.as_secs());

    run_server(config).await
}
