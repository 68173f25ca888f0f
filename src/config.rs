//! Command line and environment configuration

use std::time::Duration;

use clap::Parser;

/// Raw command line; every option can also come from the environment
#[derive(Debug, Clone, Parser)]
#[command(name = "scanwatch")]
#[command(about = "Alerts when running queries scan too many partitions", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Enable DEBUG logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print version and exit
    #[arg(short = 'V', long)]
    pub version: bool,

    /// Query engine URL (including scheme and port)
    #[arg(short = 'u', long = "url", env = "SCANWATCH_ENGINE_URL", default_value = "")]
    pub engine_url: String,

    /// Connector name for partitioned tables
    #[arg(short, long, env = "SCANWATCH_CONNECTOR", default_value = "hive")]
    pub connector: String,

    /// Alert when a query input scans more than this many partitions
    #[arg(short = 'm', long, env = "SCANWATCH_MAX_PARTITIONS", default_value_t = 30)]
    pub max_partitions: usize,

    /// Poll interval in seconds
    #[arg(short, long, env = "SCANWATCH_INTERVAL", default_value_t = 20)]
    pub interval: u64,

    /// Alert webhook URL
    #[arg(short = 's', long, env = "SCANWATCH_ALERT_URL", default_value = "")]
    pub alert_url: String,

    /// Health check HTTP bind address
    #[arg(long, env = "SCANWATCH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Health check HTTP port
    #[arg(short, long, env = "SCANWATCH_PORT", default_value_t = 8080)]
    pub port: u16,

    /// StatsD address (host:port)
    #[arg(long, env = "SCANWATCH_STATSD_ADDR", default_value = "127.0.0.1:8125")]
    pub statsd: String,

    /// Timeout in seconds for engine and webhook requests
    #[arg(long, env = "SCANWATCH_TIMEOUT", default_value_t = 10)]
    pub timeout: u64,

    /// Session user of the reporting tool whose queries carry metadata comments
    #[arg(long, env = "SCANWATCH_REPORTING_USER", default_value = "mode")]
    pub reporting_user: String,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub engine_url: String,
    pub connector: String,
    pub max_partitions: usize,
    pub poll_interval: Duration,
    pub alert_url: String,
    pub host: String,
    pub port: u16,
    pub statsd_addr: String,
    pub request_timeout: Duration,
    pub reporting_user: String,
}

impl TryFrom<Cli> for Config {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let engine_url = cli.engine_url.trim().trim_end_matches('/').to_string();
        if engine_url.is_empty() {
            return Err(ConfigError::Missing("engine URL (--url / SCANWATCH_ENGINE_URL)"));
        }

        let alert_url = cli.alert_url.trim().to_string();
        if alert_url.is_empty() {
            return Err(ConfigError::Missing("alert URL (--alert-url / SCANWATCH_ALERT_URL)"));
        }

        if cli.interval == 0 {
            return Err(ConfigError::Invalid("interval must be at least 1 second".to_string()));
        }
        if cli.timeout == 0 {
            return Err(ConfigError::Invalid("timeout must be at least 1 second".to_string()));
        }

        Ok(Self {
            engine_url,
            connector: cli.connector,
            max_partitions: cli.max_partitions,
            poll_interval: Duration::from_secs(cli.interval),
            alert_url,
            host: cli.host,
            port: cli.port,
            statsd_addr: cli.statsd,
            request_timeout: Duration::from_secs(cli.timeout),
            reporting_user: cli.reporting_user,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required option: {0}")]
    Missing(&'static str),

    #[error("Invalid option: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scanwatch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["-u", "http://engine:8080/", "-s", "http://hooks/x"]);
        let config = Config::try_from(cli).unwrap();

        assert_eq!(config.engine_url, "http://engine:8080");
        assert_eq!(config.connector, "hive");
        assert_eq!(config.max_partitions, 30);
        assert_eq!(config.poll_interval, Duration::from_secs(20));
        assert_eq!(config.port, 8080);
        assert_eq!(config.statsd_addr, "127.0.0.1:8125");
        assert_eq!(config.reporting_user, "mode");
    }

    #[test]
    fn test_missing_urls() {
        let cli = parse(&["-s", "http://hooks/x"]);
        assert!(matches!(Config::try_from(cli), Err(ConfigError::Missing(_))));

        let cli = parse(&["-u", "http://engine:8080"]);
        assert!(matches!(Config::try_from(cli), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_zero_interval() {
        let cli = parse(&["-u", "http://e", "-s", "http://h", "-i", "0"]);
        assert!(matches!(Config::try_from(cli), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_non_numeric_rejected() {
        let result = Cli::try_parse_from(["scanwatch", "-m", "lots"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_version_and_help_flags() {
        assert!(parse(&["-V"]).version);
        let err = Cli::try_parse_from(["scanwatch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
