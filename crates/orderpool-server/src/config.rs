//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;
use orderpool::OrderServiceConfig;
use orderpool::transport::{DEFAULT_SHUTDOWN_TIMEOUT, ServerConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "orderpool-server", version, about = "Serve a rotating pool of orders over HTTP")]
pub struct CliArgs {
    /// Address to bind.
    #[arg(long, env = "ORDERPOOL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "ORDERPOOL_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Number of orders held in the pool.
    #[arg(long, env = "ORDERPOOL_POOL_SIZE", default_value_t = 50)]
    pub pool_size: usize,

    /// Milliseconds between slot rotations.
    #[arg(long, env = "ORDERPOOL_ROTATION_INTERVAL_MS", default_value_t = 200)]
    pub rotation_interval_ms: u64,

    /// Length of generated order codes.
    #[arg(long, env = "ORDERPOOL_CODE_LENGTH", default_value_t = 2)]
    pub code_length: usize,

    /// Capacity of the view event queue.
    #[arg(long, env = "ORDERPOOL_STATS_QUEUE", default_value_t = 1024)]
    pub stats_queue: usize,

    /// Seconds to let in-flight requests finish after a shutdown signal.
    #[arg(
        long,
        env = "ORDERPOOL_SHUTDOWN_TIMEOUT_SECS",
        default_value_t = DEFAULT_SHUTDOWN_TIMEOUT.as_secs()
    )]
    pub shutdown_timeout_secs: u64,

    /// Keep the pool fixed instead of rotating it.
    #[arg(long)]
    pub no_rotate: bool,
}

/// Validated configuration for the server process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub service: OrderServiceConfig,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        anyhow::ensure!(args.pool_size > 0, "--pool-size must be greater than 0");
        anyhow::ensure!(args.code_length > 0, "--code-length must be greater than 0");
        anyhow::ensure!(
            args.no_rotate || args.rotation_interval_ms > 0,
            "--rotation-interval-ms must be greater than 0"
        );
        anyhow::ensure!(args.stats_queue > 0, "--stats-queue must be greater than 0");

        let service = OrderServiceConfig::random(args.pool_size, args.code_length)
            .with_auto_rotate(!args.no_rotate)
            .with_rotation_interval(Duration::from_millis(args.rotation_interval_ms))
            .with_stats_queue_capacity(args.stats_queue);

        Ok(Self {
            server: ServerConfig {
                host: args.host,
                port: args.port,
                shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            },
            service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("orderpool-server").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn cli_defaults() {
        let config = AppConfig::try_from(parse(&[])).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.service.pool_size, 50);
        assert!(config.service.auto_rotate);
        assert_eq!(config.service.rotation_interval, Duration::from_millis(200));
        assert_eq!(config.service.stats_queue_capacity, 1024);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn cli_overrides() {
        let args = parse(&[
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--pool-size",
            "3",
            "--rotation-interval-ms",
            "50",
            "--shutdown-timeout-secs",
            "3",
            "--no-rotate",
        ]);
        let config = AppConfig::try_from(args).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.service.pool_size, 3);
        assert!(!config.service.auto_rotate);
        assert_eq!(config.service.rotation_interval, Duration::from_millis(50));
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn cli_rejects_zero_pool() {
        let err = AppConfig::try_from(parse(&["--pool-size", "0"])).unwrap_err();
        assert!(err.to_string().contains("pool-size"));
    }

    #[test]
    fn cli_rejects_zero_interval_only_when_rotating() {
        assert!(AppConfig::try_from(parse(&["--rotation-interval-ms", "0"])).is_err());
        assert!(
            AppConfig::try_from(parse(&["--rotation-interval-ms", "0", "--no-rotate"])).is_ok()
        );
    }

    #[test]
    fn cli_rejects_unknown_flag() {
        let result = CliArgs::try_parse_from(["orderpool-server", "--definitely-not-a-flag"]);
        assert!(result.is_err());
    }
}
