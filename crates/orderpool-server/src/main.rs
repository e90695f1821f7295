//! orderpool-server: HTTP front end for the order service.

mod config;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use orderpool::{OrderService, VersionInfo, transport::serve};

use crate::config::{AppConfig, CliArgs};

/// Initialize tracing with ORDERPOOL_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let base_level = match std::env::var("ORDERPOOL_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("trace") => "trace",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };

        EnvFilter::new(format!(
            "orderpool={level},orderpool_server={level}",
            level = base_level
        ))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::try_from(CliArgs::parse())?;

    info!("orderpool-server {}", env!("CARGO_PKG_VERSION"));
    info!(
        pool_size = config.service.pool_size,
        auto_rotate = config.service.auto_rotate,
        rotation_interval = ?config.service.rotation_interval,
        shutdown_timeout = ?config.server.shutdown_timeout,
        "Configured order service"
    );

    let service_config = config
        .service
        .with_version(VersionInfo::new().with_server(env!("CARGO_PKG_VERSION")));
    let service = OrderService::new(service_config)?;

    serve(config.server, service).await
}
