//! HTTP server implementation.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::service::OrderService;

use super::routes::routes;

/// Time allowed for in-flight requests once shutdown begins.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Start the HTTP server with provided service.
///
/// After a shutdown signal, in-flight requests get `shutdown_timeout` to
/// finish. Connections still open at the deadline are dropped. The service's
/// background tasks are joined either way.
pub async fn serve(config: ServerConfig, service: Arc<OrderService>) -> anyhow::Result<()> {
    let shutdown_rx = service.shutdown_rx();
    let app = routes(Arc::clone(&service));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Starting orderpool server on {}", actual_addr);

    let draining = CancellationToken::new();
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let draining = draining.clone();
        async move {
            let cause = wait_for_shutdown(shutdown_rx).await;
            info!(%cause, "Shutting down, draining connections");
            draining.cancel();
        }
    });

    let result = drain_within(server.into_future(), &draining, config.shutdown_timeout).await;

    service.shutdown().await;
    info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Drive `server` to completion, giving up `deadline` after `draining` fires.
async fn drain_within<F>(
    server: F,
    draining: &CancellationToken,
    deadline: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let expired = async {
        draining.cancelled().await;
        tokio::time::sleep(deadline).await;
    };

    tokio::select! {
        result = server => result,
        _ = expired => {
            error!(?deadline, "Connections still open at shutdown deadline, dropping them");
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownCause {
    Interrupt,
    Terminate,
    Requested,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownCause::Interrupt => "SIGINT",
            ShutdownCause::Terminate => "SIGTERM",
            ShutdownCause::Requested => "requested",
        })
    }
}

/// Resolve on SIGINT, SIGTERM, or [`OrderService::trigger_shutdown`].
///
/// A signal source that cannot be installed is logged and never fires; the
/// others still work.
async fn wait_for_shutdown(shutdown_rx: watch::Receiver<bool>) -> ShutdownCause {
    tokio::select! {
        _ = interrupt() => ShutdownCause::Interrupt,
        _ = terminate() => ShutdownCause::Terminate,
        _ = requested(shutdown_rx) => ShutdownCause::Requested,
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Resolves once the flag is set. A dropped sender never resolves.
async fn requested(mut shutdown_rx: watch::Receiver<bool>) {
    let closed = shutdown_rx.wait_for(|requested| *requested).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::OrderServiceConfig;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn serve_rejects_bad_host() {
        let service = OrderService::new(OrderServiceConfig::random(2, 2).with_auto_rotate(false))
            .unwrap();
        let config = ServerConfig {
            host: "not a host".to_string(),
            ..test_config()
        };

        assert!(serve(config, service).await.is_err());
    }

    #[tokio::test]
    async fn serve_stops_on_explicit_shutdown() {
        let service = OrderService::new(OrderServiceConfig::random(2, 2)).unwrap();

        let server = tokio::spawn(serve(test_config(), Arc::clone(&service)));
        service.trigger_shutdown();

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(service.rotation_state(), crate::RotationState::Stopped);
    }

    #[tokio::test]
    async fn drain_gives_up_at_deadline() {
        let draining = CancellationToken::new();
        draining.cancel();

        let stuck = std::future::pending::<std::io::Result<()>>();
        tokio::time::timeout(
            Duration::from_secs(5),
            drain_within(stuck, &draining, Duration::from_millis(20)),
        )
        .await
        .expect("drain ignored its deadline")
        .unwrap();
    }

    #[tokio::test]
    async fn drain_deadline_starts_only_after_shutdown() {
        let draining = CancellationToken::new();

        let stuck = std::future::pending::<std::io::Result<()>>();
        let result = tokio::time::timeout(
            Duration::from_millis(100),
            drain_within(stuck, &draining, Duration::from_millis(1)),
        )
        .await;
        assert!(result.is_err(), "drain finished without a shutdown signal");
    }

    #[tokio::test]
    async fn drain_returns_server_result() {
        let draining = CancellationToken::new();

        let failed = async { Err(std::io::Error::other("accept failed")) };
        let err = drain_within(failed, &draining, DEFAULT_SHUTDOWN_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "accept failed");
    }

    #[tokio::test]
    async fn wait_for_shutdown_sees_request() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let cause = tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(rx))
            .await
            .unwrap();
        assert_eq!(cause, ShutdownCause::Requested);
    }

    #[tokio::test]
    async fn dropped_sender_is_not_a_shutdown() {
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let result = tokio::time::timeout(Duration::from_millis(50), requested(rx)).await;
        assert!(result.is_err());
    }
}
