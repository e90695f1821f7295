//! OrderService: transport-agnostic order dispatch.
//!
//! This service owns:
//! - The order pool (shared reads, single rotating writer)
//! - The stats ledger and the recorder that feeds it
//! - The rotation task and its stop signal
//! - Shutdown coordination for transports
//!
//! The pool and the ledger sit behind independent locks, so recording a view
//! never waits on a pool read or a rotation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::order::{Order, OrderFactory, OrderStats};
use crate::pool::{OrderPool, PoolError};
use crate::rotation::{Rotation, RotationState};
use crate::stats::{RecorderError, StatsLedger, StatsRecorder};
use crate::strategy::random_order_factory;
use crate::version::VersionInfo;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("rotation interval must be greater than 0")]
    ZeroRotationInterval,
    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

/// Construction-time configuration for [`OrderService`].
#[derive(Clone)]
pub struct OrderServiceConfig {
    /// Number of orders held. Must be greater than 0.
    pub pool_size: usize,
    /// Start the rotation task on construction.
    pub auto_rotate: bool,
    pub rotation_interval: Duration,
    /// Capacity of the view event queue. Must be greater than 0.
    pub stats_queue_capacity: usize,
    pub new_order: OrderFactory,
    /// External stop signal. Cancelling it stops rotation.
    pub shutdown: CancellationToken,
    pub version: VersionInfo,
}

impl OrderServiceConfig {
    pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_millis(200);
    pub const DEFAULT_STATS_QUEUE_CAPACITY: usize = 1024;

    pub fn new(pool_size: usize, new_order: OrderFactory) -> Self {
        Self {
            pool_size,
            auto_rotate: true,
            rotation_interval: Self::DEFAULT_ROTATION_INTERVAL,
            stats_queue_capacity: Self::DEFAULT_STATS_QUEUE_CAPACITY,
            new_order,
            shutdown: CancellationToken::new(),
            version: VersionInfo::new(),
        }
    }

    /// Auto-rotating pool of random lowercase codes.
    pub fn random(pool_size: usize, code_length: usize) -> Self {
        Self::new(pool_size, random_order_factory(code_length))
    }

    pub fn with_auto_rotate(mut self, auto_rotate: bool) -> Self {
        self.auto_rotate = auto_rotate;
        self
    }

    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    pub fn with_stats_queue_capacity(mut self, capacity: usize) -> Self {
        self.stats_queue_capacity = capacity;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_version(mut self, version: VersionInfo) -> Self {
        self.version = version;
        self
    }
}

impl fmt::Debug for OrderServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderServiceConfig")
            .field("pool_size", &self.pool_size)
            .field("auto_rotate", &self.auto_rotate)
            .field("rotation_interval", &self.rotation_interval)
            .field("stats_queue_capacity", &self.stats_queue_capacity)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Snapshot of service health for transports to query.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub pool_size: usize,
    pub tracked_codes: usize,
    pub pending_views: usize,
    pub rotation: RotationState,
    pub shutting_down: bool,
    pub version: VersionInfo,
}

pub struct OrderService {
    pool: Arc<OrderPool>,
    recorder: StatsRecorder,
    rotation: Rotation,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    version: VersionInfo,
}

impl OrderService {
    /// Build the pool and start background tasks. Must be called inside a
    /// tokio runtime.
    ///
    /// Fails before anything is spawned if the configuration is invalid.
    pub fn new(config: OrderServiceConfig) -> Result<Arc<Self>, ServiceError> {
        if config.pool_size == 0 {
            return Err(PoolError::Empty.into());
        }
        if config.auto_rotate && config.rotation_interval.is_zero() {
            return Err(ServiceError::ZeroRotationInterval);
        }
        if config.stats_queue_capacity == 0 {
            return Err(RecorderError::ZeroCapacity.into());
        }

        let pool = Arc::new(OrderPool::populate(config.pool_size, &config.new_order)?);
        let recorder =
            StatsRecorder::spawn(Arc::new(StatsLedger::new()), config.stats_queue_capacity)?;
        let rotation = Rotation::new(
            Arc::clone(&pool),
            config.new_order,
            config.rotation_interval,
            config.shutdown.child_token(),
        );
        if config.auto_rotate {
            rotation.start();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            pool_size = config.pool_size,
            auto_rotate = config.auto_rotate,
            "Order service created"
        );

        Ok(Arc::new(Self {
            pool,
            recorder,
            rotation,
            shutdown_tx,
            shutdown_rx,
            version: config.version,
        }))
    }

    /// Pick one order with `selector` and record a view for it.
    ///
    /// Returns as soon as the order is chosen; the view reaches the ledger
    /// asynchronously.
    pub async fn next_order<F>(&self, selector: F) -> Order
    where
        F: FnOnce(&[Order]) -> &Order,
    {
        let order = self.pool.select(selector).await;
        self.recorder.record(order.code().to_owned());
        order
    }

    /// Copy of every code's view count. Order is unspecified.
    pub fn stats(&self) -> Vec<OrderStats> {
        self.recorder.ledger().snapshot()
    }

    /// Wait until every view recorded so far is visible in [`Self::stats`].
    pub async fn settle(&self) {
        self.recorder.settle().await;
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.pool.snapshot().await
    }

    pub fn rotation_state(&self) -> RotationState {
        self.rotation.state()
    }

    /// Replace one random slot now. `None` once rotation is stopped.
    pub async fn rotate_once(&self) -> Option<usize> {
        self.rotation.rotate_once().await
    }

    /// Stop rotating. Idempotent; an in-flight tick may still complete.
    pub fn stop_rotation(&self) {
        self.rotation.stop();
    }

    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            pool_size: self.pool.size(),
            tracked_codes: self.recorder.ledger().len(),
            pending_views: self.recorder.in_flight(),
            rotation: self.rotation.state(),
            shutting_down: *self.shutdown_rx.borrow(),
            version: self.version.clone(),
        }
    }

    /// Stop rotation, apply queued views, and join background tasks.
    pub async fn shutdown(&self) {
        self.rotation.join().await;
        self.recorder.close().await;
        tracing::info!(codes = self.recorder.ledger().len(), "Order service stopped");
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }
}
