//! Periodic order rotation.
//!
//! Lifecycle is `Idle -> Running -> Stopped` with no way back from `Stopped`.
//! Stopping is driven by a [`CancellationToken`], so it is idempotent and also
//! follows cancellation of whatever parent token the owner derived it from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::order::OrderFactory;
use crate::pool::OrderPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationState {
    Idle,
    Running,
    Stopped,
}

pub struct Rotation {
    pool: Arc<OrderPool>,
    new_order: OrderFactory,
    period: Duration,
    token: CancellationToken,
    started: AtomicBool,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl Rotation {
    /// `period` must be non-zero if the rotation is ever started.
    pub fn new(
        pool: Arc<OrderPool>,
        new_order: OrderFactory,
        period: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            pool,
            new_order,
            period,
            token,
            started: AtomicBool::new(false),
            task: StdMutex::new(None),
        }
    }

    pub fn state(&self) -> RotationState {
        if self.token.is_cancelled() {
            RotationState::Stopped
        } else if self.started.load(Ordering::Acquire) {
            RotationState::Running
        } else {
            RotationState::Idle
        }
    }

    /// Spawn the periodic task. Returns false unless the rotation was idle.
    pub fn start(&self) -> bool {
        if self.token.is_cancelled()
            || self
                .started
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return false;
        }

        let task = tokio::spawn(rotation_loop(
            Arc::clone(&self.pool),
            Arc::clone(&self.new_order),
            self.period,
            self.token.clone(),
        ));
        if let Ok(mut guard) = self.task.lock() {
            *guard = Some(task);
        }

        tracing::info!(period = ?self.period, "Order rotation started");
        true
    }

    /// Replace one random slot now. Returns the slot, or `None` once stopped.
    pub async fn rotate_once(&self) -> Option<usize> {
        if self.token.is_cancelled() {
            return None;
        }
        Some(rotate(&self.pool, &self.new_order).await)
    }

    /// Signal the task to stop. Safe to call any number of times.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop and wait for the task to exit, including any in-flight tick.
    pub async fn join(&self) {
        self.stop();

        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::error!(error = %e, "Order rotation task failed");
        }
    }
}

impl Drop for Rotation {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn rotate(pool: &OrderPool, new_order: &OrderFactory) -> usize {
    // Manufacture outside the write lock; the critical section is the swap.
    let order = new_order();
    let (slot, previous) = pool.replace_random(order).await;
    tracing::trace!(slot, replaced = %previous, "Rotated order");
    slot
}

async fn rotation_loop(
    pool: Arc<OrderPool>,
    new_order: OrderFactory,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                rotate(&pool, &new_order).await;
            }
        }
    }

    tracing::info!("Order rotation stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;
    use std::sync::atomic::AtomicUsize;

    fn counting_factory() -> OrderFactory {
        let next = Arc::new(AtomicUsize::new(0));
        Arc::new(move || Order::new(format!("o{}", next.fetch_add(1, Ordering::SeqCst))))
    }

    fn rotation(period: Duration) -> (Rotation, Arc<OrderPool>) {
        let factory = counting_factory();
        let pool = Arc::new(OrderPool::populate(4, &factory).unwrap());
        let rotation = Rotation::new(
            Arc::clone(&pool),
            factory,
            period,
            CancellationToken::new(),
        );
        (rotation, pool)
    }

    #[tokio::test]
    async fn starts_idle_and_runs_once_started() {
        let (rotation, _pool) = rotation(Duration::from_millis(10));
        assert_eq!(rotation.state(), RotationState::Idle);

        assert!(rotation.start());
        assert_eq!(rotation.state(), RotationState::Running);

        // A second start is rejected.
        assert!(!rotation.start());
        rotation.join().await;
    }

    #[tokio::test]
    async fn running_rotation_replaces_slots() {
        let (rotation, pool) = rotation(Duration::from_millis(5));
        let before = pool.snapshot().await;
        rotation.start();

        tokio::time::timeout(Duration::from_secs(2), async {
            while pool.snapshot().await == before {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pool never rotated");

        rotation.join().await;
        assert_eq!(pool.snapshot().await.len(), 4);
    }

    #[tokio::test]
    async fn no_mutation_after_stop() {
        let (rotation, pool) = rotation(Duration::from_millis(5));
        rotation.start();
        tokio::time::sleep(Duration::from_millis(30)).await;

        rotation.join().await;
        assert_eq!(rotation.state(), RotationState::Stopped);

        let stopped = pool.snapshot().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.snapshot().await, stopped);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (rotation, _pool) = rotation(Duration::from_millis(5));
        rotation.start();

        rotation.stop();
        rotation.stop();
        assert_eq!(rotation.state(), RotationState::Stopped);

        rotation.join().await;
        rotation.join().await;
        assert_eq!(rotation.state(), RotationState::Stopped);
    }

    #[tokio::test]
    async fn stopped_rotation_cannot_restart() {
        let (rotation, _pool) = rotation(Duration::from_millis(5));
        rotation.stop();

        assert!(!rotation.start());
        assert_eq!(rotation.state(), RotationState::Stopped);
        assert!(rotation.rotate_once().await.is_none());
    }

    #[tokio::test]
    async fn parent_cancellation_stops_rotation() {
        let parent = CancellationToken::new();
        let factory = counting_factory();
        let pool = Arc::new(OrderPool::populate(2, &factory).unwrap());
        let rotation = Rotation::new(pool, factory, Duration::from_millis(5), parent.child_token());
        rotation.start();

        parent.cancel();
        assert_eq!(rotation.state(), RotationState::Stopped);
        rotation.join().await;
    }

    #[tokio::test]
    async fn rotate_once_replaces_a_slot() {
        let (rotation, pool) = rotation(Duration::from_millis(200));

        let slot = rotation.rotate_once().await.unwrap();
        let snapshot = pool.snapshot().await;
        assert_eq!(snapshot[slot], Order::new("o4"));
    }
}
