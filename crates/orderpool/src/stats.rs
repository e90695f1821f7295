//! View statistics: the ledger and the recorder that feeds it.
//!
//! Selections never touch the ledger directly. They hand a view event to the
//! [`StatsRecorder`], whose single worker task applies queued events in arrival
//! order. The recorder queue is bounded. When it is full the caller applies its
//! own view to the ledger, which costs one shard lock and parks nothing, so no
//! increment is lost and memory stays bounded by the queue capacity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use dashmap::DashMap;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::order::OrderStats;

/// Map of order code to view count. Grows, never shrinks.
#[derive(Debug, Default)]
pub struct StatsLedger {
    views: DashMap<String, u64>,
}

impl StatsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the count for `code`, inserting it at 1 on first sight.
    ///
    /// The entry holds its shard's write lock for the whole read-modify-write,
    /// so concurrent calls for the same code cannot lose updates.
    pub fn record_view(&self, code: &str) -> u64 {
        let mut views = self.views.entry(code.to_owned()).or_insert(0);
        *views += 1;
        *views
    }

    pub fn views(&self, code: &str) -> Option<u64> {
        self.views.get(code).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Copy every (code, count) pair. Order is unspecified.
    pub fn snapshot(&self) -> Vec<OrderStats> {
        self.views
            .iter()
            .map(|entry| OrderStats::new(entry.key().clone(), *entry.value()))
            .collect()
    }
}

/// Sort by views descending, then code ascending.
pub fn sort_by_views(stats: &mut [OrderStats]) {
    stats.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.code.cmp(&b.code)));
}

/// Render one `"<code> - <views>"` line per entry, in the given order.
pub fn render_stats(stats: &[OrderStats]) -> String {
    stats
        .iter()
        .map(|s| format!("{} - {}\n", s.code, s.views))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecorderError {
    #[error("stats queue capacity must be greater than 0")]
    ZeroCapacity,
}

/// Count of dispatched view events not yet applied to the ledger.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    async fn wait_idle(&self) {
        loop {
            // Register before checking so a concurrent finish() is not missed.
            let notified = self.idle.notified();
            if self.get() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Fire-and-forget writer for a [`StatsLedger`].
pub struct StatsRecorder {
    ledger: Arc<StatsLedger>,
    tx: mpsc::Sender<String>,
    in_flight: Arc<InFlight>,
    close_token: CancellationToken,
    worker: StdMutex<Option<JoinHandle<()>>>,
}

impl StatsRecorder {
    /// Spawn the recorder worker. Must be called inside a tokio runtime.
    pub fn spawn(ledger: Arc<StatsLedger>, capacity: usize) -> Result<Self, RecorderError> {
        if capacity == 0 {
            return Err(RecorderError::ZeroCapacity);
        }

        let (tx, rx) = mpsc::channel(capacity);
        let in_flight = Arc::new(InFlight::default());
        let close_token = CancellationToken::new();

        let worker = tokio::spawn(record_loop(
            rx,
            Arc::clone(&ledger),
            Arc::clone(&in_flight),
            close_token.clone(),
        ));

        Ok(Self {
            ledger,
            tx,
            in_flight,
            close_token,
            worker: StdMutex::new(Some(worker)),
        })
    }

    pub fn ledger(&self) -> &Arc<StatsLedger> {
        &self.ledger
    }

    /// Queue a view of `code`. Never waits on the worker and never fails the
    /// caller. Views recorded after [`close`](Self::close) are dropped.
    pub fn record(&self, code: String) {
        use mpsc::error::TrySendError;

        self.in_flight.begin();
        match self.tx.try_send(code) {
            Ok(()) => {}
            Err(TrySendError::Full(code)) => {
                tracing::debug!(code = %code, "Stats queue full, recording inline");
                self.ledger.record_view(&code);
                self.in_flight.finish();
            }
            Err(TrySendError::Closed(code)) => {
                tracing::warn!(code = %code, "Stats recorder closed, view dropped");
                self.in_flight.finish();
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    /// Resolve once every view recorded so far has reached the ledger.
    pub async fn settle(&self) {
        self.in_flight.wait_idle().await;
    }

    /// Stop accepting views, apply what is queued, and join the worker.
    pub async fn close(&self) {
        self.close_token.cancel();

        let worker = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            tracing::error!(error = %e, "Stats recorder task failed");
        }
    }
}

impl Drop for StatsRecorder {
    fn drop(&mut self) {
        self.close_token.cancel();
    }
}

async fn record_loop(
    mut rx: mpsc::Receiver<String>,
    ledger: Arc<StatsLedger>,
    in_flight: Arc<InFlight>,
    close_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(code) => {
                    ledger.record_view(&code);
                    in_flight.finish();
                }
                None => break,
            },
            _ = close_token.cancelled() => {
                rx.close();
                while let Some(code) = rx.recv().await {
                    ledger.record_view(&code);
                    in_flight.finish();
                }
                break;
            }
        }
    }

    tracing::debug!(codes = ledger.len(), "Stats recorder stopped");
}
