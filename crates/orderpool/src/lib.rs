//! orderpool: rotating pool of dispatchable orders with view statistics.
//!
//! Readers sample the pool concurrently through [`OrderService::next_order`];
//! a background rotation periodically replaces one random slot; every sample
//! is counted in a ledger that is updated off the request path.

mod order;
mod pool;
mod rotation;
mod version;

pub mod service;
pub mod stats;
pub mod strategy;
pub mod transport;

pub use order::{Order, OrderFactory, OrderStats};
pub use pool::{OrderPool, PoolError};
pub use rotation::{Rotation, RotationState};
pub use service::{HealthSnapshot, OrderService, OrderServiceConfig, ServiceError};
pub use stats::{RecorderError, StatsLedger, StatsRecorder};
pub use version::{ORDERPOOL_VERSION, VersionInfo};
