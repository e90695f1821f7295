//! Fixed-size order pool guarded by a reader-writer lock.
//!
//! Any number of selections may read the pool together. Rotation is the only
//! writer and holds the write lock for a single slot assignment.

use rand::Rng;
use tokio::sync::RwLock;

use crate::order::{Order, OrderFactory};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("pool size must be greater than 0")]
    Empty,
}

pub struct OrderPool {
    slots: RwLock<Vec<Order>>,
    size: usize,
}

impl OrderPool {
    /// Build a pool of `size` orders by calling `factory` once per slot.
    pub fn populate(size: usize, factory: &OrderFactory) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::Empty);
        }

        let slots: Vec<Order> = (0..size).map(|_| factory()).collect();
        Ok(Self {
            slots: RwLock::new(slots),
            size,
        })
    }

    /// Number of slots. Never changes after construction.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `selector` over the current slots under shared access and return a
    /// copy of the chosen order.
    pub async fn select<F>(&self, selector: F) -> Order
    where
        F: FnOnce(&[Order]) -> &Order,
    {
        let slots = self.slots.read().await;
        selector(slots.as_slice()).clone()
    }

    /// Overwrite a uniformly random slot, returning its index and the previous order.
    pub async fn replace_random(&self, order: Order) -> (usize, Order) {
        let mut slots = self.slots.write().await;
        let slot = rand::rng().random_range(0..slots.len());
        let previous = std::mem::replace(&mut slots[slot], order);
        (slot, previous)
    }

    pub async fn snapshot(&self) -> Vec<Order> {
        self.slots.read().await.clone()
    }
}
