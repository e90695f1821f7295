//! Selector and factory strategies supplied to the order service.
//!
//! The random ones back the HTTP server; the deterministic ones make tests
//! and manual setups reproducible.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use crate::order::{Order, OrderFactory};

const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Random lowercase ASCII code of `length` characters.
pub fn random_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Factory producing orders with random codes of `code_length` characters.
pub fn random_order_factory(code_length: usize) -> OrderFactory {
    Arc::new(move || Order::new(random_code(code_length)))
}

/// Pick a uniformly random order.
///
/// # Panics
///
/// Panics if `orders` is empty. Pools are never empty.
pub fn random_selector(orders: &[Order]) -> &Order {
    &orders[rand::rng().random_range(0..orders.len())]
}

/// Selector for the first slot.
pub fn first_slot(orders: &[Order]) -> &Order {
    &orders[0]
}

/// Factory cycling through `codes` in order, wrapping at the end.
///
/// # Panics
///
/// The returned factory panics when called if `codes` was empty.
pub fn cycling_factory<I, S>(codes: I) -> OrderFactory
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let codes: Vec<String> = codes.into_iter().map(Into::into).collect();
    let next = AtomicUsize::new(0);
    Arc::new(move || {
        let i = next.fetch_add(1, Ordering::Relaxed);
        Order::new(codes[i % codes.len()].clone())
    })
}
