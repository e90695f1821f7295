//! Order and per-order statistics types.

use std::fmt;
use std::sync::Arc;

/// A dispatchable order identified by a short code.
///
/// Orders are immutable: rotating a pool slot swaps the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Order {
    code: String,
}

impl Order {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn into_code(self) -> String {
        self.code
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Produces a fresh order for initial population and rotation.
pub type OrderFactory = Arc<dyn Fn() -> Order + Send + Sync>;

/// View count for one order code.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OrderStats {
    pub code: String,
    pub views: u64,
}

impl OrderStats {
    pub fn new(code: impl Into<String>, views: u64) -> Self {
        Self {
            code: code.into(),
            views,
        }
    }
}
