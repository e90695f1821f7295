//! Transport layer for orderpool.
//!
//! Currently provides HTTP transport via axum.

pub mod http;

pub use http::{DEFAULT_SHUTDOWN_TIMEOUT, ServerConfig, serve};
