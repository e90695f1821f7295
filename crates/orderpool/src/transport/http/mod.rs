//! HTTP transport: plain-text order dispatch, the admin stats page and a health check.

mod routes;
mod server;

pub use routes::{HealthCheckResponse, HealthStatus, routes};
pub use server::{DEFAULT_SHUTDOWN_TIMEOUT, ServerConfig, serve};
