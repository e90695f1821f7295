//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{any, get},
};
use serde::Serialize;

use crate::rotation::RotationState;
use crate::service::{HealthSnapshot, OrderService};
use crate::stats::{render_stats, sort_by_views};
use crate::strategy::random_selector;
use crate::version::VersionInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Ready,
    ShuttingDown,
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub pool_size: usize,
    pub tracked_codes: usize,
    pub pending_views: usize,
    pub rotation: RotationState,
    pub version: VersionInfo,
}

impl HealthCheckResponse {
    pub fn from_snapshot(snapshot: HealthSnapshot) -> Self {
        let status = if snapshot.shutting_down {
            HealthStatus::ShuttingDown
        } else {
            HealthStatus::Ready
        };

        Self {
            status,
            pool_size: snapshot.pool_size,
            tracked_codes: snapshot.tracked_codes,
            pending_views: snapshot.pending_views,
            rotation: snapshot.rotation,
            version: snapshot.version,
        }
    }
}

/// Body is the code of one randomly selected order.
async fn request_order(State(service): State<Arc<OrderService>>) -> String {
    service.next_order(random_selector).await.into_code()
}

/// One `"<code> - <views>"` line per code, most viewed first.
async fn admin_stats(State(service): State<Arc<OrderService>>) -> String {
    let mut stats = service.stats();
    sort_by_views(&mut stats);
    render_stats(&stats)
}

async fn health_check(State(service): State<Arc<OrderService>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse::from_snapshot(service.health()))
}

pub fn routes(service: Arc<OrderService>) -> Router {
    Router::new()
        .route("/request", any(request_order))
        .route("/admin/request", any(admin_stats))
        .route("/health-check", get(health_check))
        .with_state(service)
}
