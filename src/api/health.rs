//! Liveness endpoint
//!
//! - GET /api/health - Database reachability and request statistics

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub uptime_seconds: u64,
    /// e.g. "2h 15m"
    pub uptime_formatted: String,
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Health check database ping failed: {}", e);
            false
        }
    };
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let uptime_seconds = state.request_stats.uptime_seconds();

    (
        status,
        Json(HealthResponse {
            status: if database { "ok" } else { "degraded" },
            version: APP_VERSION,
            database,
            uptime_seconds,
            uptime_formatted: format_uptime(uptime_seconds),
            total_requests: state.request_stats.total_requests(),
            avg_response_time_ms: state.request_stats.avg_response_time_ms(),
        }),
    )
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}
