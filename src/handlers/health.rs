use crate::{handlers::AppState, models::HealthStatus};
use axum::{extract::State, Json};
use chrono::Utc;

pub async fn health_check(
    State(state): State<AppState>,
) -> Json<HealthStatus> {
    let endpoints = state.checker.provider_count();

    let status = if endpoints > 1 {
        "healthy"
    } else if endpoints == 1 {
        "degraded"
    } else {
        "unhealthy"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        explorer_endpoints: endpoints,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    })
}
