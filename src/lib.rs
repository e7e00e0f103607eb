pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

use axum::{routing::get, Router};
use handlers::{check_payment, health_check, AppState};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

/// HTTP surface of the checker.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/check-payment", get(check_payment))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
