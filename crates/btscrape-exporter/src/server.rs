//! HTTP exposition: `/metrics` and `/healthz`.
//!
//! `gather()` runs a full scrape (signal + drain), so a `/metrics` request
//! blocks for the duration of the dump. Callers needing bounded latency
//! impose their own scrape timeout on the Prometheus side.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::error;

pub fn build_router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(registry)
}

async fn metrics_handler(State(registry): State<Registry>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = registry.gather();
    let mut buf = Vec::new();
    match encoder.encode(&families, &mut buf) {
        Ok(()) => {
            let headers: [(HeaderName, String); 1] =
                [(CONTENT_TYPE, encoder.format_type().to_string())];
            (headers, buf).into_response()
        }
        Err(e) => {
            error!(error = %e, "cannot encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz_handler() -> &'static str {
    "OK"
}
