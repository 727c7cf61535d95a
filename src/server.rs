//! HTTP trigger surface: `POST /ingest` runs one pipeline cycle,
//! `GET /health` is the liveness probe. A trivial wrapper around
//! [`crate::pipeline::run_cycle`] — the axum app owns no state beyond
//! the warehouse pool and source registry.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::error;

use crate::config::Config;
use crate::pipeline::run_cycle;
use crate::sources::SourceConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<Vec<SourceConfig>>,
    pub config: Arc<Config>,
}

/// Build the axum router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(ingest_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

#[derive(Serialize)]
struct IngestResponse {
    run_id: String,
    sources: Vec<String>,
    raw_events: u64,
    unified_events: u64,
    dead_letters: u64,
    duration_s: f64,
}

async fn ingest_handler(State(state): State<AppState>) -> impl IntoResponse {
    match run_cycle(&state.pool, &state.registry, &state.config).await {
        Ok(summary) => {
            let body = IngestResponse {
                run_id: summary.run_id,
                sources: summary.sources_fetched,
                raw_events: summary.raw_events_count,
                unified_events: summary.unified_events_count,
                dead_letters: summary.dead_letter_count,
                duration_s: summary.duration_seconds,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!("pipeline cycle failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_response_serializes() {
        let body = IngestResponse {
            run_id: "abc12345".to_string(),
            sources: vec!["usgs".to_string()],
            raw_events: 3,
            unified_events: 1,
            dead_letters: 0,
            duration_s: 0.25,
        };
        let json = serde_json::to_string(&body).expect("serialize");
        assert!(json.contains("\"run_id\":\"abc12345\""));
        assert!(json.contains("\"raw_events\":3"));
    }
}
