use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::app::Services;
use crate::batch::{BatchOptions, BatchSummary};
use crate::history::HistoryEntry;
use crate::session::SessionSnapshot;
use crate::trends::{CacheStatus, CredentialSlot};

pub type AppState = Arc<Services>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/trends/cache", get(cache_status))
        .route("/trends/cache/clear", post(cache_clear))
        .route("/trends/credentials/reset", post(credentials_reset))
        .route("/session", get(session_view))
        .route("/session/clear", post(session_clear))
        .route("/batch/run", post(batch_run))
        .route("/debug/history", get(debug_history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct GeoQuery {
    geo: Option<String>,
}

async fn cache_status(State(s): State<AppState>, Query(q): Query<GeoQuery>) -> Json<CacheStatus> {
    let geo = q
        .geo
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| s.settings.trends.geo.clone());
    Json(s.cache.status(&geo))
}

#[derive(Serialize)]
struct Cleared {
    cleared: bool,
}

async fn cache_clear(State(s): State<AppState>) -> Json<Cleared> {
    s.cache.clear();
    Json(Cleared { cleared: true })
}

#[derive(Serialize)]
struct SlotOut {
    slot: CredentialSlot,
    has_backup: bool,
}

async fn credentials_reset(State(s): State<AppState>) -> Json<SlotOut> {
    s.provider.reset_to_primary();
    Json(SlotOut {
        slot: s.provider.current_slot(),
        has_backup: s.provider.has_backup(),
    })
}

async fn session_view(State(s): State<AppState>) -> Json<SessionSnapshot> {
    Json(s.session.snapshot())
}

async fn session_clear(State(s): State<AppState>) -> Json<Cleared> {
    s.session.reset();
    Json(Cleared { cleared: true })
}

#[derive(Serialize)]
struct ErrorOut {
    error: String,
}

/// Body is optional; an empty body runs every enabled agent.
async fn batch_run(State(s): State<AppState>, body: Bytes) -> Response {
    let opts = if body.iter().all(|b| b.is_ascii_whitespace()) {
        BatchOptions::default()
    } else {
        match serde_json::from_slice::<BatchOptions>(&body) {
            Ok(o) => o,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorOut {
                        error: format!("invalid batch options: {e}"),
                    }),
                )
                    .into_response()
            }
        }
    };
    let summary: BatchSummary = s.run_batch(&opts).await;
    Json(summary).into_response()
}

#[derive(Deserialize)]
struct HistoryQuery {
    n: Option<usize>,
}

async fn debug_history(
    State(s): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<HistoryEntry>> {
    Json(s.history.snapshot_last_n(q.n.unwrap_or(20)))
}
