//! Ledger and log routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{DownloadView, LogsQuery, LogsResponse, StatusResponse};
use crate::api::server::AppState;
use crate::error::Error;

/// Create the status router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(list_status))
        .route("/status/{id}", get(get_status))
        .route("/logs", get(list_logs))
}

/// All retained ledger entries, newest first.
async fn list_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let downloads = state
        .service
        .ledger()
        .snapshot()
        .into_iter()
        .map(DownloadView::from)
        .collect();

    Json(StatusResponse {
        downloads,
        pending: state.service.pending_count(),
    })
}

async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<DownloadView>> {
    state
        .service
        .ledger()
        .get(id)
        .map(|entry| Json(entry.into()))
        .ok_or_else(|| ApiError::not_found(format!("No ledger entry with id {id}")))
}

async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogsResponse>> {
    let mut logs = state.log_buffer.snapshot();
    if let Some(limit) = query.limit {
        if limit == 0 {
            return Err(Error::validation("limit must be at least 1").into());
        }
        logs.truncate(limit);
    }
    Ok(Json(LogsResponse { logs }))
}
