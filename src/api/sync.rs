use axum::extract::{Path, State};
use axum::Json;

use crate::app::AppState;
use crate::db::models::{SyncNetworkRequest, SyncPostRequest, SyncPostResponse};
use crate::error::AppError;
use crate::indexer::{self, SyncReport};
use crate::search::client::SearchIndex;

fn search_index(state: &AppState) -> Result<&dyn SearchIndex, AppError> {
    state
        .search_index
        .as_deref()
        .ok_or_else(|| AppError::Search("Search index is not configured".into()))
}

/// Axum handler for `POST /api/v1/sync/post`.
pub async fn sync_post_handler(
    State(state): State<AppState>,
    Json(request): Json<SyncPostRequest>,
) -> Result<Json<SyncPostResponse>, AppError> {
    let index = search_index(&state)?;

    let response = indexer::process_post_sync(
        state.post_repo.as_ref(),
        index,
        &state.networks,
        request,
        &state.service_token,
        state.max_record_bytes,
    )
    .await?;

    Ok(Json(response))
}

/// Axum handler for `POST /api/v1/sync/network/{network}`.
///
/// Per-post failures are part of the returned report, not an error status.
pub async fn sync_network_handler(
    State(state): State<AppState>,
    Path(network): Path<String>,
    Json(request): Json<SyncNetworkRequest>,
) -> Result<Json<SyncReport>, AppError> {
    if request.service_token != state.service_token {
        return Err(AppError::Auth("Invalid service token".into()));
    }
    if !state.is_known_network(&network) {
        return Err(AppError::BadRequest(format!("Unknown network '{network}'")));
    }
    let index = search_index(&state)?;

    let report = indexer::sync_network(
        state.post_repo.as_ref(),
        index,
        &network,
        request.since,
        state.max_record_bytes,
        state.sync_concurrency,
    )
    .await?;

    Ok(Json(report))
}
