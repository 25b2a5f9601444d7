use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::AppError;
use crate::search::client::SearchHit;

const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Axum handler for `GET /api/v1/search`.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let index = state
        .search_index
        .as_deref()
        .ok_or_else(|| AppError::Search("Search index is not configured".into()))?;

    if let Some(network) = params.network.as_deref() {
        if !state.is_known_network(network) {
            return Err(AppError::BadRequest(format!("Unknown network '{network}'")));
        }
    }

    let limit = params.limit.unwrap_or(20).clamp(1, MAX_LIMIT);
    let hits = index
        .search(&params.q, params.network.as_deref(), limit)
        .await?;

    Ok(Json(hits))
}
