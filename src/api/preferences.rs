use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::AppError;
use crate::notifications::preferences::NotificationPreferences;

/// Header carrying the service token on preference routes.
pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";

#[derive(Debug, Deserialize)]
pub struct NetworkQuery {
    pub network: String,
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), AppError> {
    let token = headers
        .get(SERVICE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing service token".into()))?;

    if token != state.service_token {
        return Err(AppError::Auth("Invalid service token".into()));
    }
    Ok(())
}

fn known_network(state: &AppState, network: &str) -> Result<(), AppError> {
    if state.is_known_network(network) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Unknown network '{network}'")))
    }
}

/// Axum handler for `GET /api/v1/users/{user_id}/notification-preferences`.
pub async fn get_preferences_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<NotificationPreferences>, AppError> {
    authorize(&headers, &state)?;
    known_network(&state, &query.network)?;

    let preferences = state.preferences.get(&user_id, &query.network).await?;
    Ok(Json(preferences))
}

/// Axum handler for `PUT /api/v1/users/{user_id}/notification-preferences`.
///
/// The body is a partial update merged into the stored preferences.
pub async fn update_preferences_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<NetworkQuery>,
    Json(update): Json<NotificationPreferences>,
) -> Result<Json<NotificationPreferences>, AppError> {
    authorize(&headers, &state)?;
    known_network(&state, &query.network)?;
    for network in update.trigger_preferences.keys() {
        known_network(&state, network)?;
    }

    let merged = state
        .preferences
        .update(&user_id, &query.network, update)
        .await?;
    Ok(Json(merged))
}
