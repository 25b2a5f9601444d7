use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::NetworkConfig;
use crate::db::repository::PostRepository;
use crate::notifications::preferences::NotificationPreferencesService;
use crate::search::client::SearchIndex;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub post_repo: Arc<dyn PostRepository>,
    /// `None` when search is not configured; sync and search requests then fail.
    pub search_index: Option<Arc<dyn SearchIndex>>,
    pub preferences: Arc<NotificationPreferencesService>,
    pub networks: Arc<Vec<NetworkConfig>>,
    pub service_token: String,
    pub max_record_bytes: usize,
    pub sync_concurrency: usize,
}

impl AppState {
    pub fn is_known_network(&self, name: &str) -> bool {
        self.networks.iter().any(|n| n.name == name)
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/sync/post", post(api::sync::sync_post_handler))
        .route(
            "/api/v1/sync/network/{network}",
            post(api::sync::sync_network_handler),
        )
        .route("/api/v1/search", get(api::search::search_handler))
        .route(
            "/api/v1/users/{user_id}/notification-preferences",
            get(api::preferences::get_preferences_handler)
                .put(api::preferences::update_preferences_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
