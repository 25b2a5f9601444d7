#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::meilisearch::Meilisearch;
use testcontainers_modules::mongo::Mongo;

use polkasync::app::{self, AppState};
use polkasync::config::NetworkConfig;
use polkasync::db::models::{Post, ProposalType};
use polkasync::db::preferences_repository::MongoPreferencesRepository;
use polkasync::db::repository::{MongoPostRepository, PostRepository};
use polkasync::notifications::preferences::NotificationPreferencesService;
use polkasync::search::client::{MeilisearchIndex, SearchIndex};

pub const SERVICE_TOKEN: &str = "test-token";

/// Holds running containers and provides the Axum router for integration tests.
///
/// Containers are kept alive for as long as this struct lives.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _meili: ContainerAsync<Meilisearch>,
    pub db: mongodb::Database,
    pub router: Router,
    pub repo: Arc<dyn PostRepository>,
    pub search: Arc<dyn SearchIndex>,
    state: AppState,
}

impl TestEnv {
    /// Spin up MongoDB and Meilisearch and build a router wired to them.
    pub async fn start() -> Self {
        Self::start_with_budget(100_000).await
    }

    pub async fn start_with_budget(max_record_bytes: usize) -> Self {
        let (mongo_container, meili_container) =
            tokio::join!(Mongo::default().start(), Meilisearch::default().start());
        let mongo_container = mongo_container.expect("Failed to start MongoDB container");
        let meili_container = meili_container.expect("Failed to start Meilisearch container");

        // --- MongoDB ---
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_client = mongodb::Client::with_uri_str(format!("mongodb://127.0.0.1:{mongo_port}"))
            .await
            .expect("Failed to connect to MongoDB");
        let db = mongo_client.database("polkasync_test");
        let repo: Arc<dyn PostRepository> = Arc::new(MongoPostRepository::new(&db));

        // --- Meilisearch ---
        let meili_port = meili_container
            .get_host_port_ipv4(7700)
            .await
            .expect("Failed to get Meilisearch port");
        let index = MeilisearchIndex::new(&format!("http://127.0.0.1:{meili_port}"), None::<String>)
            .expect("Failed to create MeilisearchIndex")
            .with_task_timeout(std::time::Duration::from_secs(10));
        index
            .configure_index()
            .await
            .expect("Failed to configure Meilisearch index");
        let search: Arc<dyn SearchIndex> = Arc::new(index);

        let state = AppState {
            post_repo: repo.clone(),
            search_index: Some(search.clone()),
            preferences: Arc::new(NotificationPreferencesService::new(Arc::new(
                MongoPreferencesRepository::new(&db),
            ))),
            networks: Arc::new(vec![
                NetworkConfig {
                    name: "polkadot".to_string(),
                    token_symbol: "DOT".to_string(),
                    token_decimals: 10,
                },
                NetworkConfig {
                    name: "kusama".to_string(),
                    token_symbol: "KSM".to_string(),
                    token_decimals: 12,
                },
            ]),
            service_token: SERVICE_TOKEN.to_string(),
            max_record_bytes,
            sync_concurrency: 4,
        };

        Self {
            _mongo: mongo_container,
            _meili: meili_container,
            db,
            router: app::router(state.clone()),
            repo,
            search,
            state,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .build(self.router.clone())
    }

    /// A server over the same database with search disabled.
    pub fn server_without_search(&self) -> axum_test::TestServer {
        let state = AppState {
            search_index: None,
            ..self.state.clone()
        };

        axum_test::TestServer::builder()
            .build(app::router(state))
    }

    /// Helper: store a post directly in MongoDB.
    pub async fn insert_post(&self, post: Post) {
        self.repo
            .upsert_post(post)
            .await
            .expect("Failed to insert post");
    }

    /// Helper: request a single-post sync via the API.
    pub async fn sync_post(
        &self,
        server: &axum_test::TestServer,
        network: &str,
        proposal_type: &str,
        index: &str,
    ) -> axum_test::TestResponse {
        server
            .post("/api/v1/sync/post")
            .json(&serde_json::json!({
                "service_token": SERVICE_TOKEN,
                "network": network,
                "proposal_type": proposal_type,
                "index": index
            }))
            .await
    }

    /// Helper: wait for Meilisearch to process pending tasks (async indexing).
    pub async fn wait_for_search_indexing(&self) {
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
}

pub fn post(
    network: &str,
    proposal_type: ProposalType,
    index: &str,
    title: &str,
    content: &str,
) -> Post {
    let now: DateTime<Utc> = Utc::now();
    Post {
        network: network.to_string(),
        proposal_type,
        index: index.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        tags: vec!["treasury".to_string()],
        proposer: "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5".to_string(),
        origin: None,
        topic: None,
        created_at: now,
        updated_at: now,
        is_deleted: false,
    }
}
