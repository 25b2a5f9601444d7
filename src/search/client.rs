use std::time::Duration;

use async_trait::async_trait;
use meilisearch_sdk::task_info::TaskInfo;
use meilisearch_sdk::tasks::Task;
use serde::{Deserialize, Serialize};

use crate::db::models::ProposalType;
use crate::error::AppError;
use crate::search::record::SearchRecord;

/// A search result returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub object_id: String,
    pub network: String,
    pub proposal_type: ProposalType,
    pub index: String,
    pub title: String,
    pub tags: Vec<String>,
}

impl From<SearchRecord> for SearchHit {
    fn from(record: SearchRecord) -> Self {
        Self {
            object_id: record.object_id,
            network: record.network,
            proposal_type: record.proposal_type,
            index: record.index,
            title: record.title,
            tags: record.tags,
        }
    }
}

/// Trait for search index operations, enabling mock testing.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Add or replace a record, matched by its objectID.
    ///
    /// Returns once the index has accepted or rejected the record.
    async fn upsert_record(&self, record: &SearchRecord) -> Result<(), AppError>;

    /// Remove a record from the index.
    async fn delete_record(&self, object_id: &str) -> Result<(), AppError>;

    /// Full-text search, optionally restricted to one network.
    async fn search(
        &self,
        query: &str,
        network: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, AppError>;

    /// Configure the index (filterable/searchable attributes).
    /// Should be called once on startup.
    async fn configure_index(&self) -> Result<(), AppError>;
}

/// How long a document write may stay queued before it counts as failed.
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Meilisearch implementation of the SearchIndex.
pub struct MeilisearchIndex {
    client: meilisearch_sdk::client::Client,
    index_name: String,
    task_timeout: Duration,
}

impl MeilisearchIndex {
    /// Create a client for `url`, writing to the `posts` index.
    pub fn new(url: &str, api_key: Option<impl Into<String>>) -> Result<Self, AppError> {
        Self::with_index(url, api_key, "posts")
    }

    pub fn with_index(
        url: &str,
        api_key: Option<impl Into<String>>,
        index_name: &str,
    ) -> Result<Self, AppError> {
        let client = meilisearch_sdk::client::Client::new(url, api_key)
            .map_err(|e| AppError::Search(format!("Failed to create Meilisearch client: {e}")))?;

        Ok(Self {
            client,
            index_name: index_name.to_string(),
            task_timeout: DEFAULT_TASK_TIMEOUT,
        })
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    fn index(&self) -> meilisearch_sdk::indexes::Index {
        self.client.index(&self.index_name)
    }

    /// Wait for a document task and surface a rejection as an error.
    async fn finish(&self, task: TaskInfo, object_id: &str) -> Result<(), AppError> {
        let task = task
            .wait_for_completion(&self.client, None, Some(self.task_timeout))
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch task for {object_id}: {e}")))?;

        match task {
            Task::Failed { content } => Err(AppError::Search(format!(
                "Meilisearch rejected {object_id}: {}",
                content.error
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SearchIndex for MeilisearchIndex {
    async fn upsert_record(&self, record: &SearchRecord) -> Result<(), AppError> {
        let task = self
            .index()
            .add_or_replace(&[record], Some("objectID"))
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch upsert error: {e}")))?;

        self.finish(task, &record.object_id).await
    }

    async fn delete_record(&self, object_id: &str) -> Result<(), AppError> {
        let task = self
            .index()
            .delete_document(object_id)
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch delete error: {e}")))?;

        self.finish(task, object_id).await
    }

    async fn search(
        &self,
        query: &str,
        network: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, AppError> {
        let filter = network.map(|n| format!("network = \"{}\"", n.replace('"', "")));

        let index = self.index();
        let mut request = index.search();
        request.with_query(query).with_limit(limit);
        if let Some(filter) = filter.as_deref() {
            request.with_filter(filter);
        }

        let results: meilisearch_sdk::search::SearchResults<SearchRecord> = request
            .execute()
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch search error: {e}")))?;

        Ok(results
            .hits
            .into_iter()
            .map(|hit| SearchHit::from(hit.result))
            .collect())
    }

    async fn configure_index(&self) -> Result<(), AppError> {
        let index = self.index();

        let _: meilisearch_sdk::task_info::TaskInfo = index
            .set_filterable_attributes(["network", "proposalType", "tags"])
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch config error: {e}")))?;

        let _: meilisearch_sdk::task_info::TaskInfo = index
            .set_searchable_attributes(["title", "parsedContent", "tags", "proposer"])
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch config error: {e}")))?;

        let _: meilisearch_sdk::task_info::TaskInfo = index
            .set_sortable_attributes(["updatedAtTimestamp"])
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch config error: {e}")))?;

        Ok(())
    }
}
