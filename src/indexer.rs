use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::config::NetworkConfig;
use crate::db::models::{Post, ProposalType, SyncAction, SyncPostRequest, SyncPostResponse};
use crate::db::repository::PostRepository;
use crate::error::AppError;
use crate::search::client::SearchIndex;
use crate::search::fitter;
use crate::search::record::{build_search_record, is_valid_object_id, object_id};

/// Per-network summary of a resync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub network: String,
    pub indexed: usize,
    pub deleted: usize,
    /// Records whose content was shortened to fit the ceiling.
    pub truncated: usize,
    /// Records written even though they still exceeded the ceiling.
    pub over_budget: usize,
    pub failures: Vec<SyncFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailure {
    pub object_id: String,
    pub error: String,
}

/// Core single-post sync logic, separated from the HTTP layer for testability.
///
/// Validates the request, loads the post and writes (or removes) its search
/// record.
pub async fn process_post_sync(
    repo: &dyn PostRepository,
    index: &dyn SearchIndex,
    networks: &[NetworkConfig],
    request: SyncPostRequest,
    expected_token: &str,
    max_record_bytes: usize,
) -> Result<SyncPostResponse, AppError> {
    if request.service_token != expected_token {
        return Err(AppError::Auth("Invalid service token".into()));
    }

    if !networks.iter().any(|n| n.name == request.network) {
        return Err(AppError::BadRequest(format!(
            "Unknown network '{}'",
            request.network
        )));
    }

    let proposal_type = ProposalType::from_str_ci(&request.proposal_type).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Invalid proposal type '{}'",
            request.proposal_type
        ))
    })?;

    if request.index.trim().is_empty() {
        return Err(AppError::BadRequest("Post index cannot be empty".into()));
    }

    let post = repo
        .find_post(&request.network, proposal_type, &request.index)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Post {} not found",
                object_id(&request.network, proposal_type, &request.index)
            ))
        })?;

    sync_post(index, &post, max_record_bytes).await
}

/// Write one post's search record, or remove it if the post was deleted.
///
/// Oversized records are still written: the index decides whether to reject
/// them.
pub async fn sync_post(
    index: &dyn SearchIndex,
    post: &Post,
    max_record_bytes: usize,
) -> Result<SyncPostResponse, AppError> {
    if post.is_deleted {
        let object_id = object_id(&post.network, post.proposal_type, &post.index);
        index.delete_record(&object_id).await?;
        tracing::debug!("Removed deleted post {object_id} from search index");

        return Ok(SyncPostResponse {
            object_id,
            action: SyncAction::Deleted,
            truncated: false,
            serialized_bytes: 0,
        });
    }

    let record = build_search_record(post);
    if !is_valid_object_id(&record.object_id) {
        return Err(AppError::BadRequest(format!(
            "{} is not a valid search record id",
            record.object_id
        )));
    }

    let outcome = fitter::fit(record, max_record_bytes);
    let object_id = outcome.record.object_id.clone();

    if outcome.truncated {
        tracing::info!(
            "Truncated parsedContent of {object_id} to fit {max_record_bytes} bytes ({} bytes now)",
            outcome.serialized_bytes
        );
    }
    if !outcome.within_budget() {
        tracing::info!(
            "Search record {object_id} is {} bytes, above the {max_record_bytes} byte ceiling; writing anyway",
            outcome.serialized_bytes
        );
    }

    index.upsert_record(&outcome.record).await?;

    Ok(SyncPostResponse {
        object_id,
        action: SyncAction::Indexed,
        truncated: outcome.truncated,
        serialized_bytes: outcome.serialized_bytes,
    })
}

/// Resync every post of one network updated since `since`.
///
/// Posts are written with at most `concurrency` index calls in flight. A
/// failing post is recorded in the report and does not stop the others; only
/// a failure to list the posts fails the whole network.
pub async fn sync_network(
    repo: &dyn PostRepository,
    index: &dyn SearchIndex,
    network: &str,
    since: Option<DateTime<Utc>>,
    max_record_bytes: usize,
    concurrency: usize,
) -> Result<SyncReport, AppError> {
    let posts = repo.list_updated_since(network, since).await?;
    tracing::info!("Syncing {} posts of {network} to the search index", posts.len());

    let results: Vec<_> = stream::iter(posts)
        .map(|post| async move {
            let id = object_id(&post.network, post.proposal_type, &post.index);
            (id, sync_post(index, &post, max_record_bytes).await)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = SyncReport {
        network: network.to_string(),
        ..SyncReport::default()
    };

    for (object_id, result) in results {
        match result {
            Ok(response) => {
                match response.action {
                    SyncAction::Indexed => report.indexed += 1,
                    SyncAction::Deleted => report.deleted += 1,
                }
                if response.truncated {
                    report.truncated += 1;
                }
                if response.serialized_bytes > max_record_bytes {
                    report.over_budget += 1;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to sync {object_id}: {e}");
                report.failures.push(SyncFailure {
                    object_id,
                    error: e.to_string(),
                });
            }
        }
    }

    report.failures.sort_by(|a, b| a.object_id.cmp(&b.object_id));
    Ok(report)
}

/// Resync several networks concurrently.
///
/// Results come back in the order of `networks`; one network failing leaves
/// the others unaffected.
pub async fn sync_networks(
    repo: &dyn PostRepository,
    index: &dyn SearchIndex,
    networks: &[String],
    since: Option<DateTime<Utc>>,
    max_record_bytes: usize,
    concurrency: usize,
) -> Vec<(String, Result<SyncReport, AppError>)> {
    let runs = networks.iter().map(|network| async move {
        let result = sync_network(repo, index, network, since, max_record_bytes, concurrency).await;
        if let Err(e) = &result {
            tracing::warn!("Search index sync of {network} failed: {e}");
        }
        (network.clone(), result)
    });

    futures::future::join_all(runs).await
}
