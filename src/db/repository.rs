use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{Post, ProposalType};
use crate::error::AppError;

/// Repository trait for governance post reads.
///
/// This trait allows mocking the database layer in tests.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Find one post by its network, proposal type and index.
    async fn find_post(
        &self,
        network: &str,
        proposal_type: ProposalType,
        index: &str,
    ) -> Result<Option<Post>, AppError>;

    /// List every post of a network updated at or after `since`
    /// (all posts when `since` is `None`), oldest update first.
    async fn list_updated_since(
        &self,
        network: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>, AppError>;

    /// Create a post or replace the one with the same network/type/index.
    async fn upsert_post(&self, post: Post) -> Result<(), AppError>;
}

/// MongoDB implementation of the PostRepository.
pub struct MongoPostRepository {
    collection: mongodb::Collection<Post>,
}

impl MongoPostRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("posts"),
        }
    }
}

#[async_trait]
impl PostRepository for MongoPostRepository {
    async fn find_post(
        &self,
        network: &str,
        proposal_type: ProposalType,
        index: &str,
    ) -> Result<Option<Post>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! {
                "network": network,
                "proposal_type": proposal_type.as_str(),
                "index": index,
            })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_updated_since(
        &self,
        network: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let mut filter = doc! { "network": network };
        if let Some(since) = since {
            filter.insert(
                "updated_at",
                doc! { "$gte": bson::DateTime::from_chrono(since) },
            );
        }

        let options = FindOptions::builder()
            .sort(doc! { "updated_at": 1, "index": 1 })
            .build();

        let cursor = self
            .collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_post(&self, post: Post) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::ReplaceOptions;

        let filter = doc! {
            "network": &post.network,
            "proposal_type": post.proposal_type.as_str(),
            "index": &post.index,
        };
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection
            .replace_one(filter, &post)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
