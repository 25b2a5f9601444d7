//! In-memory fakes shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::db::models::{Post, ProposalType};
use crate::db::preferences_repository::PreferencesRepository;
use crate::db::repository::PostRepository;
use crate::error::AppError;
use crate::notifications::preferences::NotificationPreferences;
use crate::search::client::{SearchHit, SearchIndex};
use crate::search::record::SearchRecord;

#[derive(Default)]
pub struct MockPostRepo {
    pub posts: Mutex<Vec<Post>>,
    /// `since` arguments received by `list_updated_since`, per call.
    pub since_calls: Mutex<Vec<(String, Option<DateTime<Utc>>)>>,
    /// Networks whose listing fails.
    pub failing_networks: HashSet<String>,
}

impl MockPostRepo {
    pub fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            posts: Mutex::new(posts),
            ..Self::default()
        }
    }
}

#[async_trait]
impl PostRepository for MockPostRepo {
    async fn find_post(
        &self,
        network: &str,
        proposal_type: ProposalType,
        index: &str,
    ) -> Result<Option<Post>, AppError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.network == network && p.proposal_type == proposal_type && p.index == index)
            .cloned())
    }

    async fn list_updated_since(
        &self,
        network: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>, AppError> {
        self.since_calls
            .lock()
            .unwrap()
            .push((network.to_string(), since));

        if self.failing_networks.contains(network) {
            return Err(AppError::Database(format!("{network} shard unavailable")));
        }

        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.network == network && since.map_or(true, |s| p.updated_at >= s))
            .cloned()
            .collect())
    }

    async fn upsert_post(&self, post: Post) -> Result<(), AppError> {
        let mut posts = self.posts.lock().unwrap();
        posts.retain(|p| {
            !(p.network == post.network
                && p.proposal_type == post.proposal_type
                && p.index == post.index)
        });
        posts.push(post);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSearchIndex {
    pub records: Mutex<Vec<SearchRecord>>,
    pub deleted: Mutex<Vec<String>>,
    /// objectIDs whose upsert fails.
    pub failing_ids: HashSet<String>,
}

impl MockSearchIndex {
    pub fn failing_on(ids: &[&str]) -> Self {
        Self {
            failing_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn record(&self, object_id: &str) -> Option<SearchRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.object_id == object_id)
            .cloned()
    }
}

#[async_trait]
impl SearchIndex for MockSearchIndex {
    async fn upsert_record(&self, record: &SearchRecord) -> Result<(), AppError> {
        if self.failing_ids.contains(&record.object_id) {
            return Err(AppError::Search(format!("rejected {}", record.object_id)));
        }
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r.object_id != record.object_id);
        records.push(record.clone());
        Ok(())
    }

    async fn delete_record(&self, object_id: &str) -> Result<(), AppError> {
        self.records
            .lock()
            .unwrap()
            .retain(|r| r.object_id != object_id);
        self.deleted.lock().unwrap().push(object_id.to_string());
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        network: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| network.map_or(true, |n| r.network == n))
            .filter(|r| r.title.contains(query) || r.parsed_content.contains(query))
            .take(limit)
            .cloned()
            .map(SearchHit::from)
            .collect())
    }

    async fn configure_index(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPreferencesRepo {
    pub stored: Mutex<HashMap<String, serde_json::Value>>,
    pub saves: Mutex<usize>,
}

impl MockPreferencesRepo {
    pub fn with(user_id: &str, raw: serde_json::Value) -> Self {
        Self {
            stored: Mutex::new(HashMap::from([(user_id.to_string(), raw)])),
            saves: Mutex::new(0),
        }
    }
}

#[async_trait]
impl PreferencesRepository for MockPreferencesRepo {
    async fn get_raw(&self, user_id: &str) -> Result<Option<serde_json::Value>, AppError> {
        Ok(self.stored.lock().unwrap().get(user_id).cloned())
    }

    async fn save(
        &self,
        user_id: &str,
        preferences: &NotificationPreferences,
    ) -> Result<(), AppError> {
        *self.saves.lock().unwrap() += 1;
        self.stored
            .lock()
            .unwrap()
            .insert(user_id.to_string(), serde_json::to_value(preferences).unwrap());
        Ok(())
    }
}

pub fn post(network: &str, proposal_type: ProposalType, index: &str, content: &str) -> Post {
    Post {
        network: network.to_string(),
        proposal_type,
        index: index.to_string(),
        title: format!("Proposal #{index}"),
        content: content.to_string(),
        tags: vec!["governance".to_string()],
        proposer: "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY".to_string(),
        origin: None,
        topic: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
        is_deleted: false,
    }
}
