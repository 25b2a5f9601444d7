use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::notifications::preferences::NotificationPreferences;

/// Repository trait for per-user notification preferences.
#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    /// The stored preferences of a user, in whatever format they were saved.
    async fn get_raw(&self, user_id: &str) -> Result<Option<Value>, AppError>;

    /// Store preferences in the current format, replacing what was there.
    async fn save(
        &self,
        user_id: &str,
        preferences: &NotificationPreferences,
    ) -> Result<(), AppError>;
}

/// MongoDB implementation of the PreferencesRepository.
///
/// One document per user: `{ user_id, preferences }`.
pub struct MongoPreferencesRepository {
    collection: mongodb::Collection<mongodb::bson::Document>,
}

impl MongoPreferencesRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("notification_preferences"),
        }
    }
}

#[async_trait]
impl PreferencesRepository for MongoPreferencesRepository {
    async fn get_raw(&self, user_id: &str) -> Result<Option<Value>, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .find_one(doc! { "user_id": user_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result
            .and_then(|mut d| d.remove("preferences"))
            .map(|b| b.into_relaxed_extjson()))
    }

    async fn save(
        &self,
        user_id: &str,
        preferences: &NotificationPreferences,
    ) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::UpdateOptions;

        let value = bson::to_bson(preferences).map_err(|e| AppError::Internal(e.to_string()))?;
        let options = UpdateOptions::builder().upsert(true).build();

        self.collection
            .update_one(
                doc! { "user_id": user_id },
                doc! { "$set": { "user_id": user_id, "preferences": value } },
            )
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
