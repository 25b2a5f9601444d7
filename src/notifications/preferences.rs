//! User notification preferences: format migration and partial updates.
//!
//! Preferences used to store trigger settings flat (`trigger -> settings`).
//! The current format nests them per network (`network -> trigger ->
//! settings`) because users follow several chains. Stored documents of either
//! shape are read through [`migrate`], which never fails: entries that cannot
//! be understood are dropped with a warning.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::preferences_repository::PreferencesRepository;
use crate::error::AppError;

/// Delivery settings for one channel (email, telegram, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPreference {
    #[serde(default)]
    pub enabled: bool,
    /// Address, chat id or handle the channel delivers to.
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub verified: bool,
}

/// Settings for one notification trigger on one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPreference {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub name: String,
    /// OpenGov tracks the trigger is restricted to; empty means all.
    #[serde(default)]
    pub tracks: Vec<u16>,
    #[serde(default)]
    pub sub_triggers: Vec<String>,
}

/// Notification preferences in the current, per-network format.
///
/// Also used as the body of partial updates: absent maps mean "no change".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    #[serde(default)]
    pub channel_preferences: BTreeMap<String, ChannelPreference>,
    /// network -> trigger name -> settings
    #[serde(default)]
    pub trigger_preferences: BTreeMap<String, BTreeMap<String, TriggerPreference>>,
}

impl NotificationPreferences {
    /// Apply a partial update.
    ///
    /// Channels in `update` replace the stored ones. Triggers are replaced per
    /// network and per trigger; networks and triggers the update does not
    /// mention are left as they are.
    pub fn merge(mut self, update: NotificationPreferences) -> Self {
        self.channel_preferences.extend(update.channel_preferences);

        for (network, triggers) in update.trigger_preferences {
            self.trigger_preferences
                .entry(network)
                .or_default()
                .extend(triggers);
        }

        self
    }

    /// Trigger settings for one network, if any were saved.
    pub fn triggers_for(&self, network: &str) -> Option<&BTreeMap<String, TriggerPreference>> {
        self.trigger_preferences.get(network)
    }
}

/// Result of reading a stored preferences document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub preferences: NotificationPreferences,
    /// `true` when legacy flat trigger entries were found and moved.
    pub upgraded: bool,
}

/// Read a stored preferences document of either format.
///
/// Legacy flat trigger entries are attached to `network`. When a trigger
/// exists in both forms for that network, the nested entry wins.
pub fn migrate(raw: &Value, network: &str) -> Migration {
    let mut preferences = NotificationPreferences::default();
    let mut upgraded = false;

    let Some(object) = raw.as_object() else {
        if !raw.is_null() {
            tracing::warn!("Ignoring notification preferences that are not an object");
        }
        return Migration {
            preferences,
            upgraded,
        };
    };

    if let Some(channels) = object.get("channelPreferences").and_then(Value::as_object) {
        for (channel, value) in channels {
            match serde_json::from_value::<ChannelPreference>(value.clone()) {
                Ok(pref) => {
                    preferences.channel_preferences.insert(channel.clone(), pref);
                }
                Err(e) => tracing::warn!("Dropping unreadable channel preference '{channel}': {e}"),
            }
        }
    }

    let Some(triggers) = object.get("triggerPreferences").and_then(Value::as_object) else {
        return Migration {
            preferences,
            upgraded,
        };
    };

    let mut legacy = BTreeMap::new();
    for (key, value) in triggers {
        if is_legacy_trigger(value) {
            match serde_json::from_value::<TriggerPreference>(value.clone()) {
                Ok(pref) => {
                    legacy.insert(key.clone(), pref);
                }
                Err(e) => tracing::warn!("Dropping unreadable legacy trigger '{key}': {e}"),
            }
            continue;
        }

        let Some(network_triggers) = value.as_object() else {
            tracing::warn!("Dropping trigger preferences for '{key}': not an object");
            continue;
        };

        let entry = preferences.trigger_preferences.entry(key.clone()).or_default();
        for (trigger, value) in network_triggers {
            match serde_json::from_value::<TriggerPreference>(value.clone()) {
                Ok(pref) => {
                    entry.insert(trigger.clone(), pref);
                }
                Err(e) => tracing::warn!("Dropping unreadable trigger '{key}/{trigger}': {e}"),
            }
        }
    }

    if !legacy.is_empty() {
        upgraded = true;
        let entry = preferences
            .trigger_preferences
            .entry(network.to_string())
            .or_default();
        for (trigger, pref) in legacy {
            entry.entry(trigger).or_insert(pref);
        }
    }

    Migration {
        preferences,
        upgraded,
    }
}

/// Keys a trigger entry may carry.
const TRIGGER_FIELDS: [&str; 4] = ["enabled", "name", "tracks", "subTriggers"];

/// A legacy trigger entry carries its settings directly rather than a map of
/// triggers. Any field may be absent, so one non-object trigger field is
/// enough; in a per-network map every value is an object.
fn is_legacy_trigger(value: &Value) -> bool {
    value.as_object().is_some_and(|o| {
        TRIGGER_FIELDS
            .iter()
            .any(|field| o.get(*field).is_some_and(|v| !v.is_object()))
    })
}

/// Loads, upgrades and updates stored preferences.
pub struct NotificationPreferencesService {
    repo: Arc<dyn PreferencesRepository>,
}

impl NotificationPreferencesService {
    pub fn new(repo: Arc<dyn PreferencesRepository>) -> Self {
        Self { repo }
    }

    /// Load a user's preferences, attaching legacy entries to `network`.
    ///
    /// An upgraded document is written back so the legacy form is read once.
    pub async fn get(
        &self,
        user_id: &str,
        network: &str,
    ) -> Result<NotificationPreferences, AppError> {
        let Some(raw) = self.repo.get_raw(user_id).await? else {
            return Ok(NotificationPreferences::default());
        };

        let migration = migrate(&raw, network);
        if migration.upgraded {
            tracing::info!("Upgrading legacy notification preferences of user {user_id} under {network}");
            self.repo.save(user_id, &migration.preferences).await?;
        }

        Ok(migration.preferences)
    }

    /// Merge `update` into the stored preferences and persist the result.
    pub async fn update(
        &self,
        user_id: &str,
        network: &str,
        update: NotificationPreferences,
    ) -> Result<NotificationPreferences, AppError> {
        let current = match self.repo.get_raw(user_id).await? {
            Some(raw) => migrate(&raw, network).preferences,
            None => NotificationPreferences::default(),
        };

        let merged = current.merge(update);
        self.repo.save(user_id, &merged).await?;
        Ok(merged)
    }
}
