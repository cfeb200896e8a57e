//! Disclosure preference storage
//!
//! Preferences are written ahead of time (by the app that requested the
//! verification) and only read during verification.

use async_trait::async_trait;
use attest_common::{DisclosurePreferences, Error, Result};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Stored preferences for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    /// Identifier the verifier reports for the user
    pub user_identifier: String,

    pub preferences: DisclosurePreferences,

    /// When these preferences were saved
    pub saved_at: DateTime<Utc>,
}

impl PreferenceRecord {
    pub fn new(user_identifier: String, preferences: DisclosurePreferences) -> Self {
        Self {
            user_identifier,
            preferences,
            saved_at: Utc::now(),
        }
    }
}

/// Lookup of disclosure preferences by user identifier
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Fetch the stored record, if any
    async fn get_record(&self, user_identifier: &str) -> Result<Option<PreferenceRecord>>;

    /// Save preferences, replacing any existing record
    async fn save(
        &self,
        user_identifier: &str,
        preferences: DisclosurePreferences,
    ) -> Result<PreferenceRecord>;

    async fn get_preferences(&self, user_identifier: &str) -> Result<Option<DisclosurePreferences>> {
        Ok(self
            .get_record(user_identifier)
            .await?
            .map(|record| record.preferences))
    }
}

/// Serves the same preferences for every user
pub struct StaticPreferenceStore {
    preferences: DisclosurePreferences,
    loaded_at: DateTime<Utc>,
}

impl StaticPreferenceStore {
    pub fn new(preferences: DisclosurePreferences) -> Self {
        Self {
            preferences,
            loaded_at: Utc::now(),
        }
    }
}

#[async_trait]
impl PreferenceStore for StaticPreferenceStore {
    async fn get_record(&self, user_identifier: &str) -> Result<Option<PreferenceRecord>> {
        Ok(Some(PreferenceRecord {
            user_identifier: user_identifier.to_string(),
            preferences: self.preferences.clone(),
            saved_at: self.loaded_at,
        }))
    }

    async fn save(&self, _: &str, _: DisclosurePreferences) -> Result<PreferenceRecord> {
        Err(Error::ReadOnlyStore)
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemoryPreferenceStore {
    records: RwLock<HashMap<String, PreferenceRecord>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get_record(&self, user_identifier: &str) -> Result<Option<PreferenceRecord>> {
        Ok(self.records.read().await.get(user_identifier).cloned())
    }

    async fn save(
        &self,
        user_identifier: &str,
        preferences: DisclosurePreferences,
    ) -> Result<PreferenceRecord> {
        let record = PreferenceRecord::new(user_identifier.to_string(), preferences);
        self.records
            .write()
            .await
            .insert(user_identifier.to_string(), record.clone());
        Ok(record)
    }
}

/// Redis-backed store, one JSON value per user
pub struct RedisPreferenceStore {
    conn: ConnectionManager,
}

impl RedisPreferenceStore {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    fn key(user_identifier: &str) -> String {
        format!("preferences:{}", user_identifier)
    }

    /// Remove a user's preferences, returning whether any existed
    pub async fn delete(&self, user_identifier: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: bool = conn
            .del(Self::key(user_identifier))
            .await
            .map_err(store_error)?;
        Ok(deleted)
    }
}

#[async_trait]
impl PreferenceStore for RedisPreferenceStore {
    async fn get_record(&self, user_identifier: &str) -> Result<Option<PreferenceRecord>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn
            .get(Self::key(user_identifier))
            .await
            .map_err(store_error)?;

        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => {
                debug!("No preferences stored for user: {}", user_identifier);
                Ok(None)
            }
        }
    }

    async fn save(
        &self,
        user_identifier: &str,
        preferences: DisclosurePreferences,
    ) -> Result<PreferenceRecord> {
        let record = PreferenceRecord::new(user_identifier.to_string(), preferences);
        let json = serde_json::to_string(&record)?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .set(Self::key(user_identifier), json)
            .await
            .map_err(store_error)?;

        info!("Saved preferences for user: {}", user_identifier);
        Ok(record)
    }
}

fn store_error(err: redis::RedisError) -> Error {
    Error::Store(err.to_string())
}
