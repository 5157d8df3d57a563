//! Redis-backed store and directory.
//!
//! JSON values under namespaced keys, with index sets tracking which
//! users have a tier list or embedding so `load_all_*` stays a bounded
//! two-step read instead of a keyspace scan.

use super::{MatchStore, ProfileDirectory};
use crate::models::{MatchRecord, StoredTierList, UserProfile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::warn;

const TIER_LIST_KEY: &str = "tiermatch:tierlist:";
const TIER_LIST_INDEX: &str = "tiermatch:tierlist:users";
const EMBEDDING_KEY: &str = "tiermatch:embedding:";
const EMBEDDING_INDEX: &str = "tiermatch:embedding:users";
const MATCHES_KEY: &str = "tiermatch:matches:";
const PROFILE_KEY: &str = "tiermatch:profile:";

#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl MatchStore for RedisStore {
    async fn save_tier_list(&self, entry: &StoredTierList) -> Result<()> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(entry).context("failed to serialize tier list")?;

        conn.set::<_, _, ()>(format!("{}{}", TIER_LIST_KEY, entry.user_id), payload)
            .await
            .context("failed to persist tier list")?;
        conn.sadd::<_, _, ()>(TIER_LIST_INDEX, &entry.user_id)
            .await
            .context("failed to index tier list owner")?;
        Ok(())
    }

    async fn load_all_tier_lists(&self) -> Result<Vec<StoredTierList>> {
        let mut conn = self.manager.clone();
        let users: Vec<String> = conn
            .smembers(TIER_LIST_INDEX)
            .await
            .context("failed to list tier list owners")?;

        let mut result = Vec::with_capacity(users.len());
        for user_id in users {
            let raw: Option<String> = conn
                .get(format!("{}{}", TIER_LIST_KEY, user_id))
                .await
                .context("failed to load tier list")?;
            match raw {
                Some(json) => match serde_json::from_str(&json) {
                    Ok(entry) => result.push(entry),
                    Err(e) => warn!(user_id = %user_id, error = %e, "skipping unparsable tier list"),
                },
                None => warn!(user_id = %user_id, "indexed tier list missing, skipping"),
            }
        }
        Ok(result)
    }

    async fn save_embedding(&self, user_id: &str, vector: &[f32]) -> Result<()> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(vector).context("failed to serialize embedding")?;

        conn.set::<_, _, ()>(format!("{}{}", EMBEDDING_KEY, user_id), payload)
            .await
            .context("failed to persist embedding")?;
        conn.sadd::<_, _, ()>(EMBEDDING_INDEX, user_id)
            .await
            .context("failed to index embedding owner")?;
        Ok(())
    }

    async fn load_all_embeddings(&self) -> Result<HashMap<String, Vec<f32>>> {
        let mut conn = self.manager.clone();
        let users: Vec<String> = conn
            .smembers(EMBEDDING_INDEX)
            .await
            .context("failed to list embedding owners")?;

        let mut result = HashMap::with_capacity(users.len());
        for user_id in users {
            let raw: Option<String> = conn
                .get(format!("{}{}", EMBEDDING_KEY, user_id))
                .await
                .context("failed to load embedding")?;
            match raw {
                Some(json) => match serde_json::from_str::<Vec<f32>>(&json) {
                    Ok(vector) => {
                        result.insert(user_id, vector);
                    }
                    Err(e) => warn!(user_id = %user_id, error = %e, "skipping unparsable embedding"),
                },
                None => warn!(user_id = %user_id, "indexed embedding missing, skipping"),
            }
        }
        Ok(result)
    }

    async fn save_matches(&self, user_id: &str, record: &MatchRecord) -> Result<()> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(record).context("failed to serialize match record")?;

        conn.set::<_, _, ()>(format!("{}{}", MATCHES_KEY, user_id), payload)
            .await
            .context("failed to persist match record")?;
        Ok(())
    }

    async fn load_matches(&self, user_id: &str) -> Result<Option<MatchRecord>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn
            .get(format!("{}{}", MATCHES_KEY, user_id))
            .await
            .context("failed to load match record")?;

        match raw {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("failed to parse match record")?,
            )),
            None => Ok(None),
        }
    }
}

/// Profile lookup against the user service's redis-cached profiles.
#[derive(Clone)]
pub struct RedisProfileDirectory {
    manager: ConnectionManager,
}

impl RedisProfileDirectory {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ProfileDirectory for RedisProfileDirectory {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn
            .get(format!("{}{}", PROFILE_KEY, user_id))
            .await
            .context("failed to load user profile")?;

        match raw {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("failed to parse user profile")?,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_namespacing() {
        assert_eq!(format!("{}{}", TIER_LIST_KEY, "u1"), "tiermatch:tierlist:u1");
        assert_eq!(format!("{}{}", MATCHES_KEY, "u1"), "tiermatch:matches:u1");
        assert_eq!(format!("{}{}", PROFILE_KEY, "u1"), "tiermatch:profile:u1");
    }
}
