//! In-memory store and directory for tests and local development.

use super::{MatchStore, ProfileDirectory};
use crate::models::{MatchRecord, StoredTierList, UserProfile};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryStore {
    tier_lists: Mutex<HashMap<String, StoredTierList>>,
    embeddings: Mutex<HashMap<String, Vec<f32>>>,
    matches: Mutex<HashMap<String, MatchRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn save_tier_list(&self, entry: &StoredTierList) -> Result<()> {
        self.tier_lists
            .lock()
            .unwrap()
            .insert(entry.user_id.clone(), entry.clone());
        Ok(())
    }

    async fn load_all_tier_lists(&self) -> Result<Vec<StoredTierList>> {
        Ok(self.tier_lists.lock().unwrap().values().cloned().collect())
    }

    async fn save_embedding(&self, user_id: &str, vector: &[f32]) -> Result<()> {
        self.embeddings
            .lock()
            .unwrap()
            .insert(user_id.to_string(), vector.to_vec());
        Ok(())
    }

    async fn load_all_embeddings(&self) -> Result<HashMap<String, Vec<f32>>> {
        Ok(self.embeddings.lock().unwrap().clone())
    }

    async fn save_matches(&self, user_id: &str, record: &MatchRecord) -> Result<()> {
        self.matches
            .lock()
            .unwrap()
            .insert(user_id.to_string(), record.clone());
        Ok(())
    }

    async fn load_matches(&self, user_id: &str) -> Result<Option<MatchRecord>> {
        Ok(self.matches.lock().unwrap().get(user_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    profiles: Mutex<HashMap<String, UserProfile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: &str, gender: &str, preference: &str) {
        self.profiles.lock().unwrap().insert(
            user_id.to_string(),
            UserProfile {
                gender: gender.to_string(),
                preference: preference.to_string(),
            },
        );
    }
}

#[async_trait]
impl ProfileDirectory for InMemoryDirectory {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Tier, TierList};
    use chrono::Utc;

    #[tokio::test]
    async fn resubmission_replaces_the_prior_tier_list() {
        let store = InMemoryStore::new();
        let first: TierList = [("zoro".to_string(), Tier::S)].into_iter().collect();
        let second: TierList = [("zoro".to_string(), Tier::F)].into_iter().collect();

        for list in [&first, &second] {
            store
                .save_tier_list(&StoredTierList {
                    user_id: "u1".to_string(),
                    tier_list: list.clone(),
                    submitted_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let all = store.load_all_tier_lists().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tier_list, second);
    }

    #[tokio::test]
    async fn directory_returns_none_for_unknown_user() {
        let directory = InMemoryDirectory::new();
        directory.insert("u1", "female", "male");

        assert!(directory.get_profile("u1").await.unwrap().is_some());
        assert!(directory.get_profile("ghost").await.unwrap().is_none());
    }
}
