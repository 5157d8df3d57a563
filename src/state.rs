//! Process-wide shared state for the matching pipeline.
//!
//! Explicit context object instead of ambient globals: the vocabulary
//! model lives in a single swap-only slot, and the per-user maps give
//! entry-level atomic updates. Everything here is shared between the
//! HTTP submission path and the periodic rescan job.

use crate::models::{MatchRecord, TierList};
use crate::services::vocab::ItemVocabModel;
use dashmap::DashMap;
use ndarray::Array1;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub struct AppState {
    /// Current vocabulary model. Replaced wholesale, never mutated in
    /// place: readers mid-computation keep their `Arc` to the old model.
    model: RwLock<Option<Arc<ItemVocabModel>>>,
    /// Serializes training runs; the slot above is still swapped atomically.
    train_lock: Mutex<()>,
    /// In-process mirror of every persisted tier list, so training can
    /// always see the full population even when the store is flaky.
    tier_lists: DashMap<String, TierList>,
    embeddings: DashMap<String, Array1<f32>>,
    match_cache: DashMap<String, MatchRecord>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            model: RwLock::new(None),
            train_lock: Mutex::new(()),
            tier_lists: DashMap::new(),
            embeddings: DashMap::new(),
            match_cache: DashMap::new(),
        }
    }

    pub async fn model(&self) -> Option<Arc<ItemVocabModel>> {
        self.model.read().await.clone()
    }

    pub async fn set_model(&self, model: Arc<ItemVocabModel>) {
        *self.model.write().await = Some(model);
    }

    pub async fn lock_training(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.train_lock.lock().await
    }

    pub fn insert_tier_list(&self, user_id: &str, tier_list: TierList) {
        self.tier_lists.insert(user_id.to_string(), tier_list);
    }

    pub fn tier_lists_snapshot(&self) -> Vec<TierList> {
        self.tier_lists.iter().map(|e| e.value().clone()).collect()
    }

    pub fn tier_list_entries(&self) -> Vec<(String, TierList)> {
        self.tier_lists
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn has_tier_lists(&self) -> bool {
        !self.tier_lists.is_empty()
    }

    pub fn insert_embedding(&self, user_id: &str, embedding: Array1<f32>) {
        self.embeddings.insert(user_id.to_string(), embedding);
    }

    /// Snapshot of all user embeddings, sorted ascending by user id.
    /// This ordering is the documented stable scan order for clustering
    /// and match selection.
    pub fn embeddings_snapshot(&self) -> Vec<(String, Array1<f32>)> {
        let mut snapshot: Vec<(String, Array1<f32>)> = self
            .embeddings
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    pub fn known_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.embeddings.iter().map(|e| e.key().clone()).collect();
        users.sort();
        users
    }

    pub fn has_embedding(&self, user_id: &str) -> bool {
        self.embeddings.contains_key(user_id)
    }

    /// Cache a match record unless a newer one is already present.
    /// Last-writer-wins by `computed_at`; returns whether the record was
    /// applied.
    pub fn upsert_matches(&self, user_id: &str, record: MatchRecord) -> bool {
        match self.match_cache.entry(user_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                if record.computed_at >= existing.get().computed_at {
                    existing.insert(record);
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    pub fn cached_matches(&self, user_id: &str) -> Option<MatchRecord> {
        self.match_cache.get(user_id).map(|r| r.value().clone())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ndarray::arr1;

    #[test]
    fn snapshot_is_sorted_by_user_id() {
        let state = AppState::new();
        state.insert_embedding("zoe", arr1(&[1.0]));
        state.insert_embedding("amy", arr1(&[2.0]));
        state.insert_embedding("mia", arr1(&[3.0]));

        let ids: Vec<String> = state
            .embeddings_snapshot()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["amy", "mia", "zoe"]);
    }

    #[test]
    fn stale_match_record_does_not_overwrite_newer_one() {
        let state = AppState::new();

        let fresh = MatchRecord::new(vec!["u2".to_string()]);
        let stale = MatchRecord {
            matches: vec!["u3".to_string()],
            computed_at: Utc::now() - Duration::hours(2),
        };

        assert!(state.upsert_matches("u1", fresh.clone()));
        assert!(!state.upsert_matches("u1", stale));
        assert_eq!(state.cached_matches("u1").unwrap().matches, fresh.matches);
    }

    #[tokio::test]
    async fn model_slot_swaps_whole_reference() {
        let state = AppState::new();
        assert!(state.model().await.is_none());

        let lists = vec![[("zoro".to_string(), crate::models::Tier::S)]
            .into_iter()
            .collect()];
        let model = ItemVocabModel::train(&lists, &crate::config::MatchingConfig::default())
            .map(Arc::new)
            .unwrap();

        state.set_model(model.clone()).await;
        let seen = state.model().await.unwrap();
        assert_eq!(seen.vocab_len(), model.vocab_len());
    }
}
