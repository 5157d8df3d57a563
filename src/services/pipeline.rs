//! Pipeline orchestration.
//!
//! Per-submission flow: persist the tier list, lazily train the
//! vocabulary model, recompute the submitter's embedding, then select,
//! persist and publish matches. Each step is isolated: a collaborator
//! failure is logged and the remaining steps still run. A bulk rescan
//! entry point repeats the selection step for every known user, skipping
//! users whose cached result is from the same day.

use crate::config::MatchingConfig;
use crate::error::{AppError, Result as ApiResult};
use crate::events::MatchEventPublisher;
use crate::models::{
    MatchRecord, RescanOutcome, StoredTierList, SubmitOutcome, TierList,
};
use crate::services::compatibility::compatible;
use crate::services::embedding::embed_tier_list;
use crate::services::matching::MatchSelector;
use crate::services::vocab::ItemVocabModel;
use crate::state::AppState;
use crate::storage::{MatchStore, ProfileDirectory};
use chrono::Utc;
use ndarray::Array1;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct MatchPipeline {
    store: Arc<dyn MatchStore>,
    directory: Arc<dyn ProfileDirectory>,
    publisher: Arc<dyn MatchEventPublisher>,
    state: Arc<AppState>,
    selector: MatchSelector,
    config: MatchingConfig,
}

impl MatchPipeline {
    pub fn new(
        store: Arc<dyn MatchStore>,
        directory: Arc<dyn ProfileDirectory>,
        publisher: Arc<dyn MatchEventPublisher>,
        state: Arc<AppState>,
        config: MatchingConfig,
    ) -> Self {
        let selector = MatchSelector::new(directory.clone(), config.clone());
        Self {
            store,
            directory,
            publisher,
            state,
            selector,
            config,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Reload persisted tier lists and embeddings into the in-process
    /// state. Called once at startup.
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        let tier_lists = self.store.load_all_tier_lists().await?;
        let tier_list_count = tier_lists.len();
        for entry in tier_lists {
            self.state.insert_tier_list(&entry.user_id, entry.tier_list);
        }

        let embeddings = self.store.load_all_embeddings().await?;
        let embedding_count = embeddings.len();
        for (user_id, vector) in embeddings {
            self.state
                .insert_embedding(&user_id, Array1::from_vec(vector));
        }

        info!(
            tier_lists = tier_list_count,
            embeddings = embedding_count,
            "pipeline state bootstrapped from store"
        );
        Ok(())
    }

    /// Handle one tier-list submission end to end.
    pub async fn submit(&self, user_id: &str, tier_list: TierList) -> ApiResult<SubmitOutcome> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("user id must not be empty".into()));
        }

        // Step 1: persist the raw tier list. The in-process mirror is
        // updated regardless so later steps see the submission.
        let stored = match self
            .store
            .save_tier_list(&StoredTierList {
                user_id: user_id.to_string(),
                tier_list: tier_list.clone(),
                submitted_at: Utc::now(),
            })
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "failed to persist tier list");
                false
            }
        };
        self.state.insert_tier_list(user_id, tier_list.clone());

        // Step 2: train the vocabulary model if none exists yet.
        if self.state.model().await.is_none() {
            self.train_model().await;
        }

        // Step 3: recompute and persist the submitter's embedding.
        let model = self.state.model().await;
        let embedding = embed_tier_list(&tier_list, model.as_deref(), self.config.vector_size);
        self.state.insert_embedding(user_id, embedding.clone());
        if let Err(e) = self
            .store
            .save_embedding(user_id, embedding.as_slice().unwrap_or(&[]))
            .await
        {
            warn!(user_id = %user_id, error = %e, "failed to persist embedding");
        }

        // Step 4: select, persist and publish matches.
        let matches = self.compute_and_store_matches(user_id).await;

        Ok(SubmitOutcome {
            stored,
            match_count: matches.len(),
        })
    }

    /// Retrain the model from every tier list seen so far. Returns whether
    /// a model is available afterwards.
    pub async fn retrain(&self) -> bool {
        self.train_model().await;
        self.state.model().await.is_some()
    }

    /// Re-run match selection for every known user, skipping users whose
    /// cached result is from today.
    pub async fn rescan_all(&self) -> RescanOutcome {
        let mut outcome = RescanOutcome::default();
        let now = Utc::now();

        for user_id in self.state.known_users() {
            if let Some(record) = self.state.cached_matches(&user_id) {
                if record.is_same_day_as(now) {
                    debug!(user_id = %user_id, "same-day match result cached, skipping");
                    continue;
                }
            }

            outcome.processed_count += 1;
            let matches = self.compute_and_store_matches(&user_id).await;
            outcome.new_match_count += matches.len();
        }

        info!(
            processed = outcome.processed_count,
            new_matches = outcome.new_match_count,
            "rescan pass complete"
        );
        outcome
    }

    /// Current matches for a user: in-process cache first, store second.
    pub async fn get_matches(&self, user_id: &str) -> Vec<String> {
        if let Some(record) = self.state.cached_matches(user_id) {
            return record.matches;
        }

        match self.store.load_matches(user_id).await {
            Ok(Some(record)) => {
                let matches = record.matches.clone();
                self.state.upsert_matches(user_id, record);
                matches
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "failed to load persisted matches");
                Vec::new()
            }
        }
    }

    /// Diagnostic mutual-compatibility check between two users.
    pub async fn check_compatibility(&self, user_a: &str, user_b: &str) -> ApiResult<bool> {
        let a = self
            .directory
            .get_profile(user_a)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound(format!("profile for {}", user_a)))?;
        let b = self
            .directory
            .get_profile(user_b)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound(format!("profile for {}", user_b)))?;

        Ok(compatible(&a.gender, &a.preference, &b.gender, &b.preference))
    }

    /// Train from the full in-process tier list population and swap the
    /// model slot. Training failure leaves the current model untouched.
    async fn train_model(&self) {
        let _guard = self.state.lock_training().await;

        if !self.state.has_tier_lists() {
            debug!("no tier lists yet, skipping training");
            return;
        }

        let tier_lists = self.state.tier_lists_snapshot();
        let params = self.config.clone();

        let trained =
            tokio::task::spawn_blocking(move || ItemVocabModel::train(&tier_lists, &params)).await;

        match trained {
            Ok(Some(model)) => {
                let model = Arc::new(model);
                self.state.set_model(model.clone()).await;
                self.reembed_all(&model).await;
            }
            Ok(None) => debug!("training data produced no non-empty tier groups"),
            Err(e) => error!(error = %e, "model training task failed"),
        }
    }

    /// Recompute every user's embedding in the new model's vector space.
    /// Embeddings from different models must never coexist in the map, or
    /// clustering distances stop meaning anything.
    async fn reembed_all(&self, model: &ItemVocabModel) {
        for (user_id, tier_list) in self.state.tier_list_entries() {
            let embedding = embed_tier_list(&tier_list, Some(model), self.config.vector_size);
            self.state.insert_embedding(&user_id, embedding.clone());
            if let Err(e) = self
                .store
                .save_embedding(&user_id, embedding.as_slice().unwrap_or(&[]))
                .await
            {
                warn!(user_id = %user_id, error = %e, "failed to persist recomputed embedding");
            }
        }
    }

    /// Selection + persistence + publication for one user. Failures in the
    /// persistence or publication legs never suppress each other.
    async fn compute_and_store_matches(&self, user_id: &str) -> Vec<String> {
        let snapshot = self.state.embeddings_snapshot();
        let matches = self.selector.select_matches(user_id, snapshot).await;

        let record = MatchRecord::new(matches.clone());
        let applied = self.state.upsert_matches(user_id, record.clone());
        if !applied {
            debug!(user_id = %user_id, "newer match record already cached");
        }

        if let Err(e) = self.store.save_matches(user_id, &record).await {
            warn!(user_id = %user_id, error = %e, "failed to persist match record");
        }

        for match_id in &matches {
            self.publish_with_retry(user_id, match_id).await;
        }

        matches
    }

    /// One bounded local retry, then give up with a log line.
    async fn publish_with_retry(&self, user_id: &str, match_id: &str) {
        if self.publisher.publish(user_id, match_id).await.is_ok() {
            return;
        }

        warn!(user_id = %user_id, match_id = %match_id, "publish failed, retrying once");
        if let Err(e) = self.publisher.publish(user_id, match_id).await {
            error!(
                user_id = %user_id,
                match_id = %match_id,
                error = %e,
                "match event dropped after retry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopPublisher;
    use crate::models::Tier;
    use crate::storage::{InMemoryDirectory, InMemoryStore};

    fn pipeline() -> (MatchPipeline, Arc<InMemoryDirectory>) {
        let directory = Arc::new(InMemoryDirectory::new());
        let config = MatchingConfig {
            vector_size: 16,
            train_epochs: 10,
            ..MatchingConfig::default()
        };
        let pipeline = MatchPipeline::new(
            Arc::new(InMemoryStore::new()),
            directory.clone(),
            Arc::new(NoopPublisher),
            Arc::new(AppState::new()),
            config,
        );
        (pipeline, directory)
    }

    fn list(entries: &[(&str, Tier)]) -> TierList {
        entries
            .iter()
            .map(|(item, tier)| (item.to_string(), *tier))
            .collect()
    }

    #[tokio::test]
    async fn empty_user_id_is_rejected() {
        let (pipeline, _) = pipeline();
        let result = pipeline.submit("  ", list(&[("zoro", Tier::S)])).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn empty_tier_list_degrades_to_zero_embedding() {
        let (pipeline, _) = pipeline();
        let outcome = pipeline.submit("u1", TierList::new()).await.unwrap();

        assert!(outcome.stored);
        let snapshot = pipeline.state().embeddings_snapshot();
        let (_, embedding) = snapshot.iter().find(|(id, _)| id == "u1").unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn first_submission_trains_a_model() {
        let (pipeline, directory) = pipeline();
        directory.insert("u1", "female", "any");

        assert!(pipeline.state().model().await.is_none());
        let outcome = pipeline
            .submit("u1", list(&[("zoro", Tier::S), ("nami", Tier::A)]))
            .await
            .unwrap();

        assert!(outcome.stored);
        assert_eq!(outcome.match_count, 0); // only one user so far
        assert!(pipeline.state().model().await.is_some());
        assert!(pipeline.state().has_embedding("u1"));
    }

    #[tokio::test]
    async fn retrain_reports_model_availability() {
        let (pipeline, _) = pipeline();
        assert!(!pipeline.retrain().await); // nothing to train on yet

        pipeline
            .submit("u1", list(&[("zoro", Tier::S)]))
            .await
            .unwrap();
        assert!(pipeline.retrain().await);
    }

    #[tokio::test]
    async fn retrain_recomputes_embeddings_in_the_new_vector_space() {
        let (pipeline, _) = pipeline();
        pipeline
            .submit("u1", list(&[("zoro", Tier::S), ("nami", Tier::A)]))
            .await
            .unwrap();
        // u2's items are absent from the lazily trained vocabulary, so the
        // embedding computed at submission time is the zero vector.
        let u2_list = list(&[("brook", Tier::S), ("jinbe", Tier::B)]);
        pipeline.submit("u2", u2_list.clone()).await.unwrap();

        assert!(pipeline.retrain().await);

        let model = pipeline.state().model().await.unwrap();
        let expected = embed_tier_list(&u2_list, Some(model.as_ref()), 16);
        let snapshot = pipeline.state().embeddings_snapshot();
        let (_, stored) = snapshot.iter().find(|(id, _)| id == "u2").unwrap();

        assert_eq!(stored.to_vec(), expected.to_vec());
        assert!(stored.iter().any(|&x| x != 0.0));
    }

    #[tokio::test]
    async fn compatibility_check_requires_both_profiles() {
        let (pipeline, directory) = pipeline();
        directory.insert("u1", "male", "female");

        let missing = pipeline.check_compatibility("u1", "ghost").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        directory.insert("u2", "female", "male");
        assert!(pipeline.check_compatibility("u1", "u2").await.unwrap());
    }

    #[tokio::test]
    async fn matches_fall_back_to_store_after_cache_miss() {
        let (pipeline, _) = pipeline();
        let record = MatchRecord::new(vec!["u9".to_string()]);
        pipeline.store.save_matches("u1", &record).await.unwrap();

        assert_eq!(pipeline.get_matches("u1").await, vec!["u9"]);
        // Second read is served from the warmed cache.
        assert!(pipeline.state().cached_matches("u1").is_some());
    }
}
