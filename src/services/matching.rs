//! Ranked match selection.
//!
//! Same-cluster candidates come first, scanned in the snapshot's stable
//! ascending-user-id order; when they fall short of `top_n` the scan
//! widens to the remaining clusters until the cap is reached. Gender
//! compatibility is authoritative at every stage. Clustering failures and
//! degenerate populations resolve to an empty list — this is a
//! best-effort recommendation path, never a fatal one.

use crate::config::MatchingConfig;
use crate::models::UserProfile;
use crate::services::clustering::cluster_embeddings;
use crate::services::compatibility::compatible;
use crate::storage::ProfileDirectory;
use ndarray::Array1;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

pub struct MatchSelector {
    directory: Arc<dyn ProfileDirectory>,
    config: MatchingConfig,
}

impl MatchSelector {
    pub fn new(directory: Arc<dyn ProfileDirectory>, config: MatchingConfig) -> Self {
        Self { directory, config }
    }

    /// Select matches for `user_id` over the given embedding snapshot.
    ///
    /// The snapshot must be sorted ascending by user id (the state object
    /// guarantees this); candidate order in the result follows discovery
    /// order, same-cluster first.
    pub async fn select_matches(
        &self,
        user_id: &str,
        snapshot: Vec<(String, Array1<f32>)>,
    ) -> Vec<String> {
        if !snapshot.iter().any(|(id, _)| id == user_id) {
            debug!(user_id = %user_id, "no stored embedding, no matches");
            return Vec::new();
        }

        let clusters = match self.run_clustering(snapshot.clone()).await {
            Some(clusters) if !clusters.is_empty() => clusters,
            _ => return Vec::new(),
        };

        let own_cluster = match clusters.get(user_id) {
            Some(&c) => c,
            None => return Vec::new(),
        };

        let profile = match self.lookup_profile(user_id).await {
            Some(p) => p,
            None => {
                debug!(user_id = %user_id, "submitter has no profile, no matches");
                return Vec::new();
            }
        };

        let mut matches = Vec::new();

        // Stage 1: everyone sharing the submitter's cluster.
        for (candidate_id, _) in &snapshot {
            if candidate_id == user_id || clusters.get(candidate_id) != Some(&own_cluster) {
                continue;
            }
            if self.config.cap_same_cluster && matches.len() >= self.config.top_n {
                break;
            }
            if self.candidate_accepts(&profile, candidate_id).await {
                matches.push(candidate_id.clone());
            }
        }

        // Stage 2: cross-cluster fallback, capped at top_n overall.
        if matches.len() < self.config.top_n {
            for (candidate_id, _) in &snapshot {
                if matches.len() >= self.config.top_n {
                    break;
                }
                if candidate_id == user_id || clusters.get(candidate_id) == Some(&own_cluster) {
                    continue;
                }
                if self.candidate_accepts(&profile, candidate_id).await {
                    matches.push(candidate_id.clone());
                }
            }
        }

        debug!(
            user_id = %user_id,
            count = matches.len(),
            cluster = own_cluster,
            "match selection complete"
        );

        matches
    }

    /// Clustering runs on a blocking worker with a bounded wait; a timeout
    /// or panic means "no matches available yet".
    async fn run_clustering(
        &self,
        snapshot: Vec<(String, Array1<f32>)>,
    ) -> Option<HashMap<String, usize>> {
        let threshold = self.config.distance_threshold;
        let task = tokio::task::spawn_blocking(move || cluster_embeddings(&snapshot, threshold));

        match timeout(Duration::from_secs(self.config.cluster_timeout_secs), task).await {
            Ok(Ok(clusters)) => Some(clusters),
            Ok(Err(join_err)) => {
                warn!(error = %join_err, "clustering task failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.cluster_timeout_secs,
                    "clustering timed out"
                );
                None
            }
        }
    }

    async fn lookup_profile(&self, user_id: &str) -> Option<UserProfile> {
        match self.directory.get_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "profile lookup failed");
                None
            }
        }
    }

    async fn candidate_accepts(&self, profile: &UserProfile, candidate_id: &str) -> bool {
        match self.lookup_profile(candidate_id).await {
            Some(candidate) => compatible(
                &profile.gender,
                &profile.preference,
                &candidate.gender,
                &candidate.preference,
            ),
            None => {
                debug!(candidate_id = %candidate_id, "candidate has no profile, skipping");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryDirectory, MockProfileDirectory};
    use ndarray::arr1;

    fn config(top_n: usize, cap_same_cluster: bool) -> MatchingConfig {
        MatchingConfig {
            top_n,
            cap_same_cluster,
            distance_threshold: 1.5,
            ..MatchingConfig::default()
        }
    }

    /// Two tight groups far apart: {a1,a2,a3} and {b1,b2}.
    fn two_group_snapshot() -> Vec<(String, Array1<f32>)> {
        vec![
            ("a1".to_string(), arr1(&[0.0, 0.0])),
            ("a2".to_string(), arr1(&[0.1, 0.0])),
            ("a3".to_string(), arr1(&[0.0, 0.1])),
            ("b1".to_string(), arr1(&[20.0, 20.0])),
            ("b2".to_string(), arr1(&[20.1, 20.0])),
        ]
    }

    fn open_directory(users: &[&str]) -> Arc<InMemoryDirectory> {
        let directory = InMemoryDirectory::new();
        for user in users {
            directory.insert(user, "female", "any");
        }
        Arc::new(directory)
    }

    #[tokio::test]
    async fn same_cluster_candidates_come_first() {
        let directory = open_directory(&["a1", "a2", "a3", "b1", "b2"]);
        let selector = MatchSelector::new(directory, config(5, false));

        let matches = selector.select_matches("a1", two_group_snapshot()).await;
        assert_eq!(matches, vec!["a2", "a3", "b1", "b2"]);
    }

    #[tokio::test]
    async fn fallback_stops_at_top_n() {
        let directory = open_directory(&["a1", "a2", "a3", "b1", "b2"]);
        let selector = MatchSelector::new(directory, config(3, false));

        let matches = selector.select_matches("a1", two_group_snapshot()).await;
        // Two same-cluster matches, one fallback match, then the cap.
        assert_eq!(matches, vec!["a2", "a3", "b1"]);
    }

    #[tokio::test]
    async fn same_cluster_cap_applies_when_configured() {
        let directory = open_directory(&["a1", "a2", "a3", "b1", "b2"]);
        let selector = MatchSelector::new(directory, config(1, true));

        let matches = selector.select_matches("a1", two_group_snapshot()).await;
        assert_eq!(matches, vec!["a2"]);
    }

    #[tokio::test]
    async fn incompatible_candidates_never_appear() {
        let directory = InMemoryDirectory::new();
        directory.insert("a1", "male", "female");
        directory.insert("a2", "male", "female"); // same cluster, mutually excluded
        directory.insert("a3", "female", "male");
        directory.insert("b1", "female", "any");
        directory.insert("b2", "male", "male");
        let selector = MatchSelector::new(Arc::new(directory), config(5, false));

        let matches = selector.select_matches("a1", two_group_snapshot()).await;
        assert_eq!(matches, vec!["a3", "b1"]);
    }

    #[tokio::test]
    async fn missing_own_embedding_yields_empty() {
        let directory = open_directory(&["a1"]);
        let selector = MatchSelector::new(directory, config(5, false));

        let matches = selector.select_matches("ghost", two_group_snapshot()).await;
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn single_user_population_yields_empty() {
        let directory = open_directory(&["a1"]);
        let selector = MatchSelector::new(directory, config(5, false));

        let snapshot = vec![("a1".to_string(), arr1(&[0.0, 0.0]))];
        let matches = selector.select_matches("a1", snapshot).await;
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn missing_submitter_profile_yields_empty() {
        let mut directory = MockProfileDirectory::new();
        directory.expect_get_profile().returning(|_| Ok(None));
        let selector = MatchSelector::new(Arc::new(directory), config(5, false));

        let matches = selector.select_matches("a1", two_group_snapshot()).await;
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn directory_errors_degrade_to_empty() {
        let mut directory = MockProfileDirectory::new();
        directory
            .expect_get_profile()
            .returning(|_| Err(anyhow::anyhow!("directory unavailable")));
        let selector = MatchSelector::new(Arc::new(directory), config(5, false));

        let matches = selector.select_matches("a1", two_group_snapshot()).await;
        assert!(matches.is_empty());
    }
}
