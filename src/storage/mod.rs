//! External-collaborator contracts: durable store and profile directory.
//!
//! The pipeline only ever talks to these traits; the redis implementations
//! back production, the in-memory ones back tests.

mod memory;
mod redis_store;

pub use memory::{InMemoryDirectory, InMemoryStore};
pub use redis_store::{RedisProfileDirectory, RedisStore};

use crate::models::{MatchRecord, StoredTierList, UserProfile};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Durable store for tier lists, embeddings and match results.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn save_tier_list(&self, entry: &StoredTierList) -> Result<()>;
    async fn load_all_tier_lists(&self) -> Result<Vec<StoredTierList>>;
    async fn save_embedding(&self, user_id: &str, vector: &[f32]) -> Result<()>;
    async fn load_all_embeddings(&self) -> Result<HashMap<String, Vec<f32>>>;
    async fn save_matches(&self, user_id: &str, record: &MatchRecord) -> Result<()>;
    async fn load_matches(&self, user_id: &str) -> Result<Option<MatchRecord>>;
}

/// Read-only user profile lookup (gender, partner preference).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
}
