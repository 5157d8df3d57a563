//! Match event publication.
//!
//! Each computed pair is announced on a Kafka topic for downstream
//! consumers (chat bootstrap, notifications). Delivery is best-effort:
//! the pipeline retries once locally and never fails a submission over a
//! publish error.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Wire format for one "user X matched with user Y" event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEvent {
    pub event_id: Uuid,
    pub user_id: String,
    pub match_id: String,
    pub matched_at: DateTime<Utc>,
}

#[async_trait]
pub trait MatchEventPublisher: Send + Sync {
    async fn publish(&self, user_id: &str, match_id: &str) -> Result<()>;
}

/// Kafka producer configuration, absent when no brokers are configured.
#[derive(Debug, Clone)]
pub struct KafkaPublisherConfig {
    pub brokers: String,
    pub topic: String,
}

impl KafkaPublisherConfig {
    pub fn from_env() -> Option<Self> {
        let brokers = std::env::var("KAFKA_BROKERS").ok()?;
        if brokers.trim().is_empty() {
            return None;
        }

        Some(Self {
            brokers,
            topic: std::env::var("KAFKA_MATCH_TOPIC")
                .unwrap_or_else(|_| "tiermatch.matches".to_string()),
        })
    }
}

pub struct KafkaMatchPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaMatchPublisher {
    pub fn new(config: &KafkaPublisherConfig) -> Result<Self> {
        let producer = rdkafka::config::ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", "tiermatch-service")
            .set("acks", "all")
            .set("retries", "3")
            .set("linger.ms", "5")
            .create::<FutureProducer>()?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            "match event Kafka producer initialized"
        );

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl MatchEventPublisher for KafkaMatchPublisher {
    async fn publish(&self, user_id: &str, match_id: &str) -> Result<()> {
        let event = MatchEvent {
            event_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            match_id: match_id.to_string(),
            matched_at: Utc::now(),
        };

        let payload = serde_json::to_string(&event)?;
        let record = FutureRecord::to(&self.topic).key(user_id).payload(&payload);

        match self.producer.send(record, Duration::from_secs(5)).await {
            Ok(_) => {
                info!(
                    user_id = %user_id,
                    match_id = %match_id,
                    topic = %self.topic,
                    "published match event"
                );
                Ok(())
            }
            Err((err, _)) => {
                warn!(
                    error = ?err,
                    user_id = %user_id,
                    match_id = %match_id,
                    "failed to publish match event"
                );
                Err(anyhow::anyhow!("failed to publish match event: {}", err))
            }
        }
    }
}

/// Used when Kafka is not configured; publishes nowhere, succeeds always.
pub struct NoopPublisher;

#[async_trait]
impl MatchEventPublisher for NoopPublisher {
    async fn publish(&self, user_id: &str, match_id: &str) -> Result<()> {
        tracing::debug!(
            user_id = %user_id,
            match_id = %match_id,
            "kafka not configured, dropping match event"
        );
        Ok(())
    }
}
