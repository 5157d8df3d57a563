use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub matching: MatchingConfig,
    pub rescan: RescanConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub http_port: u16,
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Item/user embedding dimensionality.
    pub vector_size: usize,
    /// Symmetric skip-gram context window within a tier group.
    pub context_window: usize,
    /// Full passes over the tier-group corpus per training run.
    pub train_epochs: usize,
    /// Seed for the trainer so retraining on identical data reproduces
    /// the same artifact.
    pub train_seed: u64,
    /// Ward-linkage merge stopping threshold. Observed values 1.0-1.5;
    /// tunable, not a constant.
    pub distance_threshold: f32,
    /// Soft cap applied to the cross-cluster fallback stage.
    pub top_n: usize,
    /// When true, `top_n` also caps the same-cluster stage.
    pub cap_same_cluster: bool,
    /// Bounded wait for the clustering pass before declaring
    /// "no matches available yet".
    pub cluster_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescanConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            service: ServiceConfig {
                http_port: env::var("HTTP_PORT")
                    .unwrap_or_else(|_| "8014".to_string())
                    .parse()
                    .expect("HTTP_PORT must be a valid u16"),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "tiermatch-service".to_string()),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            matching: MatchingConfig::from_env(),
            rescan: RescanConfig {
                enabled: env::var("RESCAN_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .expect("RESCAN_ENABLED must be a valid bool"),
                interval_secs: env::var("RESCAN_INTERVAL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .expect("RESCAN_INTERVAL_SECS must be a valid u64"),
            },
        })
    }
}

impl MatchingConfig {
    pub fn from_env() -> Self {
        Self {
            vector_size: env::var("VECTOR_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .expect("VECTOR_SIZE must be a valid usize"),
            context_window: env::var("CONTEXT_WINDOW")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("CONTEXT_WINDOW must be a valid usize"),
            train_epochs: env::var("TRAIN_EPOCHS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .expect("TRAIN_EPOCHS must be a valid usize"),
            train_seed: env::var("TRAIN_SEED")
                .unwrap_or_else(|_| "42".to_string())
                .parse()
                .expect("TRAIN_SEED must be a valid u64"),
            distance_threshold: env::var("DISTANCE_THRESHOLD")
                .unwrap_or_else(|_| "1.5".to_string())
                .parse()
                .expect("DISTANCE_THRESHOLD must be a valid f32"),
            top_n: env::var("TOP_N_MATCHES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("TOP_N_MATCHES must be a valid usize"),
            cap_same_cluster: env::var("CAP_SAME_CLUSTER")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .expect("CAP_SAME_CLUSTER must be a valid bool"),
            cluster_timeout_secs: env::var("CLUSTER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("CLUSTER_TIMEOUT_SECS must be a valid u64"),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            vector_size: 50,
            context_window: 5,
            train_epochs: 50,
            train_seed: 42,
            distance_threshold: 1.5,
            top_n: 5,
            cap_same_cluster: false,
            cluster_timeout_secs: 10,
        }
    }
}
