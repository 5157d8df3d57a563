use actix_web::{web, App, HttpServer};
use redis::aio::ConnectionManager;
use std::io;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tiermatch_service::events::{
    KafkaMatchPublisher, KafkaPublisherConfig, MatchEventPublisher, NoopPublisher,
};
use tiermatch_service::handlers::{
    check_compatibility, get_matches, retrain_model, submit_tier_list, trigger_rescan,
};
use tiermatch_service::jobs::RescanJob;
use tiermatch_service::storage::{RedisProfileDirectory, RedisStore};
use tiermatch_service::{AppState, Config, MatchPipeline};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,actix_web=debug".into()))
        .init();

    // Load config
    let config = Config::from_env().expect("Failed to load config");

    info!(
        "Starting {} v{} on HTTP:{}",
        config.service.service_name,
        env!("CARGO_PKG_VERSION"),
        config.service.http_port
    );

    // Redis connection shared by store and profile directory
    let redis_client =
        redis::Client::open(config.redis.url.clone()).expect("Failed to create Redis client");
    let redis_manager = ConnectionManager::new(redis_client)
        .await
        .expect("Failed to initialize Redis connection manager");

    let store = Arc::new(RedisStore::new(redis_manager.clone()));
    let directory = Arc::new(RedisProfileDirectory::new(redis_manager));

    // Match event channel: Kafka when configured, no-op otherwise
    let publisher: Arc<dyn MatchEventPublisher> = match KafkaPublisherConfig::from_env() {
        Some(kafka_config) => match KafkaMatchPublisher::new(&kafka_config) {
            Ok(producer) => Arc::new(producer),
            Err(e) => {
                warn!(error = %e, "Kafka producer init failed, match events disabled");
                Arc::new(NoopPublisher)
            }
        },
        None => {
            info!("KAFKA_BROKERS not set, match events disabled");
            Arc::new(NoopPublisher)
        }
    };

    let state = Arc::new(AppState::new());
    let pipeline = Arc::new(MatchPipeline::new(
        store,
        directory,
        publisher,
        state,
        config.matching.clone(),
    ));

    // Reload persisted tier lists and embeddings
    if let Err(e) = pipeline.bootstrap().await {
        warn!(error = %e, "bootstrap from store failed, starting with empty state");
    }

    // Periodic rescan job
    if config.rescan.enabled {
        let job = RescanJob::new(pipeline.clone(), config.rescan.clone());
        tokio::spawn(job.run());
    }

    let pipeline_data = web::Data::new(pipeline);

    HttpServer::new(move || {
        App::new()
            .app_data(pipeline_data.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            .service(submit_tier_list)
            .service(get_matches)
            .service(trigger_rescan)
            .service(retrain_model)
            .service(check_compatibility)
    })
    .bind(format!("0.0.0.0:{}", config.service.http_port))?
    .run()
    .await
}
