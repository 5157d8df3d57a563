//! Periodic rescan job.
//!
//! Runs the bulk match-selection pass on a timer. Submissions race with
//! this loop by design; the match cache's last-writer-wins rule and the
//! same-day skip keep the two triggers from thrashing each other.

use crate::config::RescanConfig;
use crate::services::MatchPipeline;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::info;

pub struct RescanJob {
    pipeline: Arc<MatchPipeline>,
    config: RescanConfig,
}

impl RescanJob {
    pub fn new(pipeline: Arc<MatchPipeline>, config: RescanConfig) -> Self {
        Self { pipeline, config }
    }

    /// Run forever, one pass per interval.
    pub async fn run(self) {
        info!(
            interval_secs = self.config.interval_secs,
            "rescan job started"
        );

        loop {
            sleep(Duration::from_secs(self.config.interval_secs)).await;

            let started = Instant::now();
            let outcome = self.pipeline.rescan_all().await;

            info!(
                processed = outcome.processed_count,
                new_matches = outcome.new_match_count,
                duration_ms = started.elapsed().as_millis() as u64,
                "rescan job pass completed"
            );
        }
    }
}
