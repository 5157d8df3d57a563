//! HTTP surface. Handlers validate, delegate to the pipeline and
//! serialize; all matching logic lives behind `MatchPipeline`.

use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::TierList;
use crate::services::MatchPipeline;

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    pub match_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchesResponse {
    pub matches: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub trained: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompatibilityResponse {
    pub compatible: bool,
}

/// POST /api/v1/tierlists/{user_id}
///
/// Accept a tier-list submission and run the full pipeline for the
/// submitter.
#[post("/api/v1/tierlists/{user_id}")]
pub async fn submit_tier_list(
    path: web::Path<String>,
    body: web::Json<TierList>,
    pipeline: web::Data<Arc<MatchPipeline>>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    debug!(user_id = %user_id, items = body.len(), "tier list submission");

    let outcome = pipeline.submit(&user_id, body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(SubmitResponse {
        accepted: outcome.stored,
        match_count: outcome.match_count,
    }))
}

/// GET /api/v1/matches/{user_id}
#[get("/api/v1/matches/{user_id}")]
pub async fn get_matches(
    path: web::Path<String>,
    pipeline: web::Data<Arc<MatchPipeline>>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let matches = pipeline.get_matches(&user_id).await;
    let count = matches.len();

    Ok(HttpResponse::Ok().json(MatchesResponse { matches, count }))
}

/// POST /api/v1/matches/rescan
///
/// Bulk re-scan across every known user; same-day cached results are
/// skipped.
#[post("/api/v1/matches/rescan")]
pub async fn trigger_rescan(pipeline: web::Data<Arc<MatchPipeline>>) -> Result<HttpResponse> {
    let outcome = pipeline.rescan_all().await;
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/v1/model/retrain
#[post("/api/v1/model/retrain")]
pub async fn retrain_model(pipeline: web::Data<Arc<MatchPipeline>>) -> Result<HttpResponse> {
    let trained = pipeline.retrain().await;
    Ok(HttpResponse::Ok().json(RetrainResponse { trained }))
}

/// GET /api/v1/compatibility/{user_a}/{user_b} — diagnostic.
#[get("/api/v1/compatibility/{user_a}/{user_b}")]
pub async fn check_compatibility(
    path: web::Path<(String, String)>,
    pipeline: web::Data<Arc<MatchPipeline>>,
) -> Result<HttpResponse> {
    let (user_a, user_b) = path.into_inner();
    let compatible = pipeline.check_compatibility(&user_a, &user_b).await?;

    Ok(HttpResponse::Ok().json(CompatibilityResponse { compatible }))
}
