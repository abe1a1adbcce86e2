use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::{OnboardingPreferences, Product, SwipeOutcome};
use crate::services::{
    InMemoryAssignmentStore, InMemoryCatalog, InMemoryProfileStore, InMemorySwipeLedger,
    RecommendationEngine,
};

pub type AppEngine = RecommendationEngine<
    InMemoryCatalog,
    InMemorySwipeLedger,
    InMemoryProfileStore,
    InMemoryAssignmentStore,
>;

pub struct EngineHandlerState {
    pub engine: Arc<AppEngine>,
}

fn default_limit() -> usize {
    20
}

#[derive(Deserialize)]
pub struct RecommendationQuery {
    pub session_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Serialize)]
pub struct RecommendationResponse {
    pub products: Vec<Product>,
    pub count: usize,
}

#[get("/api/v1/recommendations/{user_id}")]
pub async fn get_recommendations(
    state: web::Data<EngineHandlerState>,
    path: web::Path<String>,
    query: web::Query<RecommendationQuery>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let limit = query.limit.clamp(1, 100);

    debug!(user_id = %user_id, limit = limit, "Recommendation request");

    let products = state
        .engine
        .get_recommendations(&user_id, &query.session_id, limit)
        .await?;

    let count = products.len();
    Ok(HttpResponse::Ok().json(RecommendationResponse { products, count }))
}

#[derive(Deserialize)]
pub struct SwipeRequest {
    pub user_id: String,
    pub session_id: String,
    pub product_id: String,
    pub outcome: SwipeOutcome,
    pub latency_ms: Option<u32>,
}

#[derive(Serialize)]
pub struct SwipeResponse {
    pub recorded: bool,
    pub suggest_break: bool,
}

#[post("/api/v1/swipes")]
pub async fn record_swipe(
    state: web::Data<EngineHandlerState>,
    body: web::Json<SwipeRequest>,
) -> Result<HttpResponse> {
    let ack = state
        .engine
        .record_swipe(
            &body.user_id,
            &body.session_id,
            &body.product_id,
            body.outcome,
            body.latency_ms,
        )
        .await?;

    Ok(HttpResponse::Ok().json(SwipeResponse {
        recorded: ack.recorded,
        suggest_break: ack.suggest_break,
    }))
}

#[derive(Serialize)]
pub struct VariantResponse {
    pub experiment: String,
    pub variant: String,
}

#[get("/api/v1/experiments/{experiment}/variant/{user_id}")]
pub async fn get_experiment_variant(
    state: web::Data<EngineHandlerState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (experiment, user_id) = path.into_inner();

    let variant = state
        .engine
        .get_experiment_variant(&user_id, &experiment)
        .await?;

    Ok(HttpResponse::Ok().json(VariantResponse {
        experiment,
        variant,
    }))
}

#[derive(Serialize)]
pub struct OnboardingResponse {
    pub saved: bool,
}

#[post("/api/v1/users/{user_id}/onboarding")]
pub async fn save_onboarding(
    state: web::Data<EngineHandlerState>,
    path: web::Path<String>,
    body: web::Json<OnboardingPreferences>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();

    state
        .engine
        .save_onboarding(&user_id, body.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(OnboardingResponse { saved: true }))
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "personalization-service"
    }))
}
