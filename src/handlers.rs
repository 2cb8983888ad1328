use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::enrichment::{EnrichmentQueue, LeadIntelligenceService};
use crate::errors::{AppError, ResultExt};
use crate::matching::{OpportunityMatchingService, DEFAULT_MATCH_LIMIT};
use crate::models::*;
use crate::pipeline::{deal_stages, PipelineMetricsService};
use crate::scoring::LeadScoringService;
use crate::sources::EnrichmentSource;
use crate::store::LeadStore;

/// Largest accepted batch or list size.
pub const MAX_BATCH_SIZE: usize = 100;
const DEFAULT_CATEGORY_LIMIT: usize = 50;

/// Source recorded when a capture does not name one.
const DEFAULT_CAPTURE_SOURCE: &str = "website";
const LEAD_CAPTURE_INTERACTION: &str = "lead_capture";

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LeadStore>,
    pub scoring: LeadScoringService,
    pub intelligence: LeadIntelligenceService,
    pub matching: OpportunityMatchingService,
    pub pipeline: PipelineMetricsService,
    /// Background enrichment for requests that should not wait on lookups.
    pub enrichment_queue: EnrichmentQueue,
}

impl AppState {
    /// Wire every service to one store and start the enrichment worker.
    pub fn new(
        store: Arc<dyn LeadStore>,
        source: Arc<dyn EnrichmentSource>,
        queue_capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let intelligence = LeadIntelligenceService::new(store.clone(), source);
        let (enrichment_queue, worker) =
            EnrichmentQueue::spawn(intelligence.clone(), queue_capacity);

        let state = Self {
            store: store.clone(),
            scoring: LeadScoringService::new(store.clone()),
            intelligence,
            matching: OpportunityMatchingService::new(store.clone()),
            pipeline: PipelineMetricsService::new(store),
            enrichment_queue,
        };
        (state, worker)
    }
}

/// Every `/api/v1` route. Middleware is applied by the caller.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/leads", post(capture_lead))
        .route("/api/v1/leads/score/batch", post(batch_score_leads))
        .route("/api/v1/leads/enrich/batch", post(batch_enrich_leads))
        .route("/api/v1/leads/enrichment/stats", get(enrichment_stats))
        .route("/api/v1/leads/category/:category", get(leads_by_category))
        .route("/api/v1/leads/:id/score", post(score_lead))
        .route("/api/v1/leads/:id/activity", post(record_activity))
        .route("/api/v1/leads/:id/enrich", post(enrich_lead))
        .route("/api/v1/leads/:id/preferences", get(lead_preferences))
        .route("/api/v1/leads/:id/matches", get(lead_matches))
        .route(
            "/api/v1/leads/:id/property-interests",
            post(create_property_interest).get(list_property_interests),
        )
        .route("/api/v1/analytics/scoring-stats", get(scoring_stats))
        .route("/api/v1/analytics/pipeline-metrics", get(pipeline_metrics))
        .route("/api/v1/deal-stages", get(list_deal_stages))
}

fn validate_batch(lead_ids: &[Uuid]) -> Result<(), AppError> {
    if lead_ids.is_empty() {
        return Err(AppError::BadRequest("lead_ids cannot be empty".to_string()));
    }
    if lead_ids.len() > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "At most {} lead_ids per request",
            MAX_BATCH_SIZE
        )));
    }
    Ok(())
}

fn capped_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).min(MAX_BATCH_SIZE)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-lead-intel",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/leads
///
/// A new email is stored and queued for enrichment (201). A known email
/// only moves the existing lead to the new source (200). Both paths record
/// a capture interaction.
pub async fn capture_lead(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewLead>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let mut lead = payload.into_lead()?;
    let source = lead
        .source
        .get_or_insert_with(|| DEFAULT_CAPTURE_SOURCE.to_string())
        .clone();

    if let Some(mut existing) = state.store.find_lead_by_email(&lead.email).await? {
        state.store.save_lead_source(existing.id, &source).await?;
        existing.source = Some(source.clone());
        record_capture(state.store.as_ref(), existing.id, &source, false).await?;
        tracing::info!("Lead {} captured again from {}", existing.id, source);

        return Ok((
            StatusCode::OK,
            Json(json!({
                "lead": existing,
                "is_new": false,
                "enrichment_queued": false
            })),
        ));
    }

    state.store.create_lead(&lead).await?;
    record_capture(state.store.as_ref(), lead.id, &source, true).await?;
    tracing::info!("Captured lead {} from {}", lead.id, source);

    let queued = state.enrichment_queue.submit(lead.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "lead": lead,
            "is_new": true,
            "enrichment_queued": queued
        })),
    ))
}

async fn record_capture(
    store: &dyn LeadStore,
    lead_id: Uuid,
    source: &str,
    is_new: bool,
) -> Result<(), AppError> {
    let mut interaction = NewInteraction::new(lead_id, LEAD_CAPTURE_INTERACTION);
    interaction.method = Some(source.to_string());
    interaction.notes = Some(if is_new {
        format!("New lead captured from {}", source)
    } else {
        format!("Lead captured from {}", source)
    });

    store
        .create_interaction(interaction)
        .await
        .with_context(|| format!("Recording capture for lead {}", lead_id))?;
    Ok(())
}

/// POST /api/v1/leads/:id/score
pub async fn score_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadScore>, AppError> {
    tracing::info!("POST /leads/{}/score", id);
    Ok(Json(state.scoring.compute_score(id).await?))
}

/// POST /api/v1/leads/score/batch
///
/// Leads that fail to score are left out of the response.
pub async fn batch_score_leads(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BatchLeadRequest>,
) -> Result<Json<Vec<LeadScoreResult>>, AppError> {
    validate_batch(&payload.lead_ids)?;
    tracing::info!("POST /leads/score/batch - {} leads", payload.lead_ids.len());

    Ok(Json(
        state.scoring.batch_compute_score(&payload.lead_ids).await,
    ))
}

/// POST /api/v1/leads/:id/activity
pub async fn record_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActivityRequest>,
) -> Result<Json<LeadScore>, AppError> {
    if payload.activity_type.trim().is_empty() {
        return Err(AppError::BadRequest(
            "activity_type cannot be empty".to_string(),
        ));
    }
    tracing::info!("POST /leads/{}/activity - {}", id, payload.activity_type);

    let score = state
        .scoring
        .recompute_on_activity(id, payload.activity_type.trim(), payload.activity_data)
        .await?;
    Ok(Json(score))
}

/// POST /api/v1/leads/:id/enrich
///
/// Queues the lead and returns immediately with 202.
pub async fn enrich_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<serde_json::Value>) {
    let queued = state.enrichment_queue.submit(id);
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "lead_id": id,
            "queued": queued
        })),
    )
}

/// POST /api/v1/leads/enrich/batch
pub async fn batch_enrich_leads(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BatchLeadRequest>,
) -> Result<Json<BatchEnrichmentSummary>, AppError> {
    validate_batch(&payload.lead_ids)?;
    tracing::info!("POST /leads/enrich/batch - {} leads", payload.lead_ids.len());

    Ok(Json(
        state.intelligence.batch_enrich_leads(&payload.lead_ids).await,
    ))
}

/// GET /api/v1/leads/enrichment/stats
pub async fn enrichment_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PriorityStat>>, AppError> {
    Ok(Json(state.intelligence.enrichment_stats().await?))
}

/// GET /api/v1/leads/:id/preferences
pub async fn lead_preferences(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadInterests>, AppError> {
    Ok(Json(state.matching.get_lead_preferences(id).await?))
}

/// GET /api/v1/leads/:id/matches?limit=
pub async fn lead_matches(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<PropertyMatch>>, AppError> {
    let limit = capped_limit(params.limit, DEFAULT_MATCH_LIMIT);
    tracing::info!("GET /leads/{}/matches - limit {}", id, limit);

    Ok(Json(state.matching.find_matches(id, limit).await?))
}

/// POST /api/v1/leads/:id/property-interests
pub async fn create_property_interest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PropertyInterestRequest>,
) -> Result<(StatusCode, Json<PropertyInterest>), AppError> {
    let created = state
        .matching
        .create_property_interest(id, payload.property_id, payload.interest, payload.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/leads/:id/property-interests
pub async fn list_property_interests(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PropertyInterest>>, AppError> {
    Ok(Json(state.matching.lead_property_interests(id).await?))
}

/// GET /api/v1/leads/category/:category?limit=
pub async fn leads_by_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<Lead>>, AppError> {
    let category: ScoreCategory = category.parse()?;
    let limit = capped_limit(params.limit, DEFAULT_CATEGORY_LIMIT);

    Ok(Json(state.scoring.leads_by_category(category, limit).await?))
}

/// GET /api/v1/analytics/scoring-stats
pub async fn scoring_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ScoreCategoryStat>>, AppError> {
    Ok(Json(state.scoring.scoring_stats().await?))
}

/// GET /api/v1/analytics/pipeline-metrics
pub async fn pipeline_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PipelineMetrics>, AppError> {
    Ok(Json(state.pipeline.get_pipeline_metrics().await?))
}

/// GET /api/v1/deal-stages
pub async fn list_deal_stages() -> Json<&'static [DealStage]> {
    Json(deal_stages())
}
