mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use common::*;
use rust_lead_intel::handlers::{self, AppState};
use rust_lead_intel::memory_store::MemoryStore;
use rust_lead_intel::sources::SimulatedSource;
use rust_lead_intel::store::LeadStore;

fn app(store: Arc<MemoryStore>) -> Router {
    let (state, _worker) = AppState::new(store, Arc::new(SimulatedSource::new(false)), 16);
    Router::new()
        .route("/health", get(handlers::health))
        .merge(handlers::api_routes())
        .with_state(Arc::new(state))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send(app(store_with(vec![]).await), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn captured_lead_is_stored_and_queued() {
    let store = store_with(vec![]).await;

    let (status, body) = send(
        app(store.clone()),
        "POST",
        "/api/v1/leads",
        Some(json!({
            "email": "new@example.com",
            "company": "Bayou Builders",
            "budget": "$500K - $2M",
            "interests": ["Commercial zoning"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["enrichment_queued"], true);

    let id: Uuid = body["lead"]["id"].as_str().unwrap().parse().unwrap();
    let (status, body) = send(app(store.clone()), "GET", &format!("/api/v1/leads/{}/preferences", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zoning_preferences"], json!(["Commercial"]));

    let (status, _) = send(app(store), "POST", "/api/v1/leads", Some(json!({ "email": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeat_capture_updates_the_existing_lead() {
    let store = store_with(vec![]).await;

    let (status, first) = send(
        app(store.clone()),
        "POST",
        "/api/v1/leads",
        Some(json!({ "email": "repeat@example.com", "source": "roi_calculator" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["is_new"], true);

    let (status, second) = send(
        app(store.clone()),
        "POST",
        "/api/v1/leads",
        Some(json!({ "email": "Repeat@Example.com", "source": "market_report" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["is_new"], false);
    assert_eq!(second["enrichment_queued"], false);
    assert_eq!(second["lead"]["id"], first["lead"]["id"]);
    assert_eq!(second["lead"]["source"], "market_report");

    let id: Uuid = first["lead"]["id"].as_str().unwrap().parse().unwrap();
    let stored = store.find_lead(id).await.unwrap().unwrap();
    assert_eq!(stored.source.as_deref(), Some("market_report"));
    assert_eq!(stored.email, "repeat@example.com");

    let captures: Vec<String> = store
        .list_interactions(id)
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.interaction_type == "lead_capture")
        .filter_map(|i| i.notes)
        .collect();
    assert_eq!(
        captures,
        vec![
            "New lead captured from roi_calculator".to_string(),
            "Lead captured from market_report".to_string(),
        ]
    );
}

#[tokio::test]
async fn captured_lead_is_enriched_once_the_router_shuts_down() {
    let store = store_with(vec![]).await;
    let (state, worker) = AppState::new(store.clone(), Arc::new(SimulatedSource::new(false)), 16);
    let router = handlers::api_routes().with_state(Arc::new(state));

    let (status, body) = send(
        router,
        "POST",
        "/api/v1/leads",
        Some(json!({ "email": "drain@example.com", "company": "Bayou Builders" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // The router held the last queue handle; the worker finishes the backlog.
    worker.await.unwrap();

    let id: Uuid = body["lead"]["id"].as_str().unwrap().parse().unwrap();
    let stored = store.find_lead(id).await.unwrap().unwrap();
    assert!(stored.last_enriched.is_some());
    assert!(stored.priority.is_some());
}

#[tokio::test]
async fn score_endpoint_returns_score_or_404() {
    let lead = qualified_lead("api@example.com");
    let id = lead.id;
    let store = store_with(vec![lead]).await;

    let (status, body) = send(app(store.clone()), "POST", &format!("/api/v1/leads/{}/score", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_score"], 80);
    assert_eq!(body["category"], "hot");

    let (status, body) = send(
        app(store),
        "POST",
        &format!("/api/v1/leads/{}/score", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Lead not found"));
}

#[tokio::test]
async fn batch_rejects_empty_input() {
    let (status, _) = send(
        app(store_with(vec![]).await),
        "POST",
        "/api/v1/leads/score/batch",
        Some(json!({ "lead_ids": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_scores_known_leads() {
    let lead = qualified_lead("batch@example.com");
    let id = lead.id;
    let store = store_with(vec![lead]).await;

    let (status, body) = send(
        app(store),
        "POST",
        "/api/v1/leads/score/batch",
        Some(json!({ "lead_ids": [id, Uuid::new_v4()] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["lead_id"], id.to_string());
}

#[tokio::test]
async fn enrich_is_accepted_and_queued() {
    let lead = qualified_lead("queue@example.com");
    let id = lead.id;
    let (status, body) = send(
        app(store_with(vec![lead]).await),
        "POST",
        &format!("/api/v1/leads/{}/enrich", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["queued"], true);
}

#[tokio::test]
async fn unknown_category_is_bad_request() {
    let store = store_with(vec![]).await;
    let (status, _) = send(app(store.clone()), "GET", "/api/v1/leads/category/lukewarm", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app(store), "GET", "/api/v1/leads/category/HOT?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn property_interest_is_created() {
    let lead = qualified_lead("interest@example.com");
    let id = lead.id;
    let store = store_with(vec![lead]).await;
    let listed = property("Katy", "residential", 1_000_000.0);
    let property_id = listed.id;
    store.insert_property(listed).await;

    let (status, body) = send(
        app(store.clone()),
        "POST",
        &format!("/api/v1/leads/{}/property-interests", id),
        Some(json!({ "property_id": property_id, "interest": "high", "notes": null })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["interest"], "high");

    let (status, body) = send(
        app(store),
        "GET",
        &format!("/api/v1/leads/{}/property-interests", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reference_endpoints() {
    let store = store_with(vec![]).await;
    store.insert_deal(deal("negotiation", Some(100_000.0))).await;

    let (status, body) = send(app(store.clone()), "GET", "/api/v1/deal-stages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 8);
    assert_eq!(body[0]["id"], "lead");

    let (status, body) = send(app(store), "GET", "/api/v1/analytics/pipeline-metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_pipeline_value"], 100_000.0);
    assert_eq!(body["weighted_pipeline_value"], 85_000.0);
}
