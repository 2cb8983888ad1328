mod common;

use uuid::Uuid;

use common::*;
use rust_lead_intel::matching::OpportunityMatchingService;
use rust_lead_intel::models::{DevelopmentExperience, InterestLevel};
use rust_lead_intel::pipeline::{deal_stages, stage_probability, PipelineMetricsService};

fn katy_lead() -> rust_lead_intel::models::Lead {
    let mut lead = qualified_lead("katy@example.com");
    lead.location = Some("Katy".into());
    lead.property_type = Some("Residential".into());
    lead.interests = vec!["Townhome development".into()];
    lead
}

#[tokio::test]
async fn preferences_come_from_lead_fields() {
    let lead = katy_lead();
    let id = lead.id;
    let service = OpportunityMatchingService::new(store_with(vec![lead]).await);

    let prefs = service.get_lead_preferences(id).await.unwrap();
    assert_eq!(prefs.neighborhoods, vec!["Katy"]);
    assert_eq!(prefs.project_types, vec!["development", "residential"]);
    assert_eq!(prefs.budget_range.as_deref(), Some("$500K - $2M"));
    assert_eq!(prefs.timeline.as_deref(), Some("3-6 months"));
    assert_eq!(prefs.development_experience, DevelopmentExperience::FirstTime);
}

#[tokio::test]
async fn matches_are_available_above_threshold_and_sorted() {
    let lead = katy_lead();
    let id = lead.id;
    let store = store_with(vec![lead]).await;

    let best = property("Katy", "residential", 1_000_000.0);
    let stretch = property("Katy", "residential", 2_300_000.0);
    let poor = property("Conroe", "industrial", 9_000_000.0);
    let mut sold = property("Katy", "residential", 1_000_000.0);
    sold.status = "sold".into();
    let (best_id, stretch_id) = (best.id, stretch.id);
    for p in [poor, stretch, sold, best] {
        store.insert_property(p).await;
    }

    let service = OpportunityMatchingService::new(store);
    let matches = service.find_matches(id, 5).await.unwrap();

    let ids: Vec<Uuid> = matches.iter().map(|m| m.property_id).collect();
    assert_eq!(ids, vec![best_id, stretch_id]);
    // 40 + 30 + 20 + 5
    assert_eq!(matches[0].match_score, 95);
    // 32 + 30 + 20 + 5
    assert_eq!(matches[1].match_score, 87);
    assert!(matches.iter().all(|m| m.match_score > 50));

    let limited = service.find_matches(id, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].property_id, best_id);
}

#[tokio::test]
async fn matches_for_missing_lead_is_not_found() {
    let service = OpportunityMatchingService::new(store_with(vec![]).await);
    let err = service.find_matches(Uuid::new_v4(), 5).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn property_interests_round_trip_newest_first() {
    let lead = katy_lead();
    let id = lead.id;
    let store = store_with(vec![lead]).await;
    let first = property("Katy", "residential", 1_000_000.0);
    let second = property("Cypress", "residential", 800_000.0);
    let (first_id, second_id) = (first.id, second.id);
    store.insert_property(first).await;
    store.insert_property(second).await;

    let service = OpportunityMatchingService::new(store);
    service
        .create_property_interest(id, first_id, InterestLevel::Medium, None)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let created = service
        .create_property_interest(id, second_id, InterestLevel::High, Some("Call back".into()))
        .await
        .unwrap();
    assert_eq!(created.notes.as_deref(), Some("Call back"));

    let listed = service.lead_property_interests(id).await.unwrap();
    let properties: Vec<Uuid> = listed.iter().map(|i| i.property_id).collect();
    assert_eq!(properties, vec![second_id, first_id]);
}

#[tokio::test]
async fn property_interest_requires_lead_and_property() {
    let lead = katy_lead();
    let id = lead.id;
    let store = store_with(vec![lead]).await;
    let listed = property("Katy", "residential", 1_000_000.0);
    let property_id = listed.id;
    store.insert_property(listed).await;
    let service = OpportunityMatchingService::new(store);

    let no_property = service
        .create_property_interest(id, Uuid::new_v4(), InterestLevel::Low, None)
        .await
        .unwrap_err();
    assert!(no_property.is_not_found());

    let no_lead = service
        .create_property_interest(Uuid::new_v4(), property_id, InterestLevel::Low, None)
        .await
        .unwrap_err();
    assert!(no_lead.is_not_found());
}

#[tokio::test]
async fn pipeline_metrics_weight_by_stage() {
    let store = store_with(vec![]).await;
    for d in [
        deal("lead", Some(1_000_000.0)),
        deal("qualified", Some(2_000_000.0)),
        deal("contract", Some(1_500_000.0)),
    ] {
        store.insert_deal(d).await;
    }

    let metrics = PipelineMetricsService::new(store)
        .get_pipeline_metrics()
        .await
        .unwrap();

    assert_eq!(metrics.total_pipeline_value, 4_500_000.0);
    // 50,000 + 500,000 + 1,425,000
    assert_eq!(metrics.weighted_pipeline_value, 1_975_000.0);
    assert_eq!(metrics.stage_counts.get("qualified"), Some(&1));
    assert_eq!(metrics.stage_counts.values().sum::<usize>(), 3);
}

#[test]
fn stage_table_probabilities() {
    let expected = [
        ("lead", 5),
        ("qualified", 25),
        ("consultation", 40),
        ("property_identified", 60),
        ("due_diligence", 75),
        ("negotiation", 85),
        ("contract", 95),
        ("closed", 100),
    ];
    let ids: Vec<&str> = deal_stages().iter().map(|s| s.id).collect();
    assert_eq!(ids, expected.iter().map(|(id, _)| *id).collect::<Vec<_>>());
    for (id, probability) in expected {
        assert_eq!(stage_probability(id), probability);
    }
    assert_eq!(stage_probability("archived"), 0);
}
