//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use rust_lead_intel::errors::AppError;
use rust_lead_intel::memory_store::MemoryStore;
use rust_lead_intel::models::*;
use rust_lead_intel::sources::{EnrichmentSource, PersonQuery};

pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Lead with contact and project details filled in.
pub fn qualified_lead(email: &str) -> Lead {
    let mut lead = Lead::new(email);
    lead.first_name = Some("Maria".into());
    lead.last_name = Some("Lopez".into());
    lead.phone = Some("713-555-0100".into());
    lead.company = Some("Bayou Builders".into());
    lead.budget = Some("$500K - $2M".into());
    lead.timeline = Some("3-6 months".into());
    lead
}

pub fn interaction(lead_id: Uuid, kind: &str, method: Option<&str>, session: Option<&str>) -> Interaction {
    Interaction {
        id: Uuid::new_v4(),
        lead_id,
        deal_id: None,
        interaction_type: kind.to_string(),
        method: method.map(str::to_string),
        session_id: session.map(str::to_string),
        notes: None,
        metadata: serde_json::Value::Null,
        created_at: at(0),
    }
}

pub fn page_view(session: &str, minutes: i64) -> PageView {
    PageView {
        id: Uuid::new_v4(),
        session_id: session.to_string(),
        page_url: "/listings".to_string(),
        timestamp: at(minutes),
    }
}

pub fn property(neighborhood: &str, kind: &str, price: f64) -> Property {
    Property {
        id: Uuid::new_v4(),
        address: "100 Main St".into(),
        neighborhood: neighborhood.into(),
        property_type: kind.into(),
        list_price: Some(price),
        status: "available".into(),
        ..Default::default()
    }
}

pub fn deal(stage: &str, value: Option<f64>) -> Deal {
    Deal {
        id: Uuid::new_v4(),
        lead_id: Uuid::new_v4(),
        title: None,
        stage: stage.to_string(),
        value,
        created_at: at(0),
        updated_at: None,
    }
}

pub fn team_member(role: TeamRole, workload: i32, specialties: &[&str]) -> TeamMember {
    TeamMember {
        id: Uuid::new_v4(),
        first_name: "Sam".into(),
        last_name: "Rivera".into(),
        role,
        specialties: specialties.iter().map(|s| s.to_string()).collect(),
        current_workload: workload,
        is_active: true,
    }
}

pub async fn store_with(leads: Vec<Lead>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for lead in leads {
        store.insert_lead(lead).await;
    }
    store
}

/// Source returning fixed data, with chosen lookups failing.
#[derive(Default)]
pub struct FakeSource {
    pub fail_profile: bool,
    pub fail_credit: bool,
    pub fail_everything: bool,
    pub company_calls: AtomicUsize,
}

impl FakeSource {
    fn check(&self, lookup_fails: bool) -> Result<(), AppError> {
        if self.fail_everything || lookup_fails {
            Err(AppError::ExternalApiError("provider unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EnrichmentSource for FakeSource {
    async fn professional_profile(
        &self,
        _person: &PersonQuery,
    ) -> Result<Option<ProfessionalProfile>, AppError> {
        self.check(self.fail_profile)?;
        Ok(Some(ProfessionalProfile {
            title: Some("CEO".into()),
            company: Some("Bayou Builders".into()),
            ..Default::default()
        }))
    }

    async fn company_info(&self, company: &str) -> Result<Option<CompanyInfo>, AppError> {
        self.company_calls.fetch_add(1, Ordering::SeqCst);
        self.check(false)?;
        Ok(Some(CompanyInfo {
            name: Some(company.to_string()),
            size: Some("1000+ employees".into()),
            ..Default::default()
        }))
    }

    async fn property_history(
        &self,
        _person: &PersonQuery,
    ) -> Result<Option<PropertyHistory>, AppError> {
        self.check(false)?;
        Ok(None)
    }

    async fn credit_estimate(
        &self,
        _email: &str,
        _company: Option<&str>,
    ) -> Result<Option<CreditEstimate>, AppError> {
        self.check(self.fail_credit)?;
        Ok(Some(CreditEstimate {
            score: Some(810),
            capacity: Some(CreditCapacity::High),
            indicators: vec![],
        }))
    }

    async fn social_profiles(
        &self,
        _person: &PersonQuery,
    ) -> Result<Option<SocialProfiles>, AppError> {
        self.check(false)?;
        Ok(None)
    }
}
