//! Data store contract shared by every service.
//!
//! Services only see this trait; `db_storage::PgStore` backs it with
//! Postgres and `memory_store::MemoryStore` keeps everything in process.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    Deal, EnrichmentUpdate, Interaction, Lead, NewInteraction, NewPropertyInterest, PageView,
    PriorityStat, Property, PropertyInterest, ScoreCategory, ScoreCategoryStat, ScoreUpdate,
    TeamMember, TeamRole,
};

#[async_trait]
pub trait LeadStore: Send + Sync {
    // ---- leads ----

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError>;

    /// Case-insensitive lookup by email address.
    async fn find_lead_by_email(&self, email: &str) -> Result<Option<Lead>, AppError>;

    /// Store a newly captured lead. Emails are unique ignoring case; a
    /// duplicate is a `BadRequest`.
    async fn create_lead(&self, lead: &Lead) -> Result<(), AppError>;

    /// Overwrite `source` with the channel of the latest capture.
    async fn save_lead_source(&self, id: Uuid, source: &str) -> Result<(), AppError>;

    /// Leads in a category, highest score first.
    async fn list_leads_by_category(
        &self,
        category: ScoreCategory,
        limit: usize,
    ) -> Result<Vec<Lead>, AppError>;

    /// Overwrite `score`, `score_category`, `score_breakdown` and `last_scored`.
    async fn save_lead_score(&self, id: Uuid, update: &ScoreUpdate) -> Result<(), AppError>;

    /// Overwrite `enrichment_data`, `last_enriched`, `priority` and `assigned_to`.
    async fn save_lead_enrichment(
        &self,
        id: Uuid,
        update: &EnrichmentUpdate,
    ) -> Result<(), AppError>;

    /// Lead count and average score per category (uncategorised leads grouped under `None`).
    async fn score_category_stats(&self) -> Result<Vec<ScoreCategoryStat>, AppError>;

    /// Lead count per priority among enriched leads.
    async fn priority_stats(&self) -> Result<Vec<PriorityStat>, AppError>;

    // ---- activity ----

    /// Interactions of a lead, oldest first.
    async fn list_interactions(&self, lead_id: Uuid) -> Result<Vec<Interaction>, AppError>;

    async fn create_interaction(&self, new: NewInteraction) -> Result<Interaction, AppError>;

    /// Page views belonging to any of the given sessions, oldest first.
    async fn list_page_views(&self, session_ids: &[String]) -> Result<Vec<PageView>, AppError>;

    // ---- catalog / pipeline / team ----

    async fn find_property(&self, id: Uuid) -> Result<Option<Property>, AppError>;

    async fn list_properties_by_status(&self, status: &str) -> Result<Vec<Property>, AppError>;

    async fn list_deals(&self) -> Result<Vec<Deal>, AppError>;

    /// Active members holding one of `roles`, in stable store order.
    async fn list_active_team_members(
        &self,
        roles: &[TeamRole],
    ) -> Result<Vec<TeamMember>, AppError>;

    // ---- property interest ----

    async fn create_property_interest(
        &self,
        new: NewPropertyInterest,
    ) -> Result<PropertyInterest, AppError>;

    /// Most recently viewed first.
    async fn list_property_interests(
        &self,
        lead_id: Uuid,
    ) -> Result<Vec<PropertyInterest>, AppError>;
}

pub(crate) fn duplicate_email(email: &str) -> AppError {
    AppError::BadRequest(format!("A lead with email {} already exists", email))
}
