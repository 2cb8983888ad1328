use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::AppError;

/// Declares a fieldless enum stored and serialized as a fixed lowercase string.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(AppError::BadRequest(format!(
                        concat!("Unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

// ============ Enumerations ============

text_enum! {
    /// Lead tier derived from the numeric score.
    ScoreCategory {
        Hot => "hot",
        Warm => "warm",
        Cold => "cold",
    }
}

impl ScoreCategory {
    pub const HOT_THRESHOLD: i32 = 80;
    pub const WARM_THRESHOLD: i32 = 60;

    /// Fixed breakpoints: >= 80 hot, >= 60 warm, everything else cold.
    pub fn from_score(score: i32) -> Self {
        if score >= Self::HOT_THRESHOLD {
            ScoreCategory::Hot
        } else if score >= Self::WARM_THRESHOLD {
            ScoreCategory::Warm
        } else {
            ScoreCategory::Cold
        }
    }
}

text_enum! {
    /// Assignment urgency derived from enrichment signals. Not related to `ScoreCategory`.
    Priority {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

impl Priority {
    pub const HIGH_THRESHOLD: i32 = 6;
    pub const MEDIUM_THRESHOLD: i32 = 3;

    pub fn from_points(points: i32) -> Self {
        if points >= Self::HIGH_THRESHOLD {
            Priority::High
        } else if points >= Self::MEDIUM_THRESHOLD {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

text_enum! {
    DevelopmentExperience {
        None => "none",
        FirstTime => "first-time",
        Experienced => "experienced",
    }
}

text_enum! {
    TeamRole {
        Admin => "admin",
        Manager => "manager",
        Agent => "agent",
    }
}

text_enum! {
    CreditCapacity {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

text_enum! {
    /// How interested a lead is in a specific property.
    InterestLevel {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

text_enum! {
    PriceTrend {
        Increasing => "increasing",
        Stable => "stable",
        Declining => "declining",
    }
}

text_enum! {
    Demand {
        High => "high",
        Moderate => "moderate",
        Low => "low",
    }
}

/// True when the value exists and is not blank.
pub fn is_present(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

// ============ Entities ============

/// A prospective client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    /// Acquisition channel (website, referral, ...).
    pub source: Option<String>,
    /// Free-text range such as "$500K - $2M".
    pub budget: Option<String>,
    /// Free-text range such as "3-6 months".
    pub timeline: Option<String>,
    pub location: Option<String>,
    pub property_type: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub score: Option<i32>,
    pub score_category: Option<ScoreCategory>,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub priority: Option<Priority>,
    pub enrichment_data: Option<EnrichmentData>,
    pub last_scored: Option<DateTime<Utc>>,
    pub last_enriched: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            created_at: Utc::now(),
            ..Default::default()
        }
    }
}

/// Contact or system activity tied to a lead. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub deal_id: Option<Uuid>,
    pub interaction_type: String,
    pub method: Option<String>,
    pub session_id: Option<String>,
    pub notes: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Payload for appending an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInteraction {
    pub lead_id: Uuid,
    pub deal_id: Option<Uuid>,
    pub interaction_type: String,
    pub method: Option<String>,
    pub session_id: Option<String>,
    pub notes: Option<String>,
    pub metadata: Value,
}

impl NewInteraction {
    pub fn new(lead_id: Uuid, interaction_type: impl Into<String>) -> Self {
        Self {
            lead_id,
            deal_id: None,
            interaction_type: interaction_type.into(),
            method: None,
            session_id: None,
            notes: None,
            metadata: Value::Null,
        }
    }
}

/// A tracked web page visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    pub id: Uuid,
    pub session_id: String,
    pub page_url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Utilities {
    #[serde(default)]
    pub water: bool,
    #[serde(default)]
    pub sewer: bool,
    #[serde(default)]
    pub electric: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketTrends {
    pub price_trend: PriceTrend,
    pub demand: Demand,
}

/// A development opportunity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub address: String,
    pub neighborhood: String,
    pub property_type: String,
    pub list_price: Option<f64>,
    pub zoning: Option<String>,
    /// Stored unit-less (acres in practice).
    pub lot_size: Option<f64>,
    pub status: String,
    pub development_score: Option<f64>,
    pub utilities: Option<Utilities>,
    pub market_trends: Option<MarketTrends>,
}

/// A pipeline opportunity tied to a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub title: Option<String>,
    /// Stage id, e.g. "due_diligence".
    pub stage: String,
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A user that leads can be assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub role: TeamRole,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub current_workload: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInterest {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub property_id: Uuid,
    pub interest: InterestLevel,
    pub notes: Option<String>,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPropertyInterest {
    pub lead_id: Uuid,
    pub property_id: Uuid,
    pub interest: InterestLevel,
    pub notes: Option<String>,
}

// ============ Enrichment Bundle ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    pub title: Option<String>,
    pub company: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub profile_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub name: Option<String>,
    /// Size band such as "50-200 employees" or "enterprise".
    pub size: Option<String>,
    pub industry: Option<String>,
    pub revenue: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyTransaction {
    pub address: String,
    pub date: String,
    pub price: f64,
    /// "purchase", "sale", "development", "construction", ...
    pub transaction_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyHistory {
    #[serde(default)]
    pub transactions: Vec<PropertyTransaction>,
    pub total_value: Option<f64>,
    pub transaction_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditEstimate {
    pub score: Option<u32>,
    pub capacity: Option<CreditCapacity>,
    #[serde(default)]
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialProfiles {
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
}

/// External data attached to a lead. Each source is absent when its lookup
/// failed or returned nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentData {
    pub professional_profile: Option<ProfessionalProfile>,
    pub company_info: Option<CompanyInfo>,
    pub property_history: Option<PropertyHistory>,
    pub credit_estimate: Option<CreditEstimate>,
    pub social_profiles: Option<SocialProfiles>,
}

impl EnrichmentData {
    /// Number of sources that produced data.
    pub fn source_count(&self) -> usize {
        [
            self.professional_profile.is_some(),
            self.company_info.is_some(),
            self.property_history.is_some(),
            self.credit_estimate.is_some(),
            self.social_profiles.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

// ============ Scoring ============

/// Raw engagement metrics collected for a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteEngagement {
    pub tool_usage: Vec<String>,
    /// Whole minutes.
    pub time_on_site: i32,
    pub pages_visited: i32,
    pub return_visits: i32,
    pub first_visit: Option<DateTime<Utc>>,
    pub last_visit: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub website_engagement: i32,
    pub contact_quality: i32,
    pub project_indicators: i32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i32 {
        self.website_engagement
            .saturating_add(self.contact_quality)
            .saturating_add(self.project_indicators)
    }
}

/// Points earned by each engagement signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementPoints {
    pub tool_usage: i32,
    pub time_on_site: i32,
    pub pages_visited: i32,
    pub return_visits: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactQualityDetails {
    pub email_provided: bool,
    pub phone_provided: bool,
    pub company_provided: bool,
    pub title_provided: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIndicatorDetails {
    pub budget_mentioned: bool,
    pub timeline_specified: bool,
    pub location_preferences: bool,
    pub development_experience: DevelopmentExperience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDetails {
    pub website_engagement: EngagementPoints,
    pub contact_quality: ContactQualityDetails,
    pub project_indicators: ProjectIndicatorDetails,
}

/// Result of a scoring run. Carries no timestamps so that recomputing on
/// unchanged data yields an identical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadScore {
    pub total_score: i32,
    pub category: ScoreCategory,
    pub breakdown: ScoreBreakdown,
    pub details: ScoreDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScoreResult {
    pub lead_id: Uuid,
    pub score: LeadScore,
}

/// Derived scoring fields written back onto a lead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub score: i32,
    pub score_category: ScoreCategory,
    pub score_breakdown: ScoreBreakdown,
    pub last_scored: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCategoryStat {
    pub category: Option<ScoreCategory>,
    pub count: i64,
    pub average_score: Option<f64>,
}

// ============ Enrichment Results ============

/// Derived enrichment fields written back onto a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentUpdate {
    pub enrichment_data: EnrichmentData,
    pub last_enriched: DateTime<Utc>,
    pub priority: Priority,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityStat {
    pub priority: Option<Priority>,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEnrichmentSummary {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

// ============ Matching ============

/// Preferences inferred from a lead's free-text fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadInterests {
    pub neighborhoods: Vec<String>,
    pub project_types: Vec<String>,
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub zoning_preferences: Vec<String>,
    pub development_experience: DevelopmentExperience,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyMatch {
    pub property_id: Uuid,
    pub property: Property,
    pub match_score: i32,
    pub reasoning: Vec<String>,
    pub next_steps: Vec<String>,
    pub risk_factors: Vec<String>,
    pub market_conditions: String,
}

// ============ Pipeline ============

/// One row of the fixed deal-stage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DealStage {
    pub id: &'static str,
    pub name: &'static str,
    pub order: u8,
    pub probability: u32,
    pub color: &'static str,
    pub description: &'static str,
}

/// A labelled estimate for a stage-to-stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEstimate {
    pub transition: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub conversion_rates: Vec<TransitionEstimate>,
    pub average_time_in_stage: Vec<TransitionEstimate>,
    pub stage_counts: BTreeMap<String, usize>,
    pub total_pipeline_value: f64,
    pub weighted_pipeline_value: f64,
}

// ============ API Request/Response Models ============

/// Details captured for a new lead. Derived fields start empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLead {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub location: Option<String>,
    pub property_type: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl NewLead {
    /// Validate the email and build the stored record.
    pub fn into_lead(self) -> Result<Lead, AppError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::BadRequest(
                "A valid email address is required".to_string(),
            ));
        }

        let mut lead = Lead::new(email);
        lead.first_name = self.first_name;
        lead.last_name = self.last_name;
        lead.phone = self.phone;
        lead.company = self.company;
        lead.job_title = self.job_title;
        lead.source = self.source;
        lead.budget = self.budget;
        lead.timeline = self.timeline;
        lead.location = self.location;
        lead.property_type = self.property_type;
        lead.interests = self.interests;
        Ok(lead)
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchLeadRequest {
    pub lead_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub activity_type: String,
    #[serde(default)]
    pub activity_data: Value,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyInterestRequest {
    pub property_id: Uuid,
    pub interest: InterestLevel,
    pub notes: Option<String>,
}
