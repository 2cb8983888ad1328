//! Lead scoring engine.
//!
//! A score is the sum of three components:
//! - website engagement (tools, time on site, pages, return visits),
//! - contact quality (email, phone, company or title),
//! - project indicators (budget, timeline, location, development experience).
//!
//! The category follows from the total with fixed breakpoints.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::engagement::collect_engagement;
use crate::errors::{AppError, ResultExt};
use crate::experience::classify_development_experience;
use crate::models::{
    is_present, ContactQualityDetails, DevelopmentExperience, EngagementPoints, Lead,
    LeadScore, LeadScoreResult, NewInteraction, ProjectIndicatorDetails, ScoreBreakdown,
    ScoreCategory, ScoreCategoryStat, ScoreDetails, ScoreUpdate, WebsiteEngagement,
};
use crate::store::LeadStore;

pub const POINTS_PER_TOOL: i32 = 5;
pub const MAX_TIME_ON_SITE_POINTS: i32 = 10;
pub const POINTS_PER_PAGE: i32 = 2;
pub const POINTS_PER_RETURN_VISIT: i32 = 5;

pub const EMAIL_POINTS: i32 = 5;
pub const PHONE_POINTS: i32 = 15;
pub const COMPANY_OR_TITLE_POINTS: i32 = 25;

pub const BUDGET_POINTS: i32 = 20;
pub const TIMELINE_POINTS: i32 = 15;
pub const LOCATION_POINTS: i32 = 10;

/// Interaction type appended after an activity-triggered rescore.
pub const SCORE_UPDATE_INTERACTION: &str = "score_update";

/// Engagement points per signal. The total is not capped.
pub fn engagement_points(engagement: &WebsiteEngagement) -> EngagementPoints {
    let tools = crate::engagement::saturating_i32(engagement.tool_usage.len());

    EngagementPoints {
        tool_usage: tools.saturating_mul(POINTS_PER_TOOL),
        time_on_site: engagement.time_on_site.clamp(0, MAX_TIME_ON_SITE_POINTS),
        pages_visited: engagement.pages_visited.saturating_mul(POINTS_PER_PAGE),
        return_visits: engagement.return_visits.saturating_mul(POINTS_PER_RETURN_VISIT),
    }
}

impl EngagementPoints {
    pub fn total(&self) -> i32 {
        self.tool_usage
            .saturating_add(self.time_on_site)
            .saturating_add(self.pages_visited)
            .saturating_add(self.return_visits)
    }
}

/// Which contact fields are known, from the lead itself or its enrichment profile.
pub fn contact_quality_details(lead: &Lead) -> ContactQualityDetails {
    let profile = lead
        .enrichment_data
        .as_ref()
        .and_then(|data| data.professional_profile.as_ref());

    ContactQualityDetails {
        email_provided: is_present(Some(lead.email.as_str())),
        phone_provided: is_present(lead.phone.as_deref()),
        company_provided: is_present(lead.company.as_deref())
            || is_present(profile.and_then(|p| p.company.as_deref())),
        title_provided: is_present(lead.job_title.as_deref())
            || is_present(profile.and_then(|p| p.title.as_deref())),
    }
}

/// Additive contact points: at most 45.
pub fn contact_quality_points(details: &ContactQualityDetails) -> i32 {
    let mut points = 0;
    if details.email_provided {
        points += EMAIL_POINTS;
    }
    if details.phone_provided {
        points += PHONE_POINTS;
    }
    if details.company_provided || details.title_provided {
        points += COMPANY_OR_TITLE_POINTS;
    }
    points
}

pub fn project_indicator_details(lead: &Lead) -> ProjectIndicatorDetails {
    ProjectIndicatorDetails {
        budget_mentioned: is_present(lead.budget.as_deref()),
        timeline_specified: is_present(lead.timeline.as_deref()),
        location_preferences: is_present(lead.location.as_deref()),
        development_experience: classify_development_experience(
            lead.enrichment_data.as_ref(),
            &lead.interests,
        ),
    }
}

pub fn experience_points(experience: DevelopmentExperience) -> i32 {
    match experience {
        DevelopmentExperience::None => 0,
        DevelopmentExperience::FirstTime => 15,
        DevelopmentExperience::Experienced => 30,
    }
}

pub fn project_indicator_points(details: &ProjectIndicatorDetails) -> i32 {
    let mut points = experience_points(details.development_experience);
    if details.budget_mentioned {
        points += BUDGET_POINTS;
    }
    if details.timeline_specified {
        points += TIMELINE_POINTS;
    }
    if details.location_preferences {
        points += LOCATION_POINTS;
    }
    points
}

/// Score a lead from its record and its aggregated engagement. Pure.
pub fn score_lead(lead: &Lead, engagement: &WebsiteEngagement) -> LeadScore {
    let engagement = engagement_points(engagement);
    let contact = contact_quality_details(lead);
    let project = project_indicator_details(lead);

    let breakdown = ScoreBreakdown {
        website_engagement: engagement.total(),
        contact_quality: contact_quality_points(&contact),
        project_indicators: project_indicator_points(&project),
    };
    let total_score = breakdown.total();

    LeadScore {
        total_score,
        category: ScoreCategory::from_score(total_score),
        breakdown,
        details: ScoreDetails {
            website_engagement: engagement,
            contact_quality: contact,
            project_indicators: project,
        },
    }
}

/// Computes and persists lead scores.
#[derive(Clone)]
pub struct LeadScoringService {
    store: Arc<dyn LeadStore>,
}

impl LeadScoringService {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    /// Score a lead and overwrite its scoring fields.
    pub async fn compute_score(&self, lead_id: Uuid) -> Result<LeadScore, AppError> {
        let lead = self
            .store
            .find_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead not found: {}", lead_id)))?;

        let engagement = collect_engagement(self.store.as_ref(), lead_id)
            .await
            .with_context(|| format!("Collecting engagement for lead {}", lead_id))?;

        let score = score_lead(&lead, &engagement);

        let update = ScoreUpdate {
            score: score.total_score,
            score_category: score.category,
            score_breakdown: score.breakdown,
            last_scored: Utc::now(),
        };
        self.store
            .save_lead_score(lead_id, &update)
            .await
            .with_context(|| format!("Saving score for lead {}", lead_id))?;

        tracing::info!(
            "Scored lead {}: {} ({}) [engagement {}, contact {}, project {}]",
            lead_id,
            score.total_score,
            score.category,
            score.breakdown.website_engagement,
            score.breakdown.contact_quality,
            score.breakdown.project_indicators
        );

        Ok(score)
    }

    /// Score many leads concurrently. Failed leads are logged and left out;
    /// the rest keep their input order.
    pub async fn batch_compute_score(&self, lead_ids: &[Uuid]) -> Vec<LeadScoreResult> {
        let mut tasks = JoinSet::new();
        for (index, lead_id) in lead_ids.iter().copied().enumerate() {
            let service = self.clone();
            tasks.spawn(async move { (index, lead_id, service.compute_score(lead_id).await) });
        }

        let mut results = Vec::with_capacity(lead_ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, lead_id, Ok(score))) => {
                    results.push((index, LeadScoreResult { lead_id, score }))
                }
                Ok((_, lead_id, Err(e))) => {
                    tracing::warn!("Failed to score lead {}: {}", lead_id, e);
                }
                Err(e) => {
                    tracing::error!("Scoring task panicked or was cancelled: {}", e);
                }
            }
        }

        results.sort_by_key(|(index, _)| *index);

        tracing::info!(
            "Batch scoring finished: {}/{} leads scored",
            results.len(),
            lead_ids.len()
        );

        results.into_iter().map(|(_, result)| result).collect()
    }

    /// Rescore after new activity and record why the score changed.
    pub async fn recompute_on_activity(
        &self,
        lead_id: Uuid,
        activity_type: &str,
        activity_data: Value,
    ) -> Result<LeadScore, AppError> {
        let score = self.compute_score(lead_id).await?;

        let mut interaction = NewInteraction::new(lead_id, SCORE_UPDATE_INTERACTION);
        interaction.method = Some("automatic".to_string());
        interaction.notes = Some(format!("Score updated due to {} activity", activity_type));
        interaction.metadata = activity_data;

        self.store
            .create_interaction(interaction)
            .await
            .with_context(|| format!("Recording score update for lead {}", lead_id))?;

        Ok(score)
    }

    pub async fn scoring_stats(&self) -> Result<Vec<ScoreCategoryStat>, AppError> {
        self.store.score_category_stats().await
    }

    pub async fn leads_by_category(
        &self,
        category: ScoreCategory,
        limit: usize,
    ) -> Result<Vec<Lead>, AppError> {
        self.store.list_leads_by_category(category, limit).await
    }
}
