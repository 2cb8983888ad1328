//! Lead intelligence: external enrichment, priority and auto-assignment.
//!
//! Enrichment workflow for one lead:
//! 1. Run the five source lookups concurrently; a failed lookup leaves its
//!    part of the bundle empty.
//! 2. Derive a priority from the bundle and the lead's stated budget.
//! 3. Pick the best-fitting active agent or manager.
//! 4. Persist the enrichment fields and append a `lead_enrichment` interaction.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use crate::budget::budget_ceiling;
use crate::errors::{AppError, ResultExt};
use crate::models::{
    BatchEnrichmentSummary, CreditCapacity, EnrichmentData, EnrichmentUpdate, Lead,
    NewInteraction, Priority, PriorityStat, TeamMember, TeamRole,
};
use crate::sources::{EnrichmentSource, PersonQuery};
use crate::store::LeadStore;

pub const ENRICHMENT_INTERACTION: &str = "lead_enrichment";

/// Roles that can receive auto-assigned leads.
pub const ASSIGNABLE_ROLES: [TeamRole; 2] = [TeamRole::Agent, TeamRole::Manager];

const C_LEVEL_TITLES: [&str; 9] = [
    "ceo",
    "cfo",
    "coo",
    "cto",
    "cmo",
    "chief",
    "president",
    "owner",
    "founder",
];
const MANAGEMENT_TITLES: [&str; 2] = ["director", "manager"];
const STAFF_TITLES: [&str; 2] = ["associate", "coordinator"];

/// Enrichment jobs the queue worker runs at once.
const MAX_CONCURRENT_ENRICHMENTS: usize = 8;

// ============ Priority ============

pub fn company_size_points(size: Option<&str>) -> i32 {
    let Some(size) = size.map(str::to_lowercase) else {
        return 0;
    };

    if size.contains("enterprise") || size.contains("1000+") {
        3
    } else if size.contains("mid") || size.contains("100-999") {
        2
    } else if size.contains("small") || size.contains("10-99") {
        1
    } else {
        0
    }
}

pub fn property_value_points(total_value: Option<f64>) -> i32 {
    match total_value {
        Some(v) if v > 1_000_000.0 => 3,
        Some(v) if v > 500_000.0 => 2,
        Some(v) if v > 100_000.0 => 1,
        _ => 0,
    }
}

pub fn credit_points(capacity: Option<CreditCapacity>) -> i32 {
    match capacity {
        Some(CreditCapacity::High) => 2,
        Some(CreditCapacity::Medium) => 1,
        Some(CreditCapacity::Low) | None => 0,
    }
}

/// Seniority by whole-word match, so "director" does not count as "cto".
pub fn title_points(title: Option<&str>) -> i32 {
    let Some(title) = title else {
        return 0;
    };
    let lowered = title.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has_any = |set: &[&str]| words.iter().any(|w| set.contains(w));

    if has_any(&C_LEVEL_TITLES) {
        3
    } else if has_any(&MANAGEMENT_TITLES) {
        2
    } else if has_any(&STAFF_TITLES) {
        1
    } else {
        0
    }
}

pub fn budget_points(budget: Option<&str>) -> i32 {
    let Some(budget) = budget.filter(|b| !b.trim().is_empty()) else {
        return 0;
    };
    if budget.to_lowercase().contains("million") {
        return 3;
    }

    match budget_ceiling(budget) {
        Some(c) if c >= 1_000_000.0 => 3,
        Some(c) if c >= 500_000.0 => 2,
        Some(c) if c >= 100_000.0 => 1,
        _ => 0,
    }
}

/// Additive priority over the enrichment bundle and the stated budget.
///
/// Title comes from the professional profile, falling back to the lead's
/// own job title.
pub fn calculate_priority(lead: &Lead, data: &EnrichmentData) -> Priority {
    let title = data
        .professional_profile
        .as_ref()
        .and_then(|p| p.title.as_deref())
        .or(lead.job_title.as_deref());

    let points = company_size_points(data.company_info.as_ref().and_then(|c| c.size.as_deref()))
        + property_value_points(data.property_history.as_ref().and_then(|h| h.total_value))
        + credit_points(data.credit_estimate.as_ref().and_then(|c| c.capacity))
        + title_points(title)
        + budget_points(lead.budget.as_deref());

    Priority::from_points(points)
}

// ============ Assignment ============

/// How well a team member fits a lead. Lower workload, specialties found
/// in the lead's interests and a specialty covering the lead's property
/// type all raise the score.
pub fn assignment_score(member: &TeamMember, lead: &Lead) -> i32 {
    let interests: Vec<String> = lead.interests.iter().map(|i| i.to_lowercase()).collect();
    let specialties: Vec<String> = member
        .specialties
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let matching = specialties
        .iter()
        .filter(|s| interests.iter().any(|i| i.contains(s.as_str())))
        .count();

    let covers_property_type = lead
        .property_type
        .as_deref()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| specialties.iter().any(|s| s.contains(&t)))
        .unwrap_or(false);

    let mut score = 10i32.saturating_sub(member.current_workload).saturating_mul(2);
    score = score.saturating_add(3 * crate::engagement::saturating_i32(matching));
    if covers_property_type {
        score += 2;
    }
    score
}

/// Best-scoring member; the first one wins ties.
pub fn select_assignee(members: &[TeamMember], lead: &Lead) -> Option<Uuid> {
    let mut best: Option<(&TeamMember, i32)> = None;
    for member in members {
        let score = assignment_score(member, lead);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((member, score));
        }
    }
    best.map(|(member, _)| member.id)
}

// ============ Service ============

/// A lookup failure leaves its part of the bundle empty.
fn settle<T>(lead_id: Uuid, lookup: &str, result: Result<Option<T>, AppError>) -> Option<T> {
    match result {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("{} lookup failed for lead {}: {}", lookup, lead_id, e);
            None
        }
    }
}

#[derive(Clone)]
pub struct LeadIntelligenceService {
    store: Arc<dyn LeadStore>,
    source: Arc<dyn EnrichmentSource>,
}

impl LeadIntelligenceService {
    pub fn new(store: Arc<dyn LeadStore>, source: Arc<dyn EnrichmentSource>) -> Self {
        Self { store, source }
    }

    /// Enrich a lead, logging rather than returning any failure.
    pub async fn enrich_lead(&self, lead_id: Uuid) {
        match self.try_enrich(lead_id).await {
            Ok(update) => tracing::info!(
                "Lead {} enriched: {} sources, priority {}, assigned to {:?}",
                lead_id,
                update.enrichment_data.source_count(),
                update.priority,
                update.assigned_to
            ),
            Err(e) => tracing::error!("Error enriching lead {}: {}", lead_id, e),
        }
    }

    /// Enrich a lead and report what was written.
    pub async fn try_enrich(&self, lead_id: Uuid) -> Result<EnrichmentUpdate, AppError> {
        let lead = self
            .store
            .find_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead not found: {}", lead_id)))?;

        let enrichment_data = self.gather(&lead).await;
        let priority = calculate_priority(&lead, &enrichment_data);

        let members = self
            .store
            .list_active_team_members(&ASSIGNABLE_ROLES)
            .await
            .with_context(|| format!("Loading team members for lead {}", lead_id))?;
        let assigned_to = select_assignee(&members, &lead);

        let update = EnrichmentUpdate {
            enrichment_data,
            last_enriched: Utc::now(),
            priority,
            assigned_to,
        };
        self.store
            .save_lead_enrichment(lead_id, &update)
            .await
            .with_context(|| format!("Saving enrichment for lead {}", lead_id))?;

        let mut interaction = NewInteraction::new(lead_id, ENRICHMENT_INTERACTION);
        interaction.method = Some("automatic".to_string());
        interaction.notes = Some(format!(
            "Lead enriched with {} data sources",
            update.enrichment_data.source_count()
        ));
        interaction.metadata = serde_json::to_value(&update.enrichment_data)?;
        self.store
            .create_interaction(interaction)
            .await
            .with_context(|| format!("Recording enrichment for lead {}", lead_id))?;

        Ok(update)
    }

    /// Run every lookup concurrently and collect whatever succeeded.
    async fn gather(&self, lead: &Lead) -> EnrichmentData {
        let person = PersonQuery::from_lead(lead);
        let company = lead
            .company
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let company_lookup = async {
            match company {
                Some(name) => self.source.company_info(name).await,
                None => Ok(None),
            }
        };

        let (profile, company_info, history, credit, social) = tokio::join!(
            self.source.professional_profile(&person),
            company_lookup,
            self.source.property_history(&person),
            self.source.credit_estimate(&lead.email, company),
            self.source.social_profiles(&person),
        );

        EnrichmentData {
            professional_profile: settle(lead.id, "Professional profile", profile),
            company_info: settle(lead.id, "Company info", company_info),
            property_history: settle(lead.id, "Property history", history),
            credit_estimate: settle(lead.id, "Credit estimate", credit),
            social_profiles: settle(lead.id, "Social profiles", social),
        }
    }

    /// Enrich many leads concurrently and count outcomes.
    pub async fn batch_enrich_leads(&self, lead_ids: &[Uuid]) -> BatchEnrichmentSummary {
        let mut tasks = JoinSet::new();
        for lead_id in lead_ids.iter().copied() {
            let service = self.clone();
            tasks.spawn(async move { (lead_id, service.try_enrich(lead_id).await) });
        }

        let mut summary = BatchEnrichmentSummary {
            total: lead_ids.len(),
            ..Default::default()
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => summary.successful += 1,
                Ok((lead_id, Err(e))) => {
                    tracing::warn!("Batch enrichment failed for lead {}: {}", lead_id, e);
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Enrichment task panicked or was cancelled: {}", e);
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Batch enrichment finished: {} successful, {} failed, {} total",
            summary.successful,
            summary.failed,
            summary.total
        );
        summary
    }

    pub async fn enrichment_stats(&self) -> Result<Vec<PriorityStat>, AppError> {
        self.store.priority_stats().await
    }
}

// ============ Background queue ============

/// Bounded queue of leads awaiting enrichment, drained by one worker task.
#[derive(Clone)]
pub struct EnrichmentQueue {
    sender: mpsc::Sender<Uuid>,
}

impl EnrichmentQueue {
    /// Start the worker. It stops once every queue handle is dropped and
    /// in-flight jobs have finished.
    pub fn spawn(service: LeadIntelligenceService, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Uuid>(capacity.max(1));

        let worker = tokio::spawn(async move {
            let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_ENRICHMENTS));
            let mut jobs = JoinSet::new();

            while let Some(lead_id) = receiver.recv().await {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let service = service.clone();
                jobs.spawn(async move {
                    service.enrich_lead(lead_id).await;
                    drop(permit);
                });

                // Reap finished jobs so the set does not grow unbounded.
                while jobs.try_join_next().is_some() {}
            }

            while jobs.join_next().await.is_some() {}
            tracing::info!("Enrichment queue worker stopped");
        });

        (Self { sender }, worker)
    }

    /// Queue a lead without waiting. Returns false when the queue is full
    /// or closed; the lead is then left unenriched.
    pub fn submit(&self, lead_id: Uuid) -> bool {
        match self.sender.try_send(lead_id) {
            Ok(()) => {
                tracing::debug!("Queued lead {} for enrichment", lead_id);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Enrichment queue full, dropping lead {}", lead_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!("Enrichment queue closed, dropping lead {}", lead_id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompanyInfo, CreditEstimate, ProfessionalProfile, PropertyHistory};

    fn member(workload: i32, specialties: &[&str]) -> TeamMember {
        TeamMember {
            id: Uuid::new_v4(),
            first_name: "Sam".into(),
            last_name: "Agent".into(),
            role: TeamRole::Agent,
            specialties: specialties.iter().map(|s| s.to_string()).collect(),
            current_workload: workload,
            is_active: true,
        }
    }

    #[test]
    fn test_title_points_use_whole_words() {
        assert_eq!(title_points(Some("CEO & Founder")), 3);
        assert_eq!(title_points(Some("Chief Operating Officer")), 3);
        assert_eq!(title_points(Some("Director of Acquisitions")), 2);
        assert_eq!(title_points(Some("Project Coordinator")), 1);
        assert_eq!(title_points(Some("Architect")), 0);
        assert_eq!(title_points(None), 0);
    }

    #[test]
    fn test_budget_points_by_ceiling() {
        assert_eq!(budget_points(Some("1M+")), 3);
        assert_eq!(budget_points(Some("about 2 million")), 3);
        assert_eq!(budget_points(Some("$250K - $750K")), 2);
        assert_eq!(budget_points(Some("100k-250k")), 1);
        assert_eq!(budget_points(Some("$50K")), 0);
        assert_eq!(budget_points(Some("flexible")), 0);
        assert_eq!(budget_points(None), 0);
    }

    #[test]
    fn test_budget_points_bracket_on_range_ceiling() {
        // The upper bound decides the bracket, so a range reaching 1M is top tier.
        assert_eq!(budget_points(Some("$500K - $1M")), 3);
        assert_eq!(budget_points(Some("$500K - $999K")), 2);
        assert_eq!(budget_points(Some("2-3 million")), 3);
        assert_eq!(budget_points(Some("$500-750 thousand")), 2);
    }

    #[test]
    fn test_company_size_points() {
        assert_eq!(company_size_points(Some("Enterprise")), 3);
        assert_eq!(company_size_points(Some("1000+ employees")), 3);
        assert_eq!(company_size_points(Some("100-999 employees")), 2);
        assert_eq!(company_size_points(Some("10-99 employees")), 1);
        assert_eq!(company_size_points(Some("50-200 employees")), 0);
    }

    #[test]
    fn test_high_priority_lead() {
        let mut lead = Lead::new("ceo@example.com");
        lead.budget = Some("$1M - $3M".into());
        let data = EnrichmentData {
            professional_profile: Some(ProfessionalProfile {
                title: Some("CEO".into()),
                ..Default::default()
            }),
            company_info: Some(CompanyInfo {
                size: Some("enterprise".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(calculate_priority(&lead, &data), Priority::High);
    }

    #[test]
    fn test_medium_and_low_priority() {
        let lead = Lead::new("a@example.com");
        let data = EnrichmentData {
            property_history: Some(PropertyHistory {
                total_value: Some(600_000.0),
                ..Default::default()
            }),
            credit_estimate: Some(CreditEstimate {
                score: Some(780),
                capacity: Some(CreditCapacity::Medium),
                indicators: vec![],
            }),
            ..Default::default()
        };
        assert_eq!(calculate_priority(&lead, &data), Priority::Medium);
        assert_eq!(
            calculate_priority(&lead, &EnrichmentData::default()),
            Priority::Low
        );
    }

    #[test]
    fn test_assignment_prefers_light_workload_and_specialties() {
        let mut lead = Lead::new("a@example.com");
        lead.interests = vec!["Commercial development".into()];
        lead.property_type = Some("Commercial".into());

        let busy = member(8, &["commercial"]);
        let idle = member(0, &[]);
        // busy: (10-8)*2 + 3 + 2 = 9; idle: 20
        assert_eq!(assignment_score(&busy, &lead), 9);
        assert_eq!(assignment_score(&idle, &lead), 20);
        assert_eq!(select_assignee(&[busy, idle.clone()], &lead), Some(idle.id));
    }

    #[test]
    fn test_assignment_ties_go_to_first_member() {
        let lead = Lead::new("a@example.com");
        let first = member(2, &[]);
        let second = member(2, &[]);
        assert_eq!(
            select_assignee(&[first.clone(), second], &lead),
            Some(first.id)
        );
        assert_eq!(select_assignee(&[], &lead), None);
    }
}
