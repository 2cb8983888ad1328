//! In-process `LeadStore` backing the test suites.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    Deal, EnrichmentUpdate, Interaction, Lead, NewInteraction, NewPropertyInterest, PageView,
    Priority, PriorityStat, Property, PropertyInterest, ScoreCategory, ScoreCategoryStat,
    ScoreUpdate, TeamMember, TeamRole,
};
use crate::store::{duplicate_email, LeadStore};

#[derive(Default)]
struct State {
    leads: HashMap<Uuid, Lead>,
    interactions: Vec<Interaction>,
    page_views: Vec<PageView>,
    properties: Vec<Property>,
    deals: Vec<Deal>,
    team_members: Vec<TeamMember>,
    property_interests: Vec<PropertyInterest>,
}

/// Every record lives behind one lock; writes replace whole fields, which
/// gives the same last-write-wins behaviour as the SQL store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_lead(&self, lead: Lead) {
        self.state.write().await.leads.insert(lead.id, lead);
    }

    /// Insert an interaction with its own id and timestamp (seeding history).
    pub async fn insert_interaction(&self, interaction: Interaction) {
        self.state.write().await.interactions.push(interaction);
    }

    pub async fn insert_page_view(&self, page_view: PageView) {
        self.state.write().await.page_views.push(page_view);
    }

    pub async fn insert_property(&self, property: Property) {
        self.state.write().await.properties.push(property);
    }

    pub async fn insert_deal(&self, deal: Deal) {
        self.state.write().await.deals.push(deal);
    }

    pub async fn insert_team_member(&self, member: TeamMember) {
        self.state.write().await.team_members.push(member);
    }
}

fn category_rank(category: Option<ScoreCategory>) -> u8 {
    match category {
        Some(ScoreCategory::Hot) => 0,
        Some(ScoreCategory::Warm) => 1,
        Some(ScoreCategory::Cold) => 2,
        None => 3,
    }
}

fn priority_rank(priority: Option<Priority>) -> u8 {
    match priority {
        Some(Priority::High) => 0,
        Some(Priority::Medium) => 1,
        Some(Priority::Low) => 2,
        None => 3,
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self.state.read().await.leads.get(&id).cloned())
    }

    async fn find_lead_by_email(&self, email: &str) -> Result<Option<Lead>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .leads
            .values()
            .find(|lead| lead.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    async fn create_lead(&self, lead: &Lead) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state
            .leads
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&lead.email))
        {
            return Err(duplicate_email(&lead.email));
        }
        state.leads.insert(lead.id, lead.clone());
        Ok(())
    }

    async fn save_lead_source(&self, id: Uuid, source: &str) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let lead = state
            .leads
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Lead not found: {}", id)))?;
        lead.source = Some(source.to_string());
        Ok(())
    }

    async fn list_leads_by_category(
        &self,
        category: ScoreCategory,
        limit: usize,
    ) -> Result<Vec<Lead>, AppError> {
        let state = self.state.read().await;
        let mut leads: Vec<Lead> = state
            .leads
            .values()
            .filter(|lead| lead.score_category == Some(category))
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.score.cmp(&a.score).then(a.created_at.cmp(&b.created_at)));
        leads.truncate(limit);
        Ok(leads)
    }

    async fn save_lead_score(&self, id: Uuid, update: &ScoreUpdate) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let lead = state
            .leads
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Lead not found: {}", id)))?;

        lead.score = Some(update.score);
        lead.score_category = Some(update.score_category);
        lead.score_breakdown = Some(update.score_breakdown);
        lead.last_scored = Some(update.last_scored);
        Ok(())
    }

    async fn save_lead_enrichment(
        &self,
        id: Uuid,
        update: &EnrichmentUpdate,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let lead = state
            .leads
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Lead not found: {}", id)))?;

        lead.enrichment_data = Some(update.enrichment_data.clone());
        lead.last_enriched = Some(update.last_enriched);
        lead.priority = Some(update.priority);
        lead.assigned_to = update.assigned_to;
        Ok(())
    }

    async fn score_category_stats(&self) -> Result<Vec<ScoreCategoryStat>, AppError> {
        let state = self.state.read().await;
        let mut groups: HashMap<Option<ScoreCategory>, (i64, i64, i64)> = HashMap::new();
        for lead in state.leads.values() {
            let entry = groups.entry(lead.score_category).or_insert((0, 0, 0));
            entry.0 += 1;
            if let Some(score) = lead.score {
                entry.1 += i64::from(score);
                entry.2 += 1;
            }
        }

        let mut stats: Vec<ScoreCategoryStat> = groups
            .into_iter()
            .map(|(category, (count, sum, scored))| ScoreCategoryStat {
                category,
                count,
                average_score: (scored > 0).then(|| sum as f64 / scored as f64),
            })
            .collect();
        stats.sort_by_key(|s| category_rank(s.category));
        Ok(stats)
    }

    async fn priority_stats(&self) -> Result<Vec<PriorityStat>, AppError> {
        let state = self.state.read().await;
        let mut groups: HashMap<Option<Priority>, i64> = HashMap::new();
        for lead in state.leads.values().filter(|l| l.last_enriched.is_some()) {
            *groups.entry(lead.priority).or_insert(0) += 1;
        }

        let mut stats: Vec<PriorityStat> = groups
            .into_iter()
            .map(|(priority, count)| PriorityStat { priority, count })
            .collect();
        stats.sort_by_key(|s| priority_rank(s.priority));
        Ok(stats)
    }

    async fn list_interactions(&self, lead_id: Uuid) -> Result<Vec<Interaction>, AppError> {
        let state = self.state.read().await;
        let mut interactions: Vec<Interaction> = state
            .interactions
            .iter()
            .filter(|i| i.lead_id == lead_id)
            .cloned()
            .collect();
        interactions.sort_by_key(|i| i.created_at);
        Ok(interactions)
    }

    async fn create_interaction(&self, new: NewInteraction) -> Result<Interaction, AppError> {
        let interaction = Interaction {
            id: Uuid::new_v4(),
            lead_id: new.lead_id,
            deal_id: new.deal_id,
            interaction_type: new.interaction_type,
            method: new.method,
            session_id: new.session_id,
            notes: new.notes,
            metadata: new.metadata,
            created_at: Utc::now(),
        };
        self.state.write().await.interactions.push(interaction.clone());
        Ok(interaction)
    }

    async fn list_page_views(&self, session_ids: &[String]) -> Result<Vec<PageView>, AppError> {
        let state = self.state.read().await;
        let mut views: Vec<PageView> = state
            .page_views
            .iter()
            .filter(|pv| session_ids.contains(&pv.session_id))
            .cloned()
            .collect();
        views.sort_by_key(|pv| pv.timestamp);
        Ok(views)
    }

    async fn find_property(&self, id: Uuid) -> Result<Option<Property>, AppError> {
        let state = self.state.read().await;
        Ok(state.properties.iter().find(|p| p.id == id).cloned())
    }

    async fn list_properties_by_status(&self, status: &str) -> Result<Vec<Property>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .properties
            .iter()
            .filter(|p| p.status == status)
            .cloned()
            .collect())
    }

    async fn list_deals(&self) -> Result<Vec<Deal>, AppError> {
        Ok(self.state.read().await.deals.clone())
    }

    async fn list_active_team_members(
        &self,
        roles: &[TeamRole],
    ) -> Result<Vec<TeamMember>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .team_members
            .iter()
            .filter(|m| m.is_active && roles.contains(&m.role))
            .cloned()
            .collect())
    }

    async fn create_property_interest(
        &self,
        new: NewPropertyInterest,
    ) -> Result<PropertyInterest, AppError> {
        let interest = PropertyInterest {
            id: Uuid::new_v4(),
            lead_id: new.lead_id,
            property_id: new.property_id,
            interest: new.interest,
            notes: new.notes,
            viewed_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .property_interests
            .push(interest.clone());
        Ok(interest)
    }

    async fn list_property_interests(
        &self,
        lead_id: Uuid,
    ) -> Result<Vec<PropertyInterest>, AppError> {
        let state = self.state.read().await;
        let mut interests: Vec<PropertyInterest> = state
            .property_interests
            .iter()
            .filter(|pi| pi.lead_id == lead_id)
            .cloned()
            .collect();
        interests.sort_by(|a, b| b.viewed_at.cmp(&a.viewed_at));
        Ok(interests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreBreakdown;

    #[tokio::test]
    async fn test_score_overwrite_and_stats() {
        let store = MemoryStore::new();
        let lead = Lead::new("stats@example.com");
        let id = lead.id;
        store.insert_lead(lead).await;
        store.insert_lead(Lead::new("unscored@example.com")).await;

        for score in [90, 40] {
            let update = ScoreUpdate {
                score,
                score_category: ScoreCategory::from_score(score),
                score_breakdown: ScoreBreakdown::default(),
                last_scored: Utc::now(),
            };
            store.save_lead_score(id, &update).await.unwrap();
        }

        let stored = store.find_lead(id).await.unwrap().unwrap();
        assert_eq!(stored.score, Some(40));
        assert_eq!(stored.score_category, Some(ScoreCategory::Cold));

        let stats = store.score_category_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].category, Some(ScoreCategory::Cold));
        assert_eq!(stats[0].average_score, Some(40.0));
        assert_eq!(stats[1].category, None);
        assert_eq!(stats[1].average_score, None);
    }

    #[tokio::test]
    async fn test_email_lookup_ignores_case_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let lead = Lead::new("maria@example.com");
        store.create_lead(&lead).await.unwrap();

        let found = store.find_lead_by_email(" Maria@Example.com ").await.unwrap();
        assert_eq!(found.map(|l| l.id), Some(lead.id));
        assert!(store.find_lead_by_email("other@example.com").await.unwrap().is_none());

        let err = store
            .create_lead(&Lead::new("MARIA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        store.save_lead_source(lead.id, "referral").await.unwrap();
        let stored = store.find_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(stored.source.as_deref(), Some("referral"));
    }

    #[tokio::test]
    async fn test_save_score_for_missing_lead_is_not_found() {
        let store = MemoryStore::new();
        let update = ScoreUpdate {
            score: 10,
            score_category: ScoreCategory::Cold,
            score_breakdown: ScoreBreakdown::default(),
            last_scored: Utc::now(),
        };
        let err = store.save_lead_score(Uuid::new_v4(), &update).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
