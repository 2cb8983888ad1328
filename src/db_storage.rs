//! Postgres-backed `LeadStore`. Tables are defined in `schema.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{
    Deal, EnrichmentData, EnrichmentUpdate, Interaction, Lead, MarketTrends, NewInteraction,
    NewPropertyInterest, PageView, PriorityStat, Property, PropertyInterest, ScoreBreakdown,
    ScoreCategory, ScoreCategoryStat, ScoreUpdate, TeamMember, TeamRole, Utilities,
};
use crate::store::{duplicate_email, LeadStore};

const LEAD_COLUMNS: &str = "id, email, first_name, last_name, phone, company, job_title, source, \
     budget, timeline, location, property_type, interests, score, score_category, \
     score_breakdown, priority, enrichment_data, last_scored, last_enriched, assigned_to, \
     created_at";

const INTERACTION_COLUMNS: &str =
    "id, lead_id, deal_id, interaction_type, method, session_id, notes, metadata, created_at";

const PROPERTY_COLUMNS: &str = "id, address, neighborhood, property_type, list_price, zoning, \
     lot_size, status, development_score, utilities, market_trends";

#[derive(FromRow)]
struct LeadRow {
    id: Uuid,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    job_title: Option<String>,
    source: Option<String>,
    budget: Option<String>,
    timeline: Option<String>,
    location: Option<String>,
    property_type: Option<String>,
    interests: Vec<String>,
    score: Option<i32>,
    score_category: Option<String>,
    score_breakdown: Option<Json<ScoreBreakdown>>,
    priority: Option<String>,
    enrichment_data: Option<Json<EnrichmentData>>,
    last_scored: Option<DateTime<Utc>>,
    last_enriched: Option<DateTime<Utc>>,
    assigned_to: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeadRow> for Lead {
    type Error = AppError;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        Ok(Lead {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            company: row.company,
            job_title: row.job_title,
            source: row.source,
            budget: row.budget,
            timeline: row.timeline,
            location: row.location,
            property_type: row.property_type,
            interests: row.interests,
            score: row.score,
            score_category: row.score_category.map(|c| c.parse()).transpose()?,
            score_breakdown: row.score_breakdown.map(|Json(b)| b),
            priority: row.priority.map(|p| p.parse()).transpose()?,
            enrichment_data: row.enrichment_data.map(|Json(d)| d),
            last_scored: row.last_scored,
            last_enriched: row.last_enriched,
            assigned_to: row.assigned_to,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct InteractionRow {
    id: Uuid,
    lead_id: Uuid,
    deal_id: Option<Uuid>,
    interaction_type: String,
    method: Option<String>,
    session_id: Option<String>,
    notes: Option<String>,
    metadata: Value,
    created_at: DateTime<Utc>,
}

impl From<InteractionRow> for Interaction {
    fn from(row: InteractionRow) -> Self {
        Interaction {
            id: row.id,
            lead_id: row.lead_id,
            deal_id: row.deal_id,
            interaction_type: row.interaction_type,
            method: row.method,
            session_id: row.session_id,
            notes: row.notes,
            metadata: row.metadata,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct PropertyRow {
    id: Uuid,
    address: String,
    neighborhood: String,
    property_type: String,
    list_price: Option<f64>,
    zoning: Option<String>,
    lot_size: Option<f64>,
    status: String,
    development_score: Option<f64>,
    utilities: Option<Json<Utilities>>,
    market_trends: Option<Json<MarketTrends>>,
}

impl From<PropertyRow> for Property {
    fn from(row: PropertyRow) -> Self {
        Property {
            id: row.id,
            address: row.address,
            neighborhood: row.neighborhood,
            property_type: row.property_type,
            list_price: row.list_price,
            zoning: row.zoning,
            lot_size: row.lot_size,
            status: row.status,
            development_score: row.development_score,
            utilities: row.utilities.map(|Json(u)| u),
            market_trends: row.market_trends.map(|Json(t)| t),
        }
    }
}

#[derive(FromRow)]
struct TeamMemberRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    role: String,
    specialties: Vec<String>,
    current_workload: i32,
    is_active: bool,
}

impl TryFrom<TeamMemberRow> for TeamMember {
    type Error = AppError;

    fn try_from(row: TeamMemberRow) -> Result<Self, Self::Error> {
        Ok(TeamMember {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            role: row.role.parse()?,
            specialties: row.specialties,
            current_workload: row.current_workload,
            is_active: row.is_active,
        })
    }
}

#[derive(FromRow)]
struct PropertyInterestRow {
    id: Uuid,
    lead_id: Uuid,
    property_id: Uuid,
    interest: String,
    notes: Option<String>,
    viewed_at: DateTime<Utc>,
}

impl TryFrom<PropertyInterestRow> for PropertyInterest {
    type Error = AppError;

    fn try_from(row: PropertyInterestRow) -> Result<Self, Self::Error> {
        Ok(PropertyInterest {
            id: row.id,
            lead_id: row.lead_id,
            property_id: row.property_id,
            interest: row.interest.parse()?,
            notes: row.notes,
            viewed_at: row.viewed_at,
        })
    }
}

/// `LeadStore` over a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl LeadStore for PgStore {
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {} FROM leads WHERE id = $1",
            LEAD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Loading lead {}", id))?;

        row.map(Lead::try_from).transpose()
    }

    async fn find_lead_by_email(&self, email: &str) -> Result<Option<Lead>, AppError> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {} FROM leads WHERE lower(email) = lower($1)",
            LEAD_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Loading lead by email {}", email))?;

        row.map(Lead::try_from).transpose()
    }

    async fn create_lead(&self, lead: &Lead) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO leads (id, email, first_name, last_name, phone, company, job_title, \
             source, budget, timeline, location, property_type, interests, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(lead.id)
        .bind(&lead.email)
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(&lead.phone)
        .bind(&lead.company)
        .bind(&lead.job_title)
        .bind(&lead.source)
        .bind(&lead.budget)
        .bind(&lead.timeline)
        .bind(&lead.location)
        .bind(&lead.property_type)
        .bind(&lead.interests)
        .bind(lead.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return duplicate_email(&lead.email);
                }
            }
            AppError::WithContext {
                source: Box::new(e.into()),
                context: format!("Creating lead {}", lead.id),
            }
        })?;

        Ok(())
    }

    async fn save_lead_source(&self, id: Uuid, source: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE leads SET source = $2 WHERE id = $1")
            .bind(id)
            .bind(source)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Saving source for lead {}", id))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead not found: {}", id)));
        }
        Ok(())
    }

    async fn list_leads_by_category(
        &self,
        category: ScoreCategory,
        limit: usize,
    ) -> Result<Vec<Lead>, AppError> {
        let rows = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {} FROM leads WHERE score_category = $1 \
             ORDER BY score DESC NULLS LAST, created_at ASC LIMIT $2",
            LEAD_COLUMNS
        ))
        .bind(category.as_str())
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Listing {} leads", category))?;

        rows.into_iter().map(Lead::try_from).collect()
    }

    async fn save_lead_score(&self, id: Uuid, update: &ScoreUpdate) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE leads SET score = $2, score_category = $3, score_breakdown = $4, \
             last_scored = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(update.score)
        .bind(update.score_category.as_str())
        .bind(Json(update.score_breakdown))
        .bind(update.last_scored)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Saving score for lead {}", id))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead not found: {}", id)));
        }
        Ok(())
    }

    async fn save_lead_enrichment(
        &self,
        id: Uuid,
        update: &EnrichmentUpdate,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE leads SET enrichment_data = $2, last_enriched = $3, priority = $4, \
             assigned_to = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(Json(&update.enrichment_data))
        .bind(update.last_enriched)
        .bind(update.priority.as_str())
        .bind(update.assigned_to)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Saving enrichment for lead {}", id))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead not found: {}", id)));
        }
        Ok(())
    }

    async fn score_category_stats(&self) -> Result<Vec<ScoreCategoryStat>, AppError> {
        let rows = sqlx::query_as::<_, (Option<String>, i64, Option<f64>)>(
            "SELECT score_category, COUNT(*) AS count, AVG(score)::float8 AS average_score \
             FROM leads GROUP BY score_category \
             ORDER BY CASE score_category WHEN 'hot' THEN 0 WHEN 'warm' THEN 1 \
             WHEN 'cold' THEN 2 ELSE 3 END",
        )
        .fetch_all(&self.pool)
        .await
        .context("Aggregating score categories")?;

        rows.into_iter()
            .map(|(category, count, average_score)| -> Result<_, AppError> {
                Ok(ScoreCategoryStat {
                    category: category.map(|c| c.parse()).transpose()?,
                    count,
                    average_score,
                })
            })
            .collect()
    }

    async fn priority_stats(&self) -> Result<Vec<PriorityStat>, AppError> {
        let rows = sqlx::query_as::<_, (Option<String>, i64)>(
            "SELECT priority, COUNT(*) AS count FROM leads \
             WHERE last_enriched IS NOT NULL GROUP BY priority \
             ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 \
             WHEN 'low' THEN 2 ELSE 3 END",
        )
        .fetch_all(&self.pool)
        .await
        .context("Aggregating lead priorities")?;

        rows.into_iter()
            .map(|(priority, count)| -> Result<_, AppError> {
                Ok(PriorityStat {
                    priority: priority.map(|p| p.parse()).transpose()?,
                    count,
                })
            })
            .collect()
    }

    async fn list_interactions(&self, lead_id: Uuid) -> Result<Vec<Interaction>, AppError> {
        let rows = sqlx::query_as::<_, InteractionRow>(&format!(
            "SELECT {} FROM interactions WHERE lead_id = $1 ORDER BY created_at ASC",
            INTERACTION_COLUMNS
        ))
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Loading interactions for lead {}", lead_id))?;

        Ok(rows.into_iter().map(Interaction::from).collect())
    }

    async fn create_interaction(&self, new: NewInteraction) -> Result<Interaction, AppError> {
        let row = sqlx::query_as::<_, InteractionRow>(&format!(
            "INSERT INTO interactions \
             (id, lead_id, deal_id, interaction_type, method, session_id, notes, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            INTERACTION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.lead_id)
        .bind(new.deal_id)
        .bind(&new.interaction_type)
        .bind(&new.method)
        .bind(&new.session_id)
        .bind(&new.notes)
        .bind(&new.metadata)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Recording {} interaction", new.interaction_type))?;

        Ok(row.into())
    }

    async fn list_page_views(&self, session_ids: &[String]) -> Result<Vec<PageView>, AppError> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>)>(
            "SELECT id, session_id, page_url, \"timestamp\" FROM page_views \
             WHERE session_id = ANY($1) ORDER BY \"timestamp\" ASC",
        )
        .bind(session_ids)
        .fetch_all(&self.pool)
        .await
        .context("Loading page views")?;

        Ok(rows
            .into_iter()
            .map(|(id, session_id, page_url, timestamp)| PageView {
                id,
                session_id,
                page_url,
                timestamp,
            })
            .collect())
    }

    async fn find_property(&self, id: Uuid) -> Result<Option<Property>, AppError> {
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            "SELECT {} FROM properties WHERE id = $1",
            PROPERTY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Loading property {}", id))?;

        Ok(row.map(Property::from))
    }

    async fn list_properties_by_status(&self, status: &str) -> Result<Vec<Property>, AppError> {
        let rows = sqlx::query_as::<_, PropertyRow>(&format!(
            "SELECT {} FROM properties WHERE status = $1 ORDER BY id",
            PROPERTY_COLUMNS
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Listing {} properties", status))?;

        Ok(rows.into_iter().map(Property::from).collect())
    }

    async fn list_deals(&self) -> Result<Vec<Deal>, AppError> {
        let rows = sqlx::query_as::<
            _,
            (
                Uuid,
                Uuid,
                Option<String>,
                String,
                Option<f64>,
                DateTime<Utc>,
                Option<DateTime<Utc>>,
            ),
        >(
            "SELECT id, lead_id, title, stage, value, created_at, updated_at \
             FROM deals ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Loading deals")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, lead_id, title, stage, value, created_at, updated_at)| Deal {
                    id,
                    lead_id,
                    title,
                    stage,
                    value,
                    created_at,
                    updated_at,
                },
            )
            .collect())
    }

    async fn list_active_team_members(
        &self,
        roles: &[TeamRole],
    ) -> Result<Vec<TeamMember>, AppError> {
        let roles: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();

        let rows = sqlx::query_as::<_, TeamMemberRow>(
            "SELECT id, first_name, last_name, role, specialties, current_workload, is_active \
             FROM team_members WHERE is_active AND role = ANY($1) \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(&roles)
        .fetch_all(&self.pool)
        .await
        .context("Loading active team members")?;

        rows.into_iter().map(TeamMember::try_from).collect()
    }

    async fn create_property_interest(
        &self,
        new: NewPropertyInterest,
    ) -> Result<PropertyInterest, AppError> {
        let row = sqlx::query_as::<_, PropertyInterestRow>(
            "INSERT INTO lead_property_interests (id, lead_id, property_id, interest, notes) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, lead_id, property_id, interest, notes, viewed_at",
        )
        .bind(Uuid::new_v4())
        .bind(new.lead_id)
        .bind(new.property_id)
        .bind(new.interest.as_str())
        .bind(&new.notes)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Recording property interest for lead {}", new.lead_id))?;

        row.try_into()
    }

    async fn list_property_interests(
        &self,
        lead_id: Uuid,
    ) -> Result<Vec<PropertyInterest>, AppError> {
        let rows = sqlx::query_as::<_, PropertyInterestRow>(
            "SELECT id, lead_id, property_id, interest, notes, viewed_at \
             FROM lead_property_interests WHERE lead_id = $1 ORDER BY viewed_at DESC",
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Loading property interests for lead {}", lead_id))?;

        rows.into_iter().map(PropertyInterest::try_from).collect()
    }
}
