//! Opportunity matching: infer what a lead is looking for and rank the
//! available properties against it.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use crate::budget::parse_budget_range;
use crate::errors::AppError;
use crate::experience::classify_development_experience;
use crate::models::{
    Demand, DevelopmentExperience, InterestLevel, Lead, LeadInterests,
    NewPropertyInterest, PriceTrend, Property, PropertyInterest, PropertyMatch,
};
use crate::store::LeadStore;

/// Houston-area neighborhoods recognised in free text.
pub const NEIGHBORHOODS: [&str; 22] = [
    "Katy",
    "Woodlands",
    "Sugar Land",
    "Pearland",
    "Cypress",
    "Spring",
    "Tomball",
    "Magnolia",
    "Conroe",
    "Kingwood",
    "Humble",
    "Atascocita",
    "Baytown",
    "Pasadena",
    "League City",
    "Friendswood",
    "Clear Lake",
    "Webster",
    "Dickinson",
    "La Porte",
    "Deer Park",
    "Channelview",
];

pub const PROJECT_TYPES: [&str; 14] = [
    "residential",
    "commercial",
    "mixed-use",
    "industrial",
    "retail",
    "office",
    "warehouse",
    "apartment",
    "single-family",
    "townhouse",
    "condo",
    "subdivision",
    "development",
    "construction",
];

pub const AVAILABLE_STATUS: &str = "available";
pub const DEFAULT_MATCH_LIMIT: usize = 5;
/// Matches must score strictly above this.
pub const MIN_MATCH_SCORE: i32 = 50;

const NEUTRAL_FIT: f64 = 50.0;
const RESTRICTIVE_ZONING: [&str; 2] = ["agricultural", "conservation"];

/// "commercial zoning", "zoned R-2"
static ZONING_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z0-9][a-z0-9-]*)\s+zoning\b|\bzoned\s+([a-z0-9][a-z0-9-]*)")
        .expect("zoning pattern is valid")
});

const ZONING_STOP_WORDS: [&str; 8] = ["no", "any", "the", "a", "of", "for", "with", "and"];

// ============ Preferences ============

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        values.push(value.to_string());
    }
}

/// Vocabulary entries found (case-insensitively) in any of the texts.
fn vocabulary_matches<'a>(
    texts: impl Iterator<Item = &'a str>,
    vocabulary: &[&str],
) -> Vec<String> {
    let mut found = Vec::new();
    for text in texts {
        let text = text.to_lowercase();
        for term in vocabulary {
            if text.contains(&term.to_lowercase()) {
                push_unique(&mut found, term);
            }
        }
    }
    found
}

pub fn extract_neighborhoods(interests: &[String], location: Option<&str>) -> Vec<String> {
    let texts = interests.iter().map(String::as_str).chain(location);
    vocabulary_matches(texts, &NEIGHBORHOODS)
}

pub fn extract_project_types(interests: &[String], property_type: Option<&str>) -> Vec<String> {
    let texts = interests.iter().map(String::as_str).chain(property_type);
    vocabulary_matches(texts, &PROJECT_TYPES)
}

pub fn extract_zoning_preferences(interests: &[String]) -> Vec<String> {
    let mut zones = Vec::new();
    for interest in interests {
        for caps in ZONING_PHRASE.captures_iter(interest) {
            let Some(zone) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            let zone = zone.as_str();
            if !ZONING_STOP_WORDS.contains(&zone.to_lowercase().as_str()) {
                push_unique(&mut zones, zone);
            }
        }
    }
    zones
}

/// Preferences inferred from a lead record. Pure.
pub fn extract_preferences(lead: &Lead) -> LeadInterests {
    let present = |v: &Option<String>| {
        v.as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
    };

    LeadInterests {
        neighborhoods: extract_neighborhoods(&lead.interests, lead.location.as_deref()),
        project_types: extract_project_types(&lead.interests, lead.property_type.as_deref()),
        budget_range: present(&lead.budget),
        timeline: present(&lead.timeline),
        zoning_preferences: extract_zoning_preferences(&lead.interests),
        development_experience: classify_development_experience(
            lead.enrichment_data.as_ref(),
            &lead.interests,
        ),
    }
}

// ============ Fit scores ============

/// 100 inside the stated range, then 80 and 60 for progressively wider
/// bands, else 30. Neutral when either side is unknown.
pub fn budget_fit(list_price: Option<f64>, budget: Option<&str>) -> f64 {
    let (Some(price), Some(range)) = (
        list_price.filter(|p| *p > 0.0),
        budget.and_then(parse_budget_range),
    ) else {
        return NEUTRAL_FIT;
    };

    if range.contains(price) {
        100.0
    } else if range.widened(0.8, 1.2).contains(price) {
        80.0
    } else if range.widened(0.6, 1.4).contains(price) {
        60.0
    } else {
        30.0
    }
}

/// Exact match 100, substring overlap 80, else 30. Neutral without preferences.
pub fn preference_fit(value: &str, preferred: &[String]) -> f64 {
    if preferred.is_empty() {
        return NEUTRAL_FIT;
    }

    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return 30.0;
    }

    let preferred: Vec<String> = preferred.iter().map(|p| p.to_lowercase()).collect();
    if preferred.iter().any(|p| *p == value) {
        100.0
    } else if preferred
        .iter()
        .any(|p| value.contains(p.as_str()) || p.contains(value.as_str()))
    {
        80.0
    } else {
        30.0
    }
}

pub fn development_potential(property: &Property, interests: &LeadInterests) -> f64 {
    let mut score = 50.0;

    if let Some(zoning) = property.zoning.as_deref() {
        if interests
            .zoning_preferences
            .iter()
            .any(|z| z.eq_ignore_ascii_case(zoning.trim()))
        {
            score += 20.0;
        }
    }
    if property.lot_size.is_some_and(|size| size > 1.0) {
        score += 15.0;
    }
    if let Some(dev) = property.development_score {
        score += (dev - 50.0) * 0.3;
    }

    score.clamp(0.0, 100.0)
}

/// Component fits for one property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchComponents {
    pub budget: f64,
    pub location: f64,
    pub project_type: f64,
    pub potential: f64,
}

impl MatchComponents {
    pub fn compute(property: &Property, interests: &LeadInterests) -> Self {
        Self {
            budget: budget_fit(property.list_price, interests.budget_range.as_deref()),
            location: preference_fit(&property.neighborhood, &interests.neighborhoods),
            project_type: preference_fit(&property.property_type, &interests.project_types),
            potential: development_potential(property, interests),
        }
    }

    /// Weighted 40/30/20/10 and rounded; always within 0..=100.
    pub fn score(&self) -> i32 {
        (self.budget * 0.4 + self.location * 0.3 + self.project_type * 0.2 + self.potential * 0.1)
            .round() as i32
    }

    pub fn reasoning(&self, property: &Property) -> Vec<String> {
        let mut reasoning = Vec::new();

        if self.budget >= 80.0 {
            reasoning.push("Perfect budget fit".to_string());
        } else if self.budget >= 60.0 {
            reasoning.push("Good budget alignment".to_string());
        }

        if self.location >= 80.0 {
            reasoning.push("Preferred location match".to_string());
        } else if self.location >= 60.0 {
            reasoning.push("Good location proximity".to_string());
        }

        if self.project_type >= 80.0 {
            reasoning.push("Ideal project type".to_string());
        } else if self.project_type >= 60.0 {
            reasoning.push("Suitable project type".to_string());
        }

        if property.development_score.is_some_and(|d| d > 70.0) {
            reasoning.push("High development potential".to_string());
        }

        reasoning
    }
}

pub fn next_steps(property: &Property, interests: &LeadInterests) -> Vec<String> {
    let mut steps = vec![
        "Schedule property viewing".to_string(),
        "Prepare due diligence package".to_string(),
    ];
    if interests.development_experience == DevelopmentExperience::None {
        steps.push("Provide development education materials".to_string());
    }
    if property.development_score.is_some_and(|d| d > 80.0) {
        steps.push("Highlight development opportunities".to_string());
    }
    steps
}

pub fn risk_factors(property: &Property) -> Vec<String> {
    let mut risks = Vec::new();

    if let Some(zoning) = property.zoning.as_deref() {
        if RESTRICTIVE_ZONING.contains(&zoning.trim().to_lowercase().as_str()) {
            risks.push("Zoning restrictions may limit development".to_string());
        }
    }
    if property.utilities.is_some_and(|u| !u.water) {
        risks.push("No water utility access".to_string());
    }
    if property
        .market_trends
        .is_some_and(|t| t.price_trend == PriceTrend::Declining)
    {
        risks.push("Declining market conditions".to_string());
    }

    risks
}

pub fn market_conditions(property: &Property) -> String {
    let summary = match property.market_trends {
        None => "Market conditions unknown",
        Some(t) if t.price_trend == PriceTrend::Increasing && t.demand == Demand::High => {
            "Favorable market conditions"
        }
        Some(t) if t.price_trend == PriceTrend::Stable && t.demand == Demand::Moderate => {
            "Stable market conditions"
        }
        Some(_) => "Challenging market conditions",
    };
    summary.to_string()
}

/// Evaluate one property against a lead's preferences.
pub fn evaluate_property(property: &Property, interests: &LeadInterests) -> PropertyMatch {
    let components = MatchComponents::compute(property, interests);

    PropertyMatch {
        property_id: property.id,
        match_score: components.score(),
        reasoning: components.reasoning(property),
        next_steps: next_steps(property, interests),
        risk_factors: risk_factors(property),
        market_conditions: market_conditions(property),
        property: property.clone(),
    }
}

/// Keep matches above the threshold, best first, at most `limit`.
pub fn rank_matches(
    properties: &[Property],
    interests: &LeadInterests,
    limit: usize,
) -> Vec<PropertyMatch> {
    let mut matches: Vec<PropertyMatch> = properties
        .iter()
        .map(|p| evaluate_property(p, interests))
        .filter(|m| m.match_score > MIN_MATCH_SCORE)
        .collect();

    // Stable sort keeps store order among equal scores.
    matches.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    matches.truncate(limit);
    matches
}

// ============ Service ============

#[derive(Clone)]
pub struct OpportunityMatchingService {
    store: Arc<dyn LeadStore>,
}

impl OpportunityMatchingService {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    async fn load_lead(&self, lead_id: Uuid) -> Result<Lead, AppError> {
        self.store
            .find_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead not found: {}", lead_id)))
    }

    pub async fn get_lead_preferences(&self, lead_id: Uuid) -> Result<LeadInterests, AppError> {
        let lead = self.load_lead(lead_id).await?;
        Ok(extract_preferences(&lead))
    }

    pub async fn find_matches(
        &self,
        lead_id: Uuid,
        limit: usize,
    ) -> Result<Vec<PropertyMatch>, AppError> {
        let interests = self.get_lead_preferences(lead_id).await?;
        let properties = self.store.list_properties_by_status(AVAILABLE_STATUS).await?;

        let matches = rank_matches(&properties, &interests, limit);
        tracing::info!(
            "Lead {}: {} of {} available properties matched",
            lead_id,
            matches.len(),
            properties.len()
        );
        Ok(matches)
    }

    pub async fn create_property_interest(
        &self,
        lead_id: Uuid,
        property_id: Uuid,
        interest: InterestLevel,
        notes: Option<String>,
    ) -> Result<PropertyInterest, AppError> {
        self.load_lead(lead_id).await?;
        if self.store.find_property(property_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Property not found: {}",
                property_id
            )));
        }

        let created = self
            .store
            .create_property_interest(NewPropertyInterest {
                lead_id,
                property_id,
                interest,
                notes,
            })
            .await?;

        tracing::info!(
            "Lead {} marked {} interest in property {}",
            lead_id,
            interest,
            property_id
        );
        Ok(created)
    }

    /// Most recently viewed first.
    pub async fn lead_property_interests(
        &self,
        lead_id: Uuid,
    ) -> Result<Vec<PropertyInterest>, AppError> {
        self.load_lead(lead_id).await?;
        self.store.list_property_interests(lead_id).await
    }
}
