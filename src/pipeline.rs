//! Deal pipeline: the fixed stage table and value aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::AppError;
use crate::models::{Deal, DealStage, PipelineMetrics, TransitionEstimate};
use crate::store::LeadStore;

pub const DEAL_STAGES: [DealStage; 8] = [
    DealStage {
        id: "lead",
        name: "Lead",
        order: 1,
        probability: 5,
        color: "#6B7280",
        description: "Initial contact captured",
    },
    DealStage {
        id: "qualified",
        name: "Qualified",
        order: 2,
        probability: 25,
        color: "#3B82F6",
        description: "Meets budget/timeline criteria",
    },
    DealStage {
        id: "consultation",
        name: "Consultation",
        order: 3,
        probability: 40,
        color: "#8B5CF6",
        description: "Phone/meeting scheduled",
    },
    DealStage {
        id: "property_identified",
        name: "Property Identified",
        order: 4,
        probability: 60,
        color: "#F59E0B",
        description: "Specific opportunity presented",
    },
    DealStage {
        id: "due_diligence",
        name: "Due Diligence",
        order: 5,
        probability: 75,
        color: "#EF4444",
        description: "Client evaluating opportunity",
    },
    DealStage {
        id: "negotiation",
        name: "Negotiation",
        order: 6,
        probability: 85,
        color: "#EC4899",
        description: "Terms being discussed",
    },
    DealStage {
        id: "contract",
        name: "Contract",
        order: 7,
        probability: 95,
        color: "#10B981",
        description: "Deal under contract",
    },
    DealStage {
        id: "closed",
        name: "Closed",
        order: 8,
        probability: 100,
        color: "#059669",
        description: "Transaction completed",
    },
];

/// Fixed estimates, not derived from deal history.
const CONVERSION_RATES: [(&str, &str); 5] = [
    ("Lead → Qualified", "25%"),
    ("Qualified → Consultation", "60%"),
    ("Consultation → Property ID", "40%"),
    ("Property ID → Contract", "15%"),
    ("Contract → Closed", "85%"),
];

const AVERAGE_TIME_IN_STAGE: [(&str, &str); 5] = [
    ("Lead → Qualified", "3 days"),
    ("Qualified → Consultation", "7 days"),
    ("Consultation → Property ID", "14 days"),
    ("Property ID → Contract", "30 days"),
    ("Contract → Closed", "45 days"),
];

pub fn deal_stages() -> &'static [DealStage] {
    &DEAL_STAGES
}

/// Close probability in percent; 0 for stages outside the table.
pub fn stage_probability(stage_id: &str) -> u32 {
    DEAL_STAGES
        .iter()
        .find(|s| s.id == stage_id)
        .map(|s| s.probability)
        .unwrap_or(0)
}

fn estimates(table: &[(&str, &str)]) -> Vec<TransitionEstimate> {
    table
        .iter()
        .map(|(transition, value)| TransitionEstimate {
            transition: transition.to_string(),
            value: value.to_string(),
        })
        .collect()
}

/// Stage counts and total/weighted value over every deal. A deal without
/// a value counts toward its stage but adds nothing.
pub fn aggregate_pipeline(deals: &[Deal]) -> PipelineMetrics {
    let mut stage_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_pipeline_value = 0.0;
    let mut weighted_pipeline_value = 0.0;

    for deal in deals {
        *stage_counts.entry(deal.stage.clone()).or_insert(0) += 1;

        let value = deal.value.unwrap_or(0.0);
        total_pipeline_value += value;
        weighted_pipeline_value += value * f64::from(stage_probability(&deal.stage)) / 100.0;
    }

    PipelineMetrics {
        conversion_rates: estimates(&CONVERSION_RATES),
        average_time_in_stage: estimates(&AVERAGE_TIME_IN_STAGE),
        stage_counts,
        total_pipeline_value,
        weighted_pipeline_value,
    }
}

#[derive(Clone)]
pub struct PipelineMetricsService {
    store: Arc<dyn LeadStore>,
}

impl PipelineMetricsService {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    pub async fn get_pipeline_metrics(&self) -> Result<PipelineMetrics, AppError> {
        let deals = self.store.list_deals().await?;
        let metrics = aggregate_pipeline(&deals);

        tracing::debug!(
            "Pipeline metrics over {} deals: total {}, weighted {}",
            deals.len(),
            metrics.total_pipeline_value,
            metrics.weighted_pipeline_value
        );
        Ok(metrics)
    }
}
