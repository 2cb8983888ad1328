//! Website engagement aggregation.
//!
//! Turns a lead's interaction log and the page views of the sessions those
//! interactions reference into engagement metrics for scoring.

use std::collections::HashSet;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Interaction, PageView, WebsiteEngagement};
use crate::store::LeadStore;

/// Interaction type recorded when a lead uses an on-site tool.
pub const TOOL_USAGE_INTERACTION: &str = "tool_usage";

/// Gaps of this many minutes or more start a new visit and add no time.
pub const SESSION_GAP_MINUTES: f64 = 30.0;

/// Fetch a lead's interactions and page views and aggregate them.
pub async fn collect_engagement(
    store: &dyn LeadStore,
    lead_id: Uuid,
) -> Result<WebsiteEngagement, AppError> {
    let interactions = store.list_interactions(lead_id).await?;

    let mut session_ids: Vec<String> = Vec::new();
    for session_id in interactions.iter().filter_map(|i| i.session_id.as_deref()) {
        if !session_id.is_empty() && !session_ids.iter().any(|s| s == session_id) {
            session_ids.push(session_id.to_string());
        }
    }

    let page_views = if session_ids.is_empty() {
        Vec::new()
    } else {
        store.list_page_views(&session_ids).await?
    };

    tracing::debug!(
        "Engagement for lead {}: {} interactions, {} sessions, {} page views",
        lead_id,
        interactions.len(),
        session_ids.len(),
        page_views.len()
    );

    Ok(aggregate_engagement(&interactions, page_views))
}

/// Pure aggregation over already-fetched records.
pub fn aggregate_engagement(
    interactions: &[Interaction],
    mut page_views: Vec<PageView>,
) -> WebsiteEngagement {
    page_views.sort_by_key(|pv| pv.timestamp);

    WebsiteEngagement {
        tool_usage: extract_tool_usage(interactions),
        time_on_site: total_time_on_site(&page_views),
        pages_visited: saturating_i32(page_views.len()),
        return_visits: return_visits(&page_views),
        first_visit: page_views.first().map(|pv| pv.timestamp),
        last_visit: page_views.last().map(|pv| pv.timestamp),
    }
}

/// Distinct tool names, in first-seen order.
///
/// Tools come from `tool_usage` interactions (the method names the tool)
/// and from `tool` fields in interaction metadata, either top-level or
/// nested under `formData`.
pub fn extract_tool_usage(interactions: &[Interaction]) -> Vec<String> {
    let mut tools: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim();
        if !name.is_empty() && !tools.iter().any(|t| t == name) {
            tools.push(name.to_string());
        }
    };

    for interaction in interactions {
        if interaction.interaction_type == TOOL_USAGE_INTERACTION {
            if let Some(method) = interaction.method.as_deref() {
                push(method);
            }
        }

        let metadata = &interaction.metadata;
        let tool = metadata
            .get("tool")
            .or_else(|| metadata.get("formData").and_then(|f| f.get("tool")))
            .and_then(|v| v.as_str());
        if let Some(tool) = tool {
            push(tool);
        }
    }

    tools
}

/// Whole minutes spent on site, from page views sorted by timestamp.
///
/// Only deltas strictly between 0 and 30 minutes count.
pub fn total_time_on_site(sorted_page_views: &[PageView]) -> i32 {
    let minutes: f64 = sorted_page_views
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 60_000.0)
        .filter(|delta| *delta > 0.0 && *delta < SESSION_GAP_MINUTES)
        .sum();

    minutes.round() as i32
}

/// Distinct sessions beyond the first.
pub fn return_visits(page_views: &[PageView]) -> i32 {
    let sessions: HashSet<&str> = page_views.iter().map(|pv| pv.session_id.as_str()).collect();
    saturating_i32(sessions.len().saturating_sub(1))
}

pub(crate) fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn view(session: &str, minutes: i64) -> PageView {
        PageView {
            id: Uuid::new_v4(),
            session_id: session.to_string(),
            page_url: "/".to_string(),
            timestamp: at(minutes),
        }
    }

    fn interaction(kind: &str, method: Option<&str>, metadata: serde_json::Value) -> Interaction {
        Interaction {
            id: Uuid::new_v4(),
            lead_id: Uuid::nil(),
            deal_id: None,
            interaction_type: kind.to_string(),
            method: method.map(String::from),
            session_id: Some("s1".to_string()),
            notes: None,
            metadata,
            created_at: at(0),
        }
    }

    #[test]
    fn test_tool_usage_collapses_duplicates() {
        let interactions = vec![
            interaction("tool_usage", Some("roi_calculator"), json!(null)),
            interaction("tool_usage", Some("market_report"), json!(null)),
            interaction("form_submit", None, json!({"formData": {"tool": "roi_calculator"}})),
            interaction("page_event", None, json!({"tool": "zoning_lookup"})),
        ];

        assert_eq!(
            extract_tool_usage(&interactions),
            vec!["roi_calculator", "market_report", "zoning_lookup"]
        );
    }

    #[test]
    fn test_time_on_site_ignores_long_gaps() {
        let views = vec![view("s1", 0), view("s1", 5), view("s1", 10), view("s2", 60 * 24)];
        assert_eq!(total_time_on_site(&views), 10);
    }

    #[test]
    fn test_time_on_site_excludes_exactly_thirty_minutes() {
        let views = vec![view("s1", 0), view("s1", 30)];
        assert_eq!(total_time_on_site(&views), 0);
    }

    #[test]
    fn test_time_on_site_rounds_fractional_minutes() {
        let base = view("s1", 0);
        let mut later = view("s1", 0);
        later.timestamp = base.timestamp + Duration::seconds(90);
        assert_eq!(total_time_on_site(&[base, later]), 2);
    }

    #[test]
    fn test_return_visits_floor_at_zero() {
        assert_eq!(return_visits(&[]), 0);
        assert_eq!(return_visits(&[view("s1", 0), view("s1", 1)]), 0);
        assert_eq!(
            return_visits(&[view("s1", 0), view("s2", 100), view("s3", 200)]),
            2
        );
    }

    #[test]
    fn test_aggregate_sorts_page_views() {
        let views = vec![view("s1", 10), view("s1", 0), view("s1", 5)];
        let engagement = aggregate_engagement(&[], views);

        assert_eq!(engagement.pages_visited, 3);
        assert_eq!(engagement.time_on_site, 10);
        assert_eq!(engagement.first_visit, Some(at(0)));
        assert_eq!(engagement.last_visit, Some(at(10)));
    }
}
