//! Development-experience classification shared by scoring and matching.

use crate::models::{DevelopmentExperience, EnrichmentData};

/// Transaction types that count as hands-on development work.
const DEVELOPMENT_TRANSACTION_TYPES: [&str; 2] = ["development", "construction"];

/// Interest keywords that mark a lead as at least a first-time developer.
const DEVELOPMENT_KEYWORDS: [&str; 4] = ["development", "construction", "building", "project"];

/// More than this many development transactions makes a lead experienced.
const EXPERIENCED_TRANSACTION_COUNT: usize = 2;

/// Classify a lead's development experience.
///
/// Property history wins when it holds development or construction
/// transactions; otherwise development-flavoured interests imply a
/// first-time developer.
pub fn classify_development_experience(
    enrichment: Option<&EnrichmentData>,
    interests: &[String],
) -> DevelopmentExperience {
    let development_transactions = enrichment
        .and_then(|data| data.property_history.as_ref())
        .map(|history| {
            history
                .transactions
                .iter()
                .filter(|t| {
                    let kind = t.transaction_type.to_lowercase();
                    DEVELOPMENT_TRANSACTION_TYPES.contains(&kind.as_str())
                })
                .count()
        })
        .unwrap_or(0);

    if development_transactions > EXPERIENCED_TRANSACTION_COUNT {
        return DevelopmentExperience::Experienced;
    }
    if development_transactions > 0 {
        return DevelopmentExperience::FirstTime;
    }

    let has_development_interest = interests.iter().any(|interest| {
        let interest = interest.to_lowercase();
        DEVELOPMENT_KEYWORDS
            .iter()
            .any(|keyword| interest.contains(keyword))
    });

    if has_development_interest {
        DevelopmentExperience::FirstTime
    } else {
        DevelopmentExperience::None
    }
}
