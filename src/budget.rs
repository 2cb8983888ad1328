//! Free-text budget parsing.
//!
//! Leads type budgets by hand ("$500K - $2M", "500k-2m", "750,000 to
//! 1,200,000"). Unparseable input yields `None`; callers treat that as a
//! neutral signal rather than an error.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Each number may carry a unit word ("k", "m", "mil", "million",
/// "thousand"). The word is captured whole so that "1 month" is rejected
/// rather than read as "1m".
static BUDGET_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$?\s*(\d+(?:\.\d+)?)\s*([a-z]+)?\s*(?:-|–|to)\s*\$?\s*(\d+(?:\.\d+)?)\s*([a-z]+)?",
    )
    .expect("budget range pattern is valid")
});

static BUDGET_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?\s*(\d+(?:\.\d+)?)\s*([a-z]+)?").expect("budget amount pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
}

impl BudgetRange {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }

    /// The range widened to `[min * low, max * high]`.
    pub fn widened(&self, low: f64, high: f64) -> BudgetRange {
        BudgetRange {
            min: self.min * low,
            max: self.max * high,
        }
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase().replace(',', "")
}

/// Scale for the word following a number. `Ok(None)` means no unit was
/// written; an unknown word is an error so the budget reads as unparseable.
fn multiplier(unit: Option<&str>) -> Result<Option<f64>, ()> {
    match unit {
        None => Ok(None),
        Some("k" | "thousand") => Ok(Some(1_000.0)),
        Some("m" | "mm" | "mil" | "million" | "millions") => Ok(Some(1_000_000.0)),
        Some("dollars" | "usd") => Ok(Some(1.0)),
        Some(_) => Err(()),
    }
}

/// Parse a budget range into absolute amounts.
///
/// Each bound takes its own unit; a bare lower bound inherits the upper
/// bound's unit ("500-750k" is 500,000 to 750,000, "2-3 million" is
/// 2,000,000 to 3,000,000). A number followed by an unrecognised word
/// yields `None`. Bounds are returned in ascending order.
pub fn parse_budget_range(text: &str) -> Option<BudgetRange> {
    let normalized = normalize(text);
    let caps = BUDGET_RANGE.captures(&normalized)?;

    let low: f64 = caps.get(1)?.as_str().parse().ok()?;
    let high: f64 = caps.get(3)?.as_str().parse().ok()?;
    let low_mult = multiplier(caps.get(2).map(|m| m.as_str())).ok()?;
    let high_mult = multiplier(caps.get(4).map(|m| m.as_str()))
        .ok()?
        .unwrap_or(1.0);

    let min = low * low_mult.unwrap_or(high_mult);
    let max = high * high_mult;

    Some(if min <= max {
        BudgetRange { min, max }
    } else {
        BudgetRange { min: max, max: min }
    })
}

/// Upper end of what a lead says they can spend.
///
/// Ranges yield their maximum; open-ended forms such as "1M+" or
/// "under $500K" yield the single amount mentioned.
pub fn budget_ceiling(text: &str) -> Option<f64> {
    if let Some(range) = parse_budget_range(text) {
        return Some(range.max);
    }

    let normalized = normalize(text);
    let caps = BUDGET_AMOUNT.captures(&normalized)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let mult = multiplier(caps.get(2).map(|m| m.as_str())).ok()?;
    Some(amount * mult.unwrap_or(1.0))
}
