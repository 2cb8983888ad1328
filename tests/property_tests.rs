/// Property-based tests using proptest
/// Invariants that should hold for all inputs
use proptest::prelude::*;
use rust_lead_intel::budget::{budget_ceiling, parse_budget_range};
use rust_lead_intel::matching::{evaluate_property, extract_preferences};
use rust_lead_intel::models::{Lead, Property, ScoreCategory, WebsiteEngagement};
use rust_lead_intel::pipeline::{deal_stages, stage_probability};
use rust_lead_intel::scoring::score_lead;

// Property: categories partition the score line with no gap or overlap
proptest! {
    #[test]
    fn category_follows_thresholds(score in -1000i32..1000) {
        let category = ScoreCategory::from_score(score);
        let expected = if score >= 80 {
            ScoreCategory::Hot
        } else if score >= 60 {
            ScoreCategory::Warm
        } else {
            ScoreCategory::Cold
        };
        prop_assert_eq!(category, expected);
    }
}

// Property: budget parsing never panics and respects suffixes
proptest! {
    #[test]
    fn budget_parsing_never_panics(text in "\\PC*") {
        let _ = parse_budget_range(&text);
        let _ = budget_ceiling(&text);
    }

    #[test]
    fn thousands_to_millions_range_parses(low in 1u32..1000, high in 1u32..100) {
        let text = format!("${}K - ${}M", low, high);
        let range = parse_budget_range(&text).unwrap();
        prop_assert_eq!(range.min, f64::from(low) * 1_000.0);
        prop_assert_eq!(range.max, f64::from(high) * 1_000_000.0);
    }

    #[test]
    fn word_unit_applies_to_both_bounds(low in 1u32..50, span in 0u32..50) {
        let high = low + span;
        let range = parse_budget_range(&format!("{}-{} million", low, high)).unwrap();
        prop_assert_eq!(range.min, f64::from(low) * 1_000_000.0);
        prop_assert_eq!(range.max, f64::from(high) * 1_000_000.0);

        let range = parse_budget_range(&format!("${} - ${} thousand", low, high)).unwrap();
        prop_assert_eq!(range.min, f64::from(low) * 1_000.0);
        prop_assert_eq!(range.max, f64::from(high) * 1_000.0);
    }

    #[test]
    fn unknown_unit_does_not_parse(low in 1u32..50, high in 1u32..50, unit in "(acres|months|years|units)") {
        prop_assert_eq!(parse_budget_range(&format!("{}-{} {}", low, high, unit)), None);
    }

    #[test]
    fn parsed_ranges_are_ordered(a in 0u32..10_000, b in 0u32..10_000) {
        if let Some(range) = parse_budget_range(&format!("{} - {}", a, b)) {
            prop_assert!(range.min <= range.max);
        }
    }
}

// Property: scoring components stay within their caps
proptest! {
    #[test]
    fn score_components_are_bounded(
        tools in proptest::collection::vec("[a-z]{1,8}", 0..5),
        time_on_site in 0i32..500,
        pages in 0i32..50,
        returns in 0i32..10,
        has_phone in any::<bool>(),
        has_budget in any::<bool>(),
    ) {
        let mut lead = Lead::new("prop@example.com");
        if has_phone {
            lead.phone = Some("713-555-0100".into());
        }
        if has_budget {
            lead.budget = Some("$1M - $2M".into());
        }
        let engagement = WebsiteEngagement {
            tool_usage: tools,
            time_on_site,
            pages_visited: pages,
            return_visits: returns,
            ..Default::default()
        };

        let score = score_lead(&lead, &engagement);
        prop_assert!(score.breakdown.contact_quality <= 45);
        prop_assert!(score.breakdown.project_indicators <= 75);
        prop_assert!(score.details.website_engagement.time_on_site <= 10);
        prop_assert_eq!(score.total_score, score.breakdown.total());
        prop_assert_eq!(score.category, ScoreCategory::from_score(score.total_score));
    }
}

// Property: match scores are percentages
proptest! {
    #[test]
    fn match_score_is_within_bounds(
        price in proptest::option::of(0.0f64..50_000_000.0),
        development_score in proptest::option::of(-500.0f64..500.0),
        lot_size in proptest::option::of(0.0f64..100.0),
        neighborhood in "[A-Za-z ]{0,12}",
        budget in "\\PC{0,20}",
    ) {
        let mut lead = Lead::new("prop@example.com");
        lead.budget = Some(budget);
        lead.location = Some("Katy".into());
        let interests = extract_preferences(&lead);

        let property = Property {
            neighborhood,
            property_type: "residential".into(),
            list_price: price,
            development_score,
            lot_size,
            status: "available".into(),
            ..Default::default()
        };

        let m = evaluate_property(&property, &interests);
        prop_assert!((0..=100).contains(&m.match_score));
    }
}

// Property: unknown stages carry no probability
proptest! {
    #[test]
    fn unknown_stage_probability_is_zero(stage in "[a-z_]{1,20}") {
        prop_assume!(!deal_stages().iter().any(|s| s.id == stage));
        prop_assert_eq!(stage_probability(&stage), 0);
    }
}
