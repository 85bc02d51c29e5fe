//! Property-based tests for routing and formatting.
//!
//! Uses proptest to verify invariants across random inputs:
//! - The review decision follows the action and non-action thresholds
//! - Lowering confidence never un-flags an item
//! - Every formatted entry validates against its own type
//! - Keyword extraction never yields stop words or repeats

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use sortbox::formatting::FormatOptions;
use sortbox::llm::parse_inference_result;
use sortbox::services::{extract_keywords, should_flag_for_review};
use sortbox::{FixedClock, FormattingEngine, ItemType, Priority};
use std::sync::Arc;

fn item_type() -> impl Strategy<Value = ItemType> {
    prop::sample::select(ItemType::all().to_vec())
}

fn priority() -> impl Strategy<Value = Priority> {
    prop::sample::select(Priority::all().to_vec())
}

fn engine() -> FormattingEngine {
    let clock = FixedClock::parse("2026-06-01T18:45:00+02:00").unwrap();
    FormattingEngine::with_clock(Arc::new(clock))
}

// ============================================================================
// Review Decision
// ============================================================================

proptest! {
    /// Property: actions are held up to and including 0.8, regardless of threshold.
    #[test]
    fn prop_action_cutoff_ignores_threshold(confidence in 0.0f64..=1.0, threshold in 0.0f64..=1.0) {
        prop_assert_eq!(
            should_flag_for_review(confidence, ItemType::Action, threshold),
            confidence <= 0.8
        );
    }

    /// Property: other types are held strictly below the threshold.
    #[test]
    fn prop_non_action_uses_threshold(
        confidence in 0.0f64..=1.0,
        threshold in 0.0f64..=1.0,
        item_type in item_type().prop_filter("non-action", |t| *t != ItemType::Action),
    ) {
        prop_assert_eq!(
            should_flag_for_review(confidence, item_type, threshold),
            confidence < threshold
        );
    }

    /// Property: if an item is held, any less confident item is held too.
    #[test]
    fn prop_flagging_is_monotonic(
        a in 0.0f64..=1.0,
        b in 0.0f64..=1.0,
        threshold in 0.0f64..=1.0,
        item_type in item_type(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        if should_flag_for_review(high, item_type, threshold) {
            prop_assert!(should_flag_for_review(low, item_type, threshold));
        }
    }
}

// ============================================================================
// Formatting
// ============================================================================

proptest! {
    /// Property: formatted entries always validate as their own type.
    #[test]
    fn prop_formatted_entries_validate(
        item_type in item_type(),
        priority in priority(),
        content in "[A-Za-z][A-Za-z0-9 ,.'-]{0,60}",
        tags in prop::collection::vec("[a-z]{1,10}", 0..4),
        confidence in 0.0f64..=1.0,
    ) {
        let engine = engine();
        let options = FormatOptions::default()
            .with_priority(priority)
            .with_tags(tags)
            .with_confidence(confidence);
        let entry = engine.format(item_type, &content, &options);
        let validation = engine.validate(&entry, item_type);
        prop_assert!(validation.is_valid, "{entry:?}: {:?}", validation.issues);
        prop_assert!(!entry.contains('\n'));
    }

    /// Property: multi-line content is flattened onto one line.
    #[test]
    fn prop_content_stays_single_line(
        item_type in item_type(),
        lines in prop::collection::vec("[a-z]{1,8}", 1..5),
    ) {
        let entry = engine().format(item_type, &lines.join("\n"), &FormatOptions::default());
        prop_assert!(!entry.contains('\n'));
        prop_assert!(entry.contains(&lines.join(" ")));
    }
}

// ============================================================================
// Keywords and Provider Output
// ============================================================================

proptest! {
    /// Property: keywords are lowercase and unique.
    #[test]
    fn prop_keywords_unique_lowercase(text in "[A-Za-z ,.!?]{0,120}") {
        let keywords = extract_keywords(&text);
        let mut seen = std::collections::HashSet::new();
        for keyword in &keywords {
            prop_assert_eq!(keyword, &keyword.to_lowercase());
            prop_assert!(keyword.chars().count() > 1);
            prop_assert!(seen.insert(keyword.clone()), "duplicate keyword {}", keyword);
        }
    }

    /// Property: provider confidence is clamped into [0, 1].
    #[test]
    fn prop_parsed_confidence_clamped(confidence in -10.0f64..10.0) {
        let json = format!(
            r#"{{"primaryTracker":"actions","confidence":{confidence},"generatedItems":[{{"tracker":"actions","itemType":"action","content":"x"}}]}}"#
        );
        let result = parse_inference_result(&json).unwrap();
        prop_assert!((0.0..=1.0).contains(&result.confidence));
    }
}
