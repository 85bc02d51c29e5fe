//! Entry validation against the canonical templates.

// Static regex patterns are known to compile
#![allow(clippy::expect_used)]

use super::{DATE_FORMAT, REVIEW_TAG, SOMEDAY_TAG, TASK_TAG, TIMESTAMP_FORMAT};
use crate::models::ItemType;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static CHECKBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[[ xX]\] ").expect("static regex: checkbox"));

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2} \d{2}:\d{2}\b").expect("static regex: timestamp")
});

static DUE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"📅 (\S+)").expect("static regex: due date"));

/// Result of validating an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatValidation {
    /// Whether the entry conforms.
    pub is_valid: bool,
    /// Problems found, empty when valid.
    pub issues: Vec<String>,
}

/// Checks `entry` against the template for `item_type`.
#[must_use]
pub fn validate_entry(entry: &str, item_type: ItemType) -> FormatValidation {
    let mut issues = Vec::new();

    if entry.contains('\n') {
        issues.push("Entry must be a single line".to_string());
    }
    if !entry.starts_with("- ") {
        issues.push("Entry must start with a '- ' list marker".to_string());
    }

    match item_type {
        ItemType::Action => {
            if !CHECKBOX.is_match(entry) {
                issues.push("Action entry is missing a '[ ]' or '[x]' checkbox".to_string());
            }
            if !has_tag(entry, TASK_TAG) {
                issues.push(format!("Action entry is missing the {TASK_TAG} tag"));
            }
            if let Some(due) = DUE_DATE.captures(entry).and_then(|c| c.get(1)) {
                if NaiveDate::parse_from_str(due.as_str(), DATE_FORMAT).is_err() {
                    issues.push(format!("Invalid due date '{}'", due.as_str()));
                }
            }
        },
        ItemType::Activity => match TIMESTAMP.find(entry) {
            Some(found) => {
                if NaiveDateTime::parse_from_str(found.as_str(), TIMESTAMP_FORMAT).is_err() {
                    issues.push(format!("Invalid timestamp '{}'", found.as_str()));
                }
            },
            None => {
                issues.push("Activity entry is missing a YYYY-MM-DD HH:mm timestamp".to_string());
            },
        },
        ItemType::Someday => {
            if !has_tag(entry, SOMEDAY_TAG) {
                issues.push(format!("Someday entry is missing the {SOMEDAY_TAG} tag"));
            }
        },
        ItemType::Review => {
            if !has_tag(entry, REVIEW_TAG) {
                issues.push(format!("Review entry is missing the {REVIEW_TAG} tag"));
            }
        },
        ItemType::Reference => {},
    }

    FormatValidation {
        is_valid: issues.is_empty(),
        issues,
    }
}

fn has_tag(entry: &str, tag: &str) -> bool {
    entry.split_whitespace().any(|word| word == tag)
}
