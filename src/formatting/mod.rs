//! Canonical tracker entry formatting.
//!
//! Every tracker line is a markdown list item. The shape after the `- `
//! marker depends on the item type:
//!
//! | Type      | Template |
//! |-----------|----------|
//! | action    | `- [ ] 🔼 {content} #task #tag 📅 2026-01-31` |
//! | activity  | `- 2026-01-31 14:05 {content} #tag` |
//! | someday   | `- {content} #someday #tag` |
//! | review    | `- {content} #review #tag (confidence: 42%)` |
//! | reference | `- **{title}**: {content} #tag (added 2026-01-31)` |
//!
//! Rendering reads the time through a [`Clock`], so output is deterministic
//! for a pinned clock.

mod validator;

pub use validator::{FormatValidation, validate_entry};

use crate::clock::{Clock, SystemClock};
use crate::models::{ItemType, Priority};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt::Write as _;
use std::sync::Arc;

/// Format used for activity timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format used for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Tag every action entry carries.
pub const TASK_TAG: &str = "#task";

/// Tag every someday entry carries.
pub const SOMEDAY_TAG: &str = "#someday";

/// Tag every review entry carries.
pub const REVIEW_TAG: &str = "#review";

/// Optional rendering inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatOptions {
    /// Priority glyph for actions.
    pub priority: Option<Priority>,
    /// Extra hashtags, with or without the leading `#`.
    pub tags: Vec<String>,
    /// Due date for actions.
    pub due_date: Option<NaiveDate>,
    /// Classification confidence, shown on review entries.
    pub confidence: Option<f64>,
    /// Title for reference entries.
    pub title: Option<String>,
    /// Timestamp for activity entries; defaults to the clock.
    pub timestamp: Option<NaiveDateTime>,
    /// Render actions with a closed checkbox.
    pub completed: bool,
}

impl FormatOptions {
    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Replaces the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    /// Sets the confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the reference title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the activity timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Renders and validates tracker entries.
#[derive(Clone)]
pub struct FormattingEngine {
    clock: Arc<dyn Clock>,
    show_confidence_scores: bool,
}

impl std::fmt::Debug for FormattingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormattingEngine")
            .field("show_confidence_scores", &self.show_confidence_scores)
            .finish_non_exhaustive()
    }
}

impl Default for FormattingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FormattingEngine {
    /// Creates an engine on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            show_confidence_scores: true,
        }
    }

    /// Creates an engine reading time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            show_confidence_scores: true,
        }
    }

    /// Controls whether review entries include the confidence score.
    #[must_use]
    pub const fn with_confidence_scores(mut self, show: bool) -> Self {
        self.show_confidence_scores = show;
        self
    }

    /// Returns the clock used for rendering.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Converts `at` to wall time in the clock's offset.
    #[must_use]
    pub fn local_time(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(self.clock.now().offset()).naive_local()
    }

    /// Renders `content` as a single-line entry of `item_type`.
    #[must_use]
    pub fn format(&self, item_type: ItemType, content: &str, options: &FormatOptions) -> String {
        let content = normalize_content(content);
        let type_tag = type_tag(item_type);
        let tags = render_tags(&options.tags, type_tag);

        let mut entry = String::from("- ");
        match item_type {
            ItemType::Action => {
                entry.push_str(if options.completed { "[x] " } else { "[ ] " });
                if let Some(priority) = options.priority {
                    entry.push_str(priority.glyph());
                    entry.push(' ');
                }
                entry.push_str(&content);
                entry.push(' ');
                entry.push_str(TASK_TAG);
                entry.push_str(&tags);
                if let Some(due) = options.due_date {
                    let _ = write!(entry, " 📅 {}", due.format(DATE_FORMAT));
                }
            },
            ItemType::Activity => {
                let timestamp = options
                    .timestamp
                    .unwrap_or_else(|| self.clock.now().naive_local());
                let _ = write!(entry, "{} {content}{tags}", timestamp.format(TIMESTAMP_FORMAT));
            },
            ItemType::Someday => {
                let _ = write!(entry, "{content} {SOMEDAY_TAG}{tags}");
            },
            ItemType::Review => {
                let _ = write!(entry, "{content} {REVIEW_TAG}{tags}");
                if self.show_confidence_scores {
                    if let Some(confidence) = options.confidence {
                        let _ = write!(
                            entry,
                            " (confidence: {:.0}%)",
                            confidence.clamp(0.0, 1.0) * 100.0
                        );
                    }
                }
            },
            ItemType::Reference => {
                if let Some(title) = options.title.as_deref().map(normalize_content) {
                    if !title.is_empty() {
                        let _ = write!(entry, "**{title}**: ");
                    }
                }
                let _ = write!(
                    entry,
                    "{content}{tags} (added {})",
                    self.clock.now().date_naive().format(DATE_FORMAT)
                );
            },
        }
        entry
    }

    /// Checks that `entry` follows the template for `item_type`.
    #[must_use]
    pub fn validate(&self, entry: &str, item_type: ItemType) -> FormatValidation {
        validate_entry(entry, item_type)
    }
}

/// Tag implied by the item type, if any.
const fn type_tag(item_type: ItemType) -> Option<&'static str> {
    match item_type {
        ItemType::Action => Some(TASK_TAG),
        ItemType::Someday => Some(SOMEDAY_TAG),
        ItemType::Review => Some(REVIEW_TAG),
        ItemType::Reference | ItemType::Activity => None,
    }
}

/// Collapses whitespace so the entry stays on one line.
fn normalize_content(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes a tag to `#word` form; returns `None` for empty tags.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let body: String = tag
        .trim()
        .trim_start_matches('#')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    if body.is_empty() {
        None
    } else {
        Some(format!("#{body}"))
    }
}

/// Renders extra tags as ` #a #b`, skipping duplicates and the type tag.
fn render_tags(tags: &[String], type_tag: Option<&str>) -> String {
    let mut seen: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().filter_map(|t| normalize_tag(t)) {
        if type_tag.is_some_and(|t| t == tag) || seen.contains(&tag) {
            continue;
        }
        seen.push(tag);
    }
    seen.iter().fold(String::new(), |mut out, tag| {
        out.push(' ');
        out.push_str(tag);
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn engine() -> FormattingEngine {
        let clock = FixedClock::parse("2026-02-03T14:05:00+00:00").unwrap();
        FormattingEngine::with_clock(Arc::new(clock))
    }

    #[test]
    fn test_format_action() {
        let options = FormatOptions::default()
            .with_priority(Priority::High)
            .with_tag("errands")
            .with_due_date(NaiveDate::from_ymd_opt(2026, 2, 10).unwrap());
        let entry = engine().format(ItemType::Action, "Buy  stamps\n", &options);
        assert_eq!(entry, "- [ ] ⏫ Buy stamps #task #errands 📅 2026-02-10");
    }

    #[test]
    fn test_format_action_completed_without_priority() {
        let options = FormatOptions {
            completed: true,
            ..FormatOptions::default()
        };
        let entry = engine().format(ItemType::Action, "File taxes", &options);
        assert_eq!(entry, "- [x] File taxes #task");
    }

    #[test]
    fn test_format_activity_uses_clock() {
        let entry = engine().format(ItemType::Activity, "Walked the dog", &FormatOptions::default());
        assert_eq!(entry, "- 2026-02-03 14:05 Walked the dog");
    }

    #[test]
    fn test_format_activity_explicit_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2025, 12, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let options = FormatOptions::default().with_timestamp(ts);
        let entry = engine().format(ItemType::Activity, "Gym", &options);
        assert_eq!(entry, "- 2025-12-01 08:30 Gym");
    }

    #[test]
    fn test_format_someday_dedupes_type_tag() {
        let options = FormatOptions::default()
            .with_tag("#someday")
            .with_tag("travel")
            .with_tag("travel");
        let entry = engine().format(ItemType::Someday, "Visit Lisbon", &options);
        assert_eq!(entry, "- Visit Lisbon #someday #travel");
    }

    #[test]
    fn test_format_review_with_confidence() {
        let options = FormatOptions::default().with_confidence(0.456);
        let entry = engine().format(ItemType::Review, "Rethink budget", &options);
        assert_eq!(entry, "- Rethink budget #review (confidence: 46%)");

        let hidden = engine().with_confidence_scores(false);
        let entry = hidden.format(ItemType::Review, "Rethink budget", &options);
        assert_eq!(entry, "- Rethink budget #review");
    }

    #[test]
    fn test_format_reference_with_title() {
        let options = FormatOptions::default().with_title("Wifi");
        let entry = engine().format(ItemType::Reference, "password is on the fridge", &options);
        assert_eq!(entry, "- **Wifi**: password is on the fridge (added 2026-02-03)");
    }

    #[test]
    fn test_local_time_uses_clock_offset() {
        let clock = FixedClock::parse("2026-02-03T14:05:00+02:00").unwrap();
        let engine = FormattingEngine::with_clock(Arc::new(clock));
        let at = DateTime::parse_from_rfc3339("2025-01-01T07:15:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let options = FormatOptions::default().with_timestamp(engine.local_time(at));
        let entry = engine.format(ItemType::Activity, "Took meds", &options);
        assert_eq!(entry, "- 2025-01-01 09:15 Took meds");
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("#work").as_deref(), Some("#work"));
        assert_eq!(normalize_tag(" deep work ").as_deref(), Some("#deep-work"));
        assert_eq!(normalize_tag("#"), None);
        assert_eq!(normalize_tag("  "), None);
    }

    #[test]
    fn test_every_type_validates() {
        let engine = engine();
        let options = FormatOptions::default()
            .with_priority(Priority::Low)
            .with_confidence(0.5)
            .with_title("t");
        for item_type in ItemType::all() {
            let entry = engine.format(*item_type, "something", &options);
            let validation = engine.validate(&entry, *item_type);
            assert!(validation.is_valid, "{item_type}: {entry} -> {:?}", validation.issues);
        }
    }
}
