//! Classification output types.

use super::TrackerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of item produced from a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Something to do.
    #[default]
    Action,
    /// Something to revisit or reflect on.
    Review,
    /// Information to keep.
    Reference,
    /// An idea for later, not committed to.
    Someday,
    /// A log of something that happened.
    Activity,
}

impl ItemType {
    /// Returns all item types.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Action,
            Self::Review,
            Self::Reference,
            Self::Someday,
            Self::Activity,
        ]
    }

    /// Returns the item type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Review => "review",
            Self::Reference => "reference",
            Self::Someday => "someday",
            Self::Activity => "activity",
        }
    }

    /// Tracker section an item of this type lands in.
    #[must_use]
    pub const fn default_section(&self) -> &'static str {
        match self {
            Self::Action => "Actions",
            Self::Review => "Review",
            Self::Reference => "Reference",
            Self::Someday => "Someday/Maybe",
            Self::Activity => "Activity Log",
        }
    }

    /// Parses an item type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "action" | "task" => Some(Self::Action),
            "review" => Some(Self::Review),
            "reference" | "ref" => Some(Self::Reference),
            "someday" | "someday-maybe" => Some(Self::Someday),
            "activity" | "log" => Some(Self::Activity),
            _ => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Item priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Drop everything.
    #[serde(alias = "urgent")]
    Critical,
    /// Soon.
    High,
    /// Normal.
    #[default]
    #[serde(alias = "normal")]
    Medium,
    /// Whenever.
    Low,
}

impl Priority {
    /// Returns all priorities, most urgent first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Critical, Self::High, Self::Medium, Self::Low]
    }

    /// Returns the priority as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Glyph used in rendered action entries.
    #[must_use]
    pub const fn glyph(&self) -> &'static str {
        match self {
            Self::Critical => "🔺",
            Self::High => "⏫",
            Self::Medium => "🔼",
            Self::Low => "🔽",
        }
    }

    /// Parses a priority from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" | "urgent" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" | "normal" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One classified fragment of a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedItem {
    /// Destination tracker.
    pub tracker: TrackerId,
    /// Item kind.
    pub item_type: ItemType,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Item text.
    pub content: String,
    /// Why the classifier chose this tracker and type.
    #[serde(default)]
    pub reasoning: String,
    /// Free-form urgency hint ("today", "this week", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_sensitivity: Option<String>,
    /// Free-form effort hint ("5 minutes", "half a day", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<String>,
    /// Per-item classification confidence, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl GeneratedItem {
    /// Creates an item with medium priority and no hints.
    #[must_use]
    pub fn new(tracker: impl Into<TrackerId>, item_type: ItemType, content: impl Into<String>) -> Self {
        Self {
            tracker: tracker.into(),
            item_type,
            priority: Priority::default(),
            content: content.into(),
            reasoning: String::new(),
            time_sensitivity: None,
            estimated_effort: None,
            confidence: None,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the per-item confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the reasoning.
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Confidence used for the review decision.
    ///
    /// Falls back to the capture-level confidence when the provider did not
    /// score this item separately.
    #[must_use]
    pub fn effective_confidence(&self, overall: f64) -> f64 {
        self.confidence.unwrap_or(overall)
    }
}

/// Detection that an existing tracked task appears finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    /// Tracker holding the task.
    pub tracker: TrackerId,
    /// Description used to find the task.
    pub description: String,
    /// Why the classifier believes the task is done.
    #[serde(default)]
    pub reasoning: String,
}

/// Output of one classification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    /// Tracker the capture mostly belongs to.
    pub primary_tracker: TrackerId,
    /// Overall confidence in [0, 1].
    pub confidence: f64,
    /// Explanation of the overall classification.
    #[serde(default)]
    pub overall_reasoning: String,
    /// Items to route, in order.
    #[serde(default)]
    pub generated_items: Vec<GeneratedItem>,
    /// Tasks the capture reports as finished.
    #[serde(default)]
    pub task_completions: Vec<TaskCompletion>,
    /// Whether any part of the capture needs a human decision.
    #[serde(default)]
    pub requires_review: bool,
}
