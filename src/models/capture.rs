//! Capture request and result types.

use super::{ItemType, Priority, ReviewId, TrackerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a capture reached the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// Typed text.
    #[default]
    Text,
    /// Dictated and transcribed.
    Voice,
}

impl InputType {
    /// Returns the input type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }
}

/// A single user submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureInput {
    /// Raw capture text.
    pub text: String,
    /// How the text was entered.
    #[serde(default)]
    pub input_type: InputType,
    /// Context the user pinned for this capture (e.g. "work").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_context: Option<String>,
    /// When the capture was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CaptureInput {
    /// Creates a text capture.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            input_type: InputType::Text,
            force_context: None,
            timestamp: None,
        }
    }

    /// Builds a capture from raw text and caller options.
    #[must_use]
    pub fn from_options(text: impl Into<String>, options: &CaptureOptions) -> Self {
        Self {
            text: text.into(),
            input_type: options.input_type,
            force_context: options.force_context.clone(),
            timestamp: options.timestamp,
        }
    }

    /// Sets the input type.
    #[must_use]
    pub const fn with_input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    /// Sets the forced context.
    #[must_use]
    pub fn with_force_context(mut self, context: impl Into<String>) -> Self {
        self.force_context = Some(context.into());
        self
    }
}

/// Options accepted by `CaptureEngine::capture`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    /// How the text was entered.
    #[serde(default)]
    pub input_type: InputType,
    /// Context the user pinned for this capture.
    #[serde(default)]
    pub force_context: Option<String>,
    /// Prior context handed to the classifier (recent captures, open tasks).
    #[serde(default)]
    pub prior_context: Option<String>,
    /// When the capture was made.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CaptureOptions {
    /// Marks the capture as dictated.
    #[must_use]
    pub const fn voice(mut self) -> Self {
        self.input_type = InputType::Voice;
        self
    }

    /// Sets the forced context.
    #[must_use]
    pub fn with_force_context(mut self, context: impl Into<String>) -> Self {
        self.force_context = Some(context.into());
        self
    }

    /// Sets the prior context.
    #[must_use]
    pub fn with_prior_context(mut self, context: impl Into<String>) -> Self {
        self.prior_context = Some(context.into());
        self
    }

    /// Sets when the capture was made.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Outcome for one generated item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureItemResult {
    /// Where the item ended up: its own tracker, or `review`.
    pub tracker: TrackerId,
    /// Tracker the classifier picked.
    pub inferred_tracker: TrackerId,
    /// Item kind.
    pub item_type: ItemType,
    /// Item priority.
    pub priority: Priority,
    /// Item text.
    pub content: String,
    /// Confidence used for the review decision.
    pub confidence: f64,
    /// Whether the item was written or queued.
    pub success: bool,
    /// Whether the item is waiting for a human decision.
    pub requires_review: bool,
    /// Review queue id, when the item was queued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<ReviewId>,
    /// Entry written to the tracker, when one was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome for one detected task completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletionResult {
    /// Tracker holding the task.
    pub tracker: TrackerId,
    /// Task description.
    pub description: String,
    /// Whether the task was marked complete.
    pub success: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    /// Whether every item path ran to completion.
    pub success: bool,
    /// First item's effective tracker, or `review`.
    pub primary_tracker: TrackerId,
    /// Overall classification confidence.
    pub confidence: f64,
    /// Per-item outcomes in generation order.
    pub item_results: Vec<CaptureItemResult>,
    /// Completion-marking outcomes.
    pub completed_tasks: Vec<TaskCompletionResult>,
    /// Whether any item is waiting for review.
    pub requires_review: bool,
    /// Fatal error description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Degraded paths taken while processing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl CaptureResult {
    /// Creates a failed result carrying an error message.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            primary_tracker: TrackerId::review(),
            confidence: 0.0,
            item_results: Vec::new(),
            completed_tasks: Vec::new(),
            requires_review: false,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_input_from_options() {
        let options = CaptureOptions::default()
            .voice()
            .with_force_context("work");
        let input = CaptureInput::from_options("ship the report", &options);

        assert_eq!(input.text, "ship the report");
        assert_eq!(input.input_type, InputType::Voice);
        assert_eq!(input.force_context.as_deref(), Some("work"));
    }

    #[test]
    fn test_failure_result() {
        let result = CaptureResult::failure("provider down");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("provider down"));
        assert!(result.item_results.is_empty());
    }

    #[test]
    fn test_capture_result_serializes_camel_case() {
        let result = CaptureResult::failure("x");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("primaryTracker").is_some());
        assert!(json.get("requiresReview").is_some());
        assert!(json.get("warnings").is_none());
    }
}
