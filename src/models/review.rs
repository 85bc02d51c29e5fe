//! Review queue types.

use super::{ItemType, Priority, TrackerId};
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a review item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(String);

impl ReviewId {
    /// Creates a review ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, collision-free review ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("review_{}", uuid::Uuid::new_v4()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReviewId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ReviewId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Review state of a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// Low confidence; needs attention first.
    Pending,
    /// Moderate confidence; waiting for confirmation.
    Flagged,
    /// Accepted and written. Terminal.
    Confirmed,
}

impl ReviewStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Flagged => "flagged",
            Self::Confirmed => "confirmed",
        }
    }

    /// Returns true if the item still needs a decision.
    #[must_use]
    pub const fn needs_review(&self) -> bool {
        matches!(self, Self::Pending | Self::Flagged)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a review item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSource {
    /// Flagged while processing a capture.
    #[default]
    Capture,
    /// Flagged by a standalone inference pass.
    Inference,
}

impl ReviewSource {
    /// Returns the source as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Inference => "inference",
        }
    }
}

/// Editable classification metadata of a review item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMetadata {
    /// Search tokens taken from the capture text.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Priority the entry will be written with.
    pub urgency: Priority,
    /// Item kind the entry will be written as.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Fields a reviewer may change.
    #[serde(default)]
    pub editable_fields: Vec<String>,
    /// Hashtags appended to the written entry.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ReviewMetadata {
    /// Fields editable through review actions.
    pub const EDITABLE_FIELDS: [&'static str; 4] = ["priority", "tags", "type", "tracker"];

    /// Creates metadata with the default editable fields.
    #[must_use]
    pub fn new(item_type: ItemType, urgency: Priority, keywords: Vec<String>) -> Self {
        Self {
            keywords,
            urgency,
            item_type,
            editable_fields: Self::EDITABLE_FIELDS.iter().map(ToString::to_string).collect(),
            tags: Vec::new(),
        }
    }
}

/// An item waiting in the review queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewableItem {
    /// Queue id.
    pub id: ReviewId,
    /// Item text as classified.
    pub content: String,
    /// Entry that will be written on accept; follows the metadata.
    pub rendered_entry: String,
    /// Classification confidence at flagging time.
    pub confidence: f64,
    /// Section within the tracker.
    pub current_section: String,
    /// Tracker the entry will be written to.
    pub current_tracker: TrackerId,
    /// When the item was flagged.
    pub timestamp: DateTime<Utc>,
    /// Where the item came from.
    pub source: ReviewSource,
    /// Review state.
    pub review_status: ReviewStatus,
    /// Editable metadata.
    pub metadata: ReviewMetadata,
}

/// Parameters for `ReviewSink::flag_item_for_review`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagRequest {
    /// Item text.
    pub content: String,
    /// Classification confidence.
    pub confidence: f64,
    /// Tracker the classifier picked.
    pub tracker: TrackerId,
    /// Section within the tracker.
    pub section: String,
    /// Where the item came from.
    pub source: ReviewSource,
    /// Classification metadata.
    pub metadata: ReviewMetadata,
    /// When the capture was made; the queue clock is used when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A review decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewAction {
    /// Write the item to its tracker and drop it from the queue.
    Accept,
    /// Drop the item without writing.
    Reject,
    /// Change the priority.
    EditPriority,
    /// Replace the hashtags.
    EditTags,
    /// Change the item type.
    EditType,
    /// Change the destination tracker.
    Move,
}

impl ReviewAction {
    /// Returns the action as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::EditPriority => "edit-priority",
            Self::EditTags => "edit-tags",
            Self::EditType => "edit-type",
            Self::Move => "move",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReviewAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            "edit-priority" | "edit_priority" => Ok(Self::EditPriority),
            "edit-tags" | "edit_tags" => Ok(Self::EditTags),
            "edit-type" | "edit_type" => Ok(Self::EditType),
            "move" => Ok(Self::Move),
            _ => Err(Error::UnknownReviewAction(s.to_string())),
        }
    }
}

/// New values carried by edit and move actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewValues {
    /// New priority for `edit-priority`.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// New hashtags for `edit-tags`.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// New item type for `edit-type`.
    #[serde(default, rename = "type")]
    pub item_type: Option<ItemType>,
    /// New tracker for `move`.
    #[serde(default)]
    pub tracker: Option<TrackerId>,
    /// New section for `move` or `edit-type`.
    #[serde(default)]
    pub section: Option<String>,
}

/// One entry of a batch review request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewActionRequest {
    /// Target item.
    pub item_id: ReviewId,
    /// Action name, parsed per entry.
    pub action: String,
    /// Values for edit and move actions.
    #[serde(default)]
    pub new_values: ReviewValues,
}

/// Outcome of one batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewActionOutcome {
    /// Target item.
    pub item_id: ReviewId,
    /// Action name as requested.
    pub action: String,
    /// Whether the action took effect.
    pub success: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `ReviewQueue::batch_process_review`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReviewResult {
    /// Number of entries that took effect.
    pub success: usize,
    /// Number of entries that failed.
    pub failed: usize,
    /// Per-entry outcomes in request order.
    pub results: Vec<ReviewActionOutcome>,
}

/// Queue counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatusCounts {
    /// Items with status `pending`.
    pub pending: usize,
    /// Items with status `flagged`.
    pub flagged: usize,
    /// Items with status `confirmed` still in the queue (normally 0).
    pub confirmed: usize,
    /// Items in the queue.
    pub total: usize,
    /// Items accepted since the queue was created.
    pub confirmed_total: u64,
}
