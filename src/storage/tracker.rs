//! Tracker writer traits.

use crate::Result;
use crate::models::TrackerId;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Appends rendered entries to trackers.
#[async_trait]
pub trait TrackerWriter: Send + Sync {
    /// Backend name, for logs and metrics.
    fn name(&self) -> &'static str;

    /// Appends one rendered entry to `tracker`.
    ///
    /// Returns `Ok(false)` when the backend declined the write without an
    /// I/O error.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn append(&self, tracker: &TrackerId, entry: &str) -> Result<bool>;
}

/// Marks existing tasks as done.
#[async_trait]
pub trait TaskCompletionMarker: Send + Sync {
    /// Marks the first open task in `tracker` matching `description` as done.
    ///
    /// Returns `Ok(false)` when no open task matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be read or rewritten.
    async fn mark_complete(&self, tracker: &TrackerId, description: &str) -> Result<bool>;
}

/// Closes an open task line if it mentions `description`.
///
/// Matching is case-insensitive on the text after the checkbox. Returns the
/// rewritten line, or `None` if the line is not an open task or does not
/// match.
#[must_use]
pub fn complete_task_line(line: &str, description: &str, today: NaiveDate) -> Option<String> {
    let needle = description.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let rest = line.strip_prefix("- [ ] ")?;
    if !rest.to_lowercase().contains(&needle) {
        return None;
    }
    Some(format!(
        "- [x] {} ✅ {}",
        rest.trim_end(),
        today.format(crate::formatting::DATE_FORMAT)
    ))
}
