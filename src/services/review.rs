//! Review queue.
//!
//! Holds items the classifier was not sure about until a person accepts,
//! edits, moves or rejects them.
//!
//! # Lifecycle
//!
//! ```text
//! flag ──► pending (confidence < auto threshold)
//!      └─► flagged (otherwise)
//!
//! pending | flagged ──edit/move──► same status, entry re-rendered
//!                   ──accept─────► tracker append ──ok──► confirmed, removed
//!                                                 └─fail─► unchanged
//!                   ──reject─────► removed, nothing written
//! ```
//!
//! The queue state sits behind a [`std::sync::Mutex`] that is never held
//! across an `.await`. Accept renders under the lock, releases it for the
//! tracker write, then re-acquires it to remove the item. An in-flight set
//! keeps a second action on the same item out while the write is pending.

use crate::config::ReviewConfig;
use crate::formatting::{FormatOptions, FormattingEngine, normalize_tag};
use crate::models::{
    BatchReviewResult, FlagRequest, ReviewAction, ReviewActionOutcome, ReviewActionRequest,
    ReviewId, ReviewStatus, ReviewStatusCounts, ReviewValues, ReviewableItem, TrackerId,
};
use crate::storage::{ReviewSnapshot, TrackerWriter};
use crate::{Error, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Something that can take items for review.
///
/// The capture engine only needs this one operation, so it depends on the
/// trait rather than the concrete queue.
pub trait ReviewSink: Send + Sync {
    /// Adds an item to the review queue.
    ///
    /// # Errors
    ///
    /// Returns `ReviewQueueFailure` if the item cannot be queued.
    fn flag_item_for_review(&self, request: FlagRequest) -> Result<ReviewableItem>;
}

#[derive(Debug, Default)]
struct QueueState {
    /// Items in insertion order.
    items: Vec<ReviewableItem>,
    /// Items with a tracker write in progress.
    in_flight: HashSet<ReviewId>,
    /// Items confirmed over the queue's lifetime.
    confirmed_total: u64,
}

impl QueueState {
    fn position(&self, id: &ReviewId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }
}

/// In-memory review queue.
pub struct ReviewQueue {
    config: ReviewConfig,
    formatter: FormattingEngine,
    writer: Arc<dyn TrackerWriter>,
    state: Mutex<QueueState>,
}

impl ReviewQueue {
    /// Creates an empty queue writing accepted items through `writer`.
    #[must_use]
    pub fn new(
        config: ReviewConfig,
        formatter: FormattingEngine,
        writer: Arc<dyn TrackerWriter>,
    ) -> Self {
        Self {
            config,
            formatter,
            writer,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Returns the review configuration.
    #[must_use]
    pub const fn config(&self) -> &ReviewConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state.lock().map_err(|e| Error::OperationFailed {
            operation: "review_queue_lock".to_string(),
            cause: e.to_string(),
        })
    }

    /// Renders the entry that accept would write for `item`.
    fn render(&self, item: &ReviewableItem) -> String {
        let options = FormatOptions::default()
            .with_priority(item.metadata.urgency)
            .with_tags(item.metadata.tags.clone())
            .with_confidence(item.confidence)
            .with_timestamp(self.formatter.local_time(item.timestamp));
        self.formatter
            .format(item.metadata.item_type, &item.content, &options)
    }

    fn initial_status(&self, confidence: f64) -> ReviewStatus {
        if confidence < self.config.auto_review_threshold {
            ReviewStatus::Pending
        } else {
            ReviewStatus::Flagged
        }
    }

    /// Adds an item to the queue.
    ///
    /// Items below the auto-review threshold start `pending`, the rest
    /// `flagged`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the content is blank
    /// - `ReviewQueueFailure` if the queue is full
    #[tracing::instrument(
        name = "sortbox.review.flag",
        skip_all,
        fields(tracker = %request.tracker, confidence = request.confidence)
    )]
    pub fn flag_item_for_review(&self, request: FlagRequest) -> Result<ReviewableItem> {
        if request.content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "review item content cannot be empty".to_string(),
            ));
        }
        let confidence = if request.confidence.is_nan() {
            0.0
        } else {
            request.confidence.clamp(0.0, 1.0)
        };

        let mut item = ReviewableItem {
            id: ReviewId::generate(),
            content: request.content.trim().to_string(),
            rendered_entry: String::new(),
            confidence,
            current_section: request.section,
            current_tracker: request.tracker,
            timestamp: request
                .timestamp
                .unwrap_or_else(|| self.formatter.clock().now().with_timezone(&Utc)),
            source: request.source,
            review_status: self.initial_status(confidence),
            metadata: request.metadata,
        };
        item.rendered_entry = self.render(&item);

        let mut state = self.lock()?;
        if state.items.len() >= self.config.max_queue_size {
            metrics::counter!("sortbox_review_rejected_full_total").increment(1);
            return Err(Error::ReviewQueueFailure(format!(
                "review queue is full ({} items)",
                self.config.max_queue_size
            )));
        }
        state.items.push(item.clone());
        drop(state);

        metrics::counter!(
            "sortbox_review_flagged_total",
            "status" => item.review_status.as_str()
        )
        .increment(1);
        tracing::info!(
            review_id = %item.id,
            status = %item.review_status,
            "Flagged item for review"
        );
        Ok(item)
    }

    /// Lists items awaiting review, optionally for one tracker.
    ///
    /// # Errors
    ///
    /// Returns `OperationFailed` if the queue lock is poisoned.
    pub fn get_items_needing_review(
        &self,
        tracker: Option<&TrackerId>,
    ) -> Result<Vec<ReviewableItem>> {
        let state = self.lock()?;
        Ok(state
            .items
            .iter()
            .filter(|item| item.review_status.needs_review())
            .filter(|item| tracker.is_none_or(|t| &item.current_tracker == t))
            .cloned()
            .collect())
    }

    /// Returns the oldest items awaiting review, at most `limit` of them.
    ///
    /// `limit` defaults to the configured batch size.
    ///
    /// # Errors
    ///
    /// Returns `OperationFailed` if the queue lock is poisoned.
    pub fn next_batch(
        &self,
        tracker: Option<&TrackerId>,
        limit: Option<usize>,
    ) -> Result<Vec<ReviewableItem>> {
        let limit = limit.unwrap_or(self.config.default_batch_size);
        let mut items = self.get_items_needing_review(tracker)?;
        items.sort_by_key(|item| item.timestamp);
        items.truncate(limit);
        Ok(items)
    }

    /// Looks up one item.
    ///
    /// # Errors
    ///
    /// Returns `OperationFailed` if the queue lock is poisoned.
    pub fn get_review_item(&self, id: &ReviewId) -> Result<Option<ReviewableItem>> {
        let state = self.lock()?;
        Ok(state.position(id).map(|idx| state.items[idx].clone()))
    }

    /// Counts items by status.
    ///
    /// # Errors
    ///
    /// Returns `OperationFailed` if the queue lock is poisoned.
    pub fn get_review_status(&self) -> Result<ReviewStatusCounts> {
        let state = self.lock()?;
        let mut counts = ReviewStatusCounts {
            total: state.items.len(),
            confirmed_total: state.confirmed_total,
            ..ReviewStatusCounts::default()
        };
        for item in &state.items {
            match item.review_status {
                ReviewStatus::Pending => counts.pending += 1,
                ReviewStatus::Flagged => counts.flagged += 1,
                ReviewStatus::Confirmed => counts.confirmed += 1,
            }
        }
        Ok(counts)
    }

    /// Number of items currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |state| state.items.len())
    }

    /// Returns true if the queue holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies one review action.
    ///
    /// Returns `Ok(false)` only when accept could not write the entry; the
    /// item is then left untouched.
    ///
    /// # Errors
    ///
    /// - `ItemNotFound` if no item has this id
    /// - `InvalidInput` if an edit is missing its new value
    /// - `ReviewQueueFailure` if another action on the item is in progress
    #[tracing::instrument(
        name = "sortbox.review.action",
        skip_all,
        fields(review_id = %id, action = action.as_str())
    )]
    pub async fn process_review_action(
        &self,
        id: &ReviewId,
        action: ReviewAction,
        values: ReviewValues,
    ) -> Result<bool> {
        let outcome = match action {
            ReviewAction::Accept => self.accept(id).await,
            ReviewAction::Reject => self.reject(id).map(|()| true),
            _ => self.edit(id, action, &values).map(|()| true),
        };
        let status = match &outcome {
            Ok(true) => "success",
            Ok(false) => "write_failed",
            Err(_) => "error",
        };
        metrics::counter!(
            "sortbox_review_actions_total",
            "action" => action.as_str(),
            "status" => status
        )
        .increment(1);
        outcome
    }

    async fn accept(&self, id: &ReviewId) -> Result<bool> {
        let (tracker, entry) = {
            let mut state = self.lock()?;
            let idx = Self::claimable(&state, id)?;
            let item = &state.items[idx];
            let claim = (item.current_tracker.clone(), self.render(item));
            state.in_flight.insert(id.clone());
            claim
        };

        let written = self.writer.append(&tracker, &entry).await;

        let mut state = self.lock()?;
        state.in_flight.remove(id);
        match written {
            Ok(true) => {
                if let Some(idx) = state.position(id) {
                    state.items[idx].review_status = ReviewStatus::Confirmed;
                    state.items.remove(idx);
                }
                state.confirmed_total += 1;
                drop(state);
                tracing::info!(review_id = %id, tracker = %tracker, "Accepted review item");
                Ok(true)
            },
            Ok(false) => {
                drop(state);
                tracing::warn!(review_id = %id, tracker = %tracker, "Tracker declined accepted entry");
                Ok(false)
            },
            Err(err) => {
                drop(state);
                tracing::warn!(
                    review_id = %id,
                    tracker = %tracker,
                    error = %err,
                    "Tracker write failed; item left in queue"
                );
                Ok(false)
            },
        }
    }

    fn reject(&self, id: &ReviewId) -> Result<()> {
        let mut state = self.lock()?;
        let idx = Self::claimable(&state, id)?;
        state.items.remove(idx);
        drop(state);
        tracing::info!(review_id = %id, "Rejected review item");
        Ok(())
    }

    fn edit(&self, id: &ReviewId, action: ReviewAction, values: &ReviewValues) -> Result<()> {
        let mut state = self.lock()?;
        let idx = Self::claimable(&state, id)?;
        let item = &mut state.items[idx];

        match action {
            ReviewAction::EditPriority => {
                item.metadata.urgency = values
                    .priority
                    .ok_or_else(|| missing_value(action, "priority"))?;
            },
            ReviewAction::EditTags => {
                let tags = values
                    .tags
                    .as_ref()
                    .ok_or_else(|| missing_value(action, "tags"))?;
                let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
                for tag in tags.iter().filter_map(|t| normalize_tag(t)) {
                    if !normalized.contains(&tag) {
                        normalized.push(tag);
                    }
                }
                item.metadata.tags = normalized;
            },
            ReviewAction::EditType => {
                let item_type = values
                    .item_type
                    .ok_or_else(|| missing_value(action, "type"))?;
                item.metadata.item_type = item_type;
                item.current_section = values
                    .section
                    .clone()
                    .unwrap_or_else(|| item_type.default_section().to_string());
            },
            ReviewAction::Move => {
                let tracker = values
                    .tracker
                    .clone()
                    .ok_or_else(|| missing_value(action, "tracker"))?;
                if !tracker.is_valid() {
                    return Err(Error::InvalidInput(format!(
                        "'{tracker}' is not a valid tracker id"
                    )));
                }
                item.current_tracker = tracker;
                if let Some(section) = &values.section {
                    item.current_section.clone_from(section);
                }
            },
            ReviewAction::Accept | ReviewAction::Reject => {
                return Err(Error::InvalidInput(format!(
                    "'{action}' is not an edit action"
                )));
            },
        }

        let rendered = self.render(item);
        item.rendered_entry = rendered;
        tracing::debug!(review_id = %id, action = %action, "Edited review item");
        Ok(())
    }

    /// Finds an item that no other action is currently writing.
    fn claimable(state: &QueueState, id: &ReviewId) -> Result<usize> {
        let idx = state
            .position(id)
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))?;
        if state.in_flight.contains(id) {
            return Err(Error::ReviewQueueFailure(format!(
                "item {id} is being accepted"
            )));
        }
        Ok(idx)
    }

    /// Applies a list of actions in order, continuing past failures.
    pub async fn batch_process_review(
        &self,
        requests: Vec<ReviewActionRequest>,
    ) -> BatchReviewResult {
        let mut result = BatchReviewResult::default();
        for request in requests {
            let outcome = match ReviewAction::from_str(&request.action) {
                Ok(action) => {
                    self.process_review_action(&request.item_id, action, request.new_values)
                        .await
                },
                Err(err) => Err(err),
            };
            let (success, error) = match outcome {
                Ok(true) => (true, None),
                Ok(false) => (false, Some("tracker write failed".to_string())),
                Err(err) => (false, Some(err.to_string())),
            };
            if success {
                result.success += 1;
            } else {
                result.failed += 1;
            }
            result.results.push(ReviewActionOutcome {
                item_id: request.item_id,
                action: request.action,
                success,
                error,
            });
        }
        tracing::info!(
            succeeded = result.success,
            failed = result.failed,
            "Processed review batch"
        );
        result
    }

    /// Removes any items left in the `confirmed` state.
    ///
    /// Accept already removes what it confirms; this sweeps up anything
    /// restored from an older snapshot.
    ///
    /// # Errors
    ///
    /// Returns `OperationFailed` if the queue lock is poisoned.
    pub fn clear_confirmed_items(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let before = state.items.len();
        state
            .items
            .retain(|item| item.review_status != ReviewStatus::Confirmed);
        Ok(before - state.items.len())
    }

    /// Captures the queue contents for persistence.
    ///
    /// # Errors
    ///
    /// Returns `OperationFailed` if the queue lock is poisoned.
    pub fn snapshot(&self) -> Result<ReviewSnapshot> {
        let state = self.lock()?;
        Ok(ReviewSnapshot::new(state.items.clone(), state.confirmed_total))
    }

    /// Replaces the queue contents with a snapshot.
    ///
    /// Returns the number of items restored.
    ///
    /// # Errors
    ///
    /// Returns `OperationFailed` if the queue lock is poisoned.
    pub fn restore(&self, snapshot: ReviewSnapshot) -> Result<usize> {
        let mut state = self.lock()?;
        state.items = snapshot.items;
        state.confirmed_total = snapshot.confirmed_total;
        state.in_flight.clear();
        Ok(state.items.len())
    }
}

impl ReviewSink for ReviewQueue {
    fn flag_item_for_review(&self, request: FlagRequest) -> Result<ReviewableItem> {
        Self::flag_item_for_review(self, request)
    }
}

fn missing_value(action: ReviewAction, field: &str) -> Error {
    Error::InvalidInput(format!("'{action}' requires a new {field}"))
}
