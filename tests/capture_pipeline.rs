//! Capture pipeline integration tests.
//!
//! Drives `CaptureEngine` end to end with a scripted provider and the
//! in-memory tracker backend:
//! - Routing between direct writes and the review queue
//! - Review queue fallback when flagging fails
//! - Provider failures and write failures
//! - Task completion

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sortbox::models::{FlagRequest, ReviewSource, ReviewValues};
use sortbox::storage::{FileTrackerStore, InMemoryTrackerWriter};
use sortbox::{
    CaptureEngine, CaptureOptions, ClassificationProvider, Error, FixedClock, FormattingEngine,
    GeneratedItem, InferenceEngine, InferenceResult, ItemType, Priority, Result, ReviewAction,
    ReviewConfig, ReviewQueue, ReviewSink, ReviewableItem, TaskCompletion, TrackerId,
    TrackerWriter,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

/// Provider returning a fixed inference result, or a fixed error.
struct ScriptedProvider {
    outcome: std::result::Result<InferenceResult, String>,
}

#[async_trait]
impl ClassificationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete_with_system(&self, _system: &str, _user: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn classify(&self, _text: &str, _context: Option<&str>) -> Result<InferenceResult> {
        self.outcome.clone().map_err(|cause| Error::ProviderUnavailable {
            provider: "scripted".to_string(),
            cause,
        })
    }
}

/// Review sink that always refuses.
struct BrokenReviewSink;

impl ReviewSink for BrokenReviewSink {
    fn flag_item_for_review(&self, _request: FlagRequest) -> Result<ReviewableItem> {
        Err(Error::ReviewQueueFailure("storage offline".to_string()))
    }
}

/// Tracker writer that fails every append.
struct FailingWriter;

#[async_trait]
impl TrackerWriter for FailingWriter {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn append(&self, tracker: &TrackerId, _entry: &str) -> Result<bool> {
        Err(Error::WriteFailed {
            tracker: tracker.to_string(),
            cause: "disk full".to_string(),
        })
    }
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::parse("2026-03-14T09:26:00+00:00").unwrap())
}

fn inference(confidence: f64, items: Vec<GeneratedItem>) -> InferenceResult {
    InferenceResult {
        primary_tracker: items
            .first()
            .map_or_else(|| TrackerId::new("actions"), |i| i.tracker.clone()),
        confidence,
        overall_reasoning: "scripted".to_string(),
        generated_items: items,
        task_completions: Vec::new(),
        requires_review: false,
    }
}

fn inference_engine(outcome: std::result::Result<InferenceResult, String>) -> InferenceEngine {
    InferenceEngine::new(
        Arc::new(ScriptedProvider { outcome }),
        ReviewConfig::default(),
    )
    .with_timeout(Duration::from_secs(5))
}

struct Pipeline {
    engine: CaptureEngine,
    queue: Arc<ReviewQueue>,
    trackers: Arc<InMemoryTrackerWriter>,
}

fn pipeline(outcome: std::result::Result<InferenceResult, String>) -> Pipeline {
    let clock = clock();
    let formatter = FormattingEngine::with_clock(clock.clone());
    let trackers = Arc::new(InMemoryTrackerWriter::with_clock(clock));
    let queue = Arc::new(ReviewQueue::new(
        ReviewConfig::default(),
        formatter.clone(),
        trackers.clone(),
    ));
    let engine = CaptureEngine::new(
        inference_engine(outcome),
        queue.clone(),
        trackers.clone(),
        trackers.clone(),
        formatter,
    );
    Pipeline {
        engine,
        queue,
        trackers,
    }
}

fn file_pipeline(
    dir: &TempDir,
    outcome: std::result::Result<InferenceResult, String>,
) -> CaptureEngine {
    let clock = clock();
    let formatter = FormattingEngine::with_clock(clock.clone());
    let trackers = Arc::new(FileTrackerStore::new(dir.path()).with_clock(clock));
    let queue = Arc::new(ReviewQueue::new(
        ReviewConfig::default(),
        formatter.clone(),
        trackers.clone(),
    ));
    CaptureEngine::new(
        inference_engine(outcome),
        queue,
        trackers.clone(),
        trackers,
        formatter,
    )
}

fn captured_at() -> DateTime<Utc> {
    "2025-01-01T07:15:00Z".parse().unwrap()
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_low_confidence_action_is_queued_with_keywords() {
    let item = GeneratedItem::new("actions", ItemType::Action, "Schedule the project meeting")
        .with_priority(Priority::High);
    let p = pipeline(Ok(inference(0.4, vec![item])));

    let result = p
        .engine
        .capture("urgent project meeting schedule", CaptureOptions::default())
        .await;

    assert!(result.success);
    assert!(result.requires_review);
    assert_eq!(result.primary_tracker, TrackerId::review());
    assert!(p.trackers.is_empty(), "nothing should be written yet");

    let queued = p.queue.get_items_needing_review(None).unwrap();
    assert_eq!(queued.len(), 1);
    let item = &queued[0];
    assert_eq!(
        item.metadata.keywords,
        vec!["urgent", "project", "meeting", "schedule"]
    );
    assert_eq!(item.metadata.item_type, ItemType::Action);
    assert_eq!(item.metadata.urgency, Priority::High);
    assert_eq!(item.source, ReviewSource::Capture);
    assert_eq!(item.current_tracker.as_str(), "actions");
    assert_eq!(
        result.item_results[0].review_id.as_ref(),
        Some(&item.id),
        "result should point at the queued item"
    );
}

#[tokio::test]
async fn test_high_confidence_items_are_written_directly() {
    let items = vec![
        GeneratedItem::new("actions", ItemType::Action, "Renew passport")
            .with_priority(Priority::Critical),
        GeneratedItem::new("reference", ItemType::Reference, "Passport office opens at 9"),
    ];
    let p = pipeline(Ok(inference(0.95, items)));

    let result = p
        .engine
        .capture(
            "renew passport, office opens at 9",
            CaptureOptions::default(),
        )
        .await;

    assert!(result.success);
    assert!(!result.requires_review);
    assert_eq!(result.primary_tracker.as_str(), "actions");
    assert!(p.queue.is_empty());

    assert_eq!(
        p.trackers.entries("actions"),
        vec!["- [ ] 🔺 Renew passport #task".to_string()]
    );
    assert_eq!(
        p.trackers.entries("reference"),
        vec!["- Passport office opens at 9 (added 2026-03-14)".to_string()]
    );
    assert!(result.item_results.iter().all(|r| r.success));
}

#[tokio::test]
async fn test_mixed_capture_splits_routes() {
    let items = vec![
        GeneratedItem::new("actions", ItemType::Action, "Call the plumber").with_confidence(0.6),
        GeneratedItem::new("someday", ItemType::Someday, "Learn to tile").with_confidence(0.9),
    ];
    let p = pipeline(Ok(inference(0.75, items)));

    let result = p
        .engine
        .capture("call plumber, someday learn tiling", CaptureOptions::default())
        .await;

    assert!(result.requires_review);
    assert_eq!(result.primary_tracker, TrackerId::review());
    assert_eq!(p.queue.len(), 1);
    assert_eq!(p.trackers.entries("someday").len(), 1);
    assert!(p.trackers.entries("actions").is_empty());
}

#[tokio::test]
async fn test_force_context_routes_everything() {
    let items = vec![GeneratedItem::new(
        "actions",
        ItemType::Reference,
        "Wifi password is on the fridge",
    )];
    let p = pipeline(Ok(inference(0.9, items)));

    let result = p
        .engine
        .capture(
            "wifi password is on the fridge",
            CaptureOptions::default().with_force_context("home"),
        )
        .await;

    assert_eq!(result.primary_tracker.as_str(), "home");
    assert_eq!(p.trackers.entries("home").len(), 1);
}

#[tokio::test]
async fn test_force_context_is_normalized_for_file_trackers() {
    let dir = TempDir::new().unwrap();
    let items = vec![GeneratedItem::new("actions", ItemType::Someday, "Paint the shed")];
    let engine = file_pipeline(&dir, Ok(inference(0.9, items)));

    let result = engine
        .capture(
            "paint the shed",
            CaptureOptions::default().with_force_context(" Home "),
        )
        .await;

    assert!(result.success);
    assert_eq!(result.primary_tracker.as_str(), "home");
    assert!(result.item_results[0].success, "{:?}", result.item_results[0].error);
    let written = std::fs::read_to_string(dir.path().join("home.md")).unwrap();
    assert_eq!(written, "- Paint the shed #someday\n");
}

#[tokio::test]
async fn test_invalid_force_context_fails_before_writing() {
    let dir = TempDir::new().unwrap();
    let items = vec![GeneratedItem::new("actions", ItemType::Action, "Anything")];
    let engine = file_pipeline(&dir, Ok(inference(0.95, items)));

    let result = engine
        .capture(
            "anything",
            CaptureOptions::default().with_force_context("../etc"),
        )
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap_or_default().contains("../etc"));
    assert!(result.item_results.is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

// ============================================================================
// Capture Time
// ============================================================================

#[tokio::test]
async fn test_capture_timestamp_stamps_direct_activity() {
    let items = vec![GeneratedItem::new("activity", ItemType::Activity, "Took meds")];
    let p = pipeline(Ok(inference(0.95, items)));

    let result = p
        .engine
        .capture(
            "took my meds",
            CaptureOptions::default().with_timestamp(captured_at()),
        )
        .await;

    assert!(result.success);
    assert_eq!(
        p.trackers.entries("activity"),
        vec!["- 2025-01-01 07:15 Took meds".to_string()]
    );
}

#[tokio::test]
async fn test_capture_timestamp_follows_item_through_review() {
    let items = vec![GeneratedItem::new("activity", ItemType::Activity, "Stretched")];
    let p = pipeline(Ok(inference(0.3, items)));

    let result = p
        .engine
        .capture(
            "did some stretching",
            CaptureOptions::default().with_timestamp(captured_at()),
        )
        .await;

    assert!(result.requires_review);
    let queued = p.queue.get_items_needing_review(None).unwrap();
    assert_eq!(queued[0].timestamp, captured_at());
    assert_eq!(queued[0].rendered_entry, "- 2025-01-01 07:15 Stretched");

    let accepted = p
        .queue
        .process_review_action(&queued[0].id, ReviewAction::Accept, ReviewValues::default())
        .await
        .unwrap();
    assert!(accepted);
    assert_eq!(
        p.trackers.entries("activity"),
        vec!["- 2025-01-01 07:15 Stretched".to_string()]
    );
}

// ============================================================================
// Degradation
// ============================================================================

#[tokio::test]
async fn test_review_queue_failure_falls_back_to_review_tracker() {
    let clock = clock();
    let formatter = FormattingEngine::with_clock(clock.clone());
    let trackers = Arc::new(InMemoryTrackerWriter::with_clock(clock));
    let item = GeneratedItem::new("actions", ItemType::Action, "Book flights");
    let engine = CaptureEngine::new(
        inference_engine(Ok(inference(0.3, vec![item]))),
        Arc::new(BrokenReviewSink),
        trackers.clone(),
        trackers.clone(),
        formatter,
    );

    let result = engine.capture("book flights", CaptureOptions::default()).await;

    assert!(result.success);
    assert!(result.requires_review);
    assert_eq!(result.primary_tracker, TrackerId::review());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("review queue unavailable"));

    let review_entries = trackers.entries("review");
    assert_eq!(review_entries.len(), 1);
    assert!(review_entries[0].contains("Book flights"));
    assert!(review_entries[0].contains("#review"));
    assert!(review_entries[0].contains("#actions"));
    assert!(result.item_results[0].review_id.is_none());
    assert!(result.item_results[0].success);
}

#[tokio::test]
async fn test_provider_failure_writes_nothing() {
    let p = pipeline(Err("connection refused".to_string()));

    let result = p.engine.capture("anything at all", CaptureOptions::default()).await;

    assert!(!result.success);
    let error = result.error.expect("error should be reported");
    assert!(error.contains("connection refused"));
    assert!(result.item_results.is_empty());
    assert!(p.trackers.is_empty());
    assert!(p.queue.is_empty());
}

#[tokio::test]
async fn test_no_items_is_a_failed_capture() {
    let p = pipeline(Ok(inference(0.9, Vec::new())));

    let result = p.engine.capture("hmm", CaptureOptions::default()).await;

    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(p.trackers.is_empty());
}

#[tokio::test]
async fn test_write_failure_is_reported_per_item() {
    let clock = clock();
    let formatter = FormattingEngine::with_clock(clock.clone());
    let trackers = Arc::new(InMemoryTrackerWriter::with_clock(clock));
    let queue = Arc::new(ReviewQueue::new(
        ReviewConfig::default(),
        formatter.clone(),
        trackers.clone(),
    ));
    let item = GeneratedItem::new("actions", ItemType::Action, "Pay rent");
    let engine = CaptureEngine::new(
        inference_engine(Ok(inference(0.95, vec![item]))),
        queue,
        Arc::new(FailingWriter),
        trackers,
        formatter,
    );

    let result = engine.capture("pay rent", CaptureOptions::default()).await;

    assert!(result.success);
    let item = &result.item_results[0];
    assert!(!item.success);
    assert!(item.error.as_deref().unwrap_or_default().contains("disk full"));
    assert_eq!(item.rendered.as_deref(), Some("- [ ] 🔼 Pay rent #task"));
    assert_eq!(result.warnings.len(), 1);
}

// ============================================================================
// Task Completion
// ============================================================================

#[tokio::test]
async fn test_completions_mark_existing_tasks() {
    let clock = clock();
    let formatter = FormattingEngine::with_clock(clock.clone());
    let trackers = Arc::new(InMemoryTrackerWriter::with_clock(clock));
    trackers
        .append(&TrackerId::new("actions"), "- [ ] Email the landlord #task")
        .await
        .unwrap();
    let queue = Arc::new(ReviewQueue::new(
        ReviewConfig::default(),
        formatter.clone(),
        trackers.clone(),
    ));

    let mut result = inference(
        0.9,
        vec![GeneratedItem::new("activity", ItemType::Activity, "Emailed the landlord")],
    );
    result.task_completions = vec![
        TaskCompletion {
            tracker: TrackerId::new("actions"),
            description: "email the landlord".to_string(),
            reasoning: "capture says it was sent".to_string(),
        },
        TaskCompletion {
            tracker: TrackerId::new("actions"),
            description: "walk the dog".to_string(),
            reasoning: String::new(),
        },
    ];
    let engine = CaptureEngine::new(
        inference_engine(Ok(result)),
        queue,
        trackers.clone(),
        trackers.clone(),
        formatter,
    );

    let result = engine
        .capture("emailed the landlord", CaptureOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.completed_tasks.len(), 2);
    assert!(result.completed_tasks[0].success);
    assert!(!result.completed_tasks[1].success);
    assert!(result.completed_tasks[1].error.is_none());
    assert_eq!(
        trackers.entries("actions"),
        vec!["- [x] Email the landlord #task ✅ 2026-03-14".to_string()]
    );
    assert_eq!(
        trackers.entries("activity"),
        vec!["- 2026-03-14 09:26 Emailed the landlord".to_string()]
    );
}
