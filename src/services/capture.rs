//! Capture engine.
//!
//! Entry point of the pipeline: classifies one capture, then routes each
//! generated item either straight to its tracker or into the review queue,
//! and closes any tasks the capture reports as done.
//!
//! A provider failure ends the capture with `success: false` and nothing
//! written. Everything after that degrades per item: a failed write is
//! recorded on its item, and a review queue failure falls back to writing a
//! review entry to the `review` tracker.

use super::{InferenceEngine, ReviewSink};
use crate::formatting::{FormatOptions, FormattingEngine};
use crate::models::{
    CaptureInput, CaptureItemResult, CaptureOptions, CaptureResult, FlagRequest, GeneratedItem,
    ItemType, ReviewMetadata, ReviewSource, TaskCompletion, TaskCompletionResult, TrackerId,
};
use crate::storage::{TaskCompletionMarker, TrackerWriter};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Words dropped when deriving review keywords.
const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "also", "am", "an", "and", "are", "as", "at", "be", "been", "but",
    "by", "can", "could", "do", "for", "from", "get", "got", "had", "has", "have", "i", "if",
    "in", "into", "is", "it", "its", "just", "me", "my", "need", "of", "on", "or", "our", "so",
    "that", "the", "their", "then", "there", "this", "to", "up", "was", "we", "were", "will",
    "with", "would", "you", "your",
];

/// Orchestrates one capture end to end.
pub struct CaptureEngine {
    inference: InferenceEngine,
    review: Arc<dyn ReviewSink>,
    writer: Arc<dyn TrackerWriter>,
    completions: Arc<dyn TaskCompletionMarker>,
    formatter: FormattingEngine,
}

impl CaptureEngine {
    /// Creates a capture engine.
    #[must_use]
    pub fn new(
        inference: InferenceEngine,
        review: Arc<dyn ReviewSink>,
        writer: Arc<dyn TrackerWriter>,
        completions: Arc<dyn TaskCompletionMarker>,
        formatter: FormattingEngine,
    ) -> Self {
        Self {
            inference,
            review,
            writer,
            completions,
            formatter,
        }
    }

    /// Returns the inference engine.
    #[must_use]
    pub const fn inference(&self) -> &InferenceEngine {
        &self.inference
    }

    /// Processes one capture.
    ///
    /// Always returns a structured result; failures are reported through
    /// `success`, `error` and the per-item results.
    #[tracing::instrument(
        name = "sortbox.capture",
        skip_all,
        fields(input_type = options.input_type.as_str(), chars = raw_text.len())
    )]
    pub async fn capture(&self, raw_text: &str, options: CaptureOptions) -> CaptureResult {
        let started = Instant::now();
        let input = CaptureInput::from_options(raw_text, &options);

        let inference = match self
            .inference
            .infer(&input, options.prior_context.as_deref())
            .await
        {
            Ok(inference) => inference,
            Err(err) => {
                tracing::warn!(error = %err, "Capture failed before routing");
                metrics::counter!("sortbox_captures_total", "status" => "failed").increment(1);
                return CaptureResult::failure(err.to_string());
            },
        };

        let keywords = extract_keywords(raw_text);
        let captured_at = input.timestamp;
        let mut warnings = Vec::new();
        let mut item_results = Vec::with_capacity(inference.generated_items.len());
        for item in &inference.generated_items {
            let confidence = item.effective_confidence(inference.confidence);
            let outcome = if self
                .inference
                .should_flag_for_review(confidence, item.item_type)
            {
                self.hold_for_review(item, confidence, &keywords, captured_at, &mut warnings)
                    .await
            } else {
                self.write_direct(item, confidence, captured_at, &mut warnings)
                    .await
            };
            item_results.push(outcome);
        }

        let mut completed_tasks = Vec::with_capacity(inference.task_completions.len());
        for completion in &inference.task_completions {
            completed_tasks.push(self.complete_task(completion, &mut warnings).await);
        }

        let requires_review = item_results.iter().any(|r| r.requires_review);
        let primary_tracker = if requires_review {
            TrackerId::review()
        } else {
            item_results
                .first()
                .map_or_else(|| inference.primary_tracker.clone(), |r| r.tracker.clone())
        };

        metrics::counter!("sortbox_captures_total", "status" => "success").increment(1);
        metrics::histogram!("sortbox_capture_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            items = item_results.len(),
            completions = completed_tasks.len(),
            requires_review = requires_review,
            primary_tracker = %primary_tracker,
            "Capture processed"
        );

        CaptureResult {
            success: true,
            primary_tracker,
            confidence: inference.confidence,
            item_results,
            completed_tasks,
            requires_review,
            error: None,
            warnings,
        }
    }

    async fn hold_for_review(
        &self,
        item: &GeneratedItem,
        confidence: f64,
        keywords: &[String],
        captured_at: Option<DateTime<Utc>>,
        warnings: &mut Vec<String>,
    ) -> CaptureItemResult {
        let request = FlagRequest {
            content: item.content.clone(),
            confidence,
            tracker: item.tracker.clone(),
            section: item.item_type.default_section().to_string(),
            source: ReviewSource::Capture,
            metadata: ReviewMetadata::new(item.item_type, item.priority, keywords.to_vec()),
            timestamp: captured_at,
        };

        let mut result = item_result(item, TrackerId::review(), confidence);
        result.requires_review = true;

        match self.review.flag_item_for_review(request) {
            Ok(flagged) => {
                result.success = true;
                result.review_id = Some(flagged.id);
                result.rendered = Some(flagged.rendered_entry);
            },
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    tracker = %item.tracker,
                    "Review queue rejected item; writing it to the review tracker"
                );
                metrics::counter!("sortbox_review_fallback_total").increment(1);
                warnings.push(format!(
                    "review queue unavailable ({err}); item routed to the review tracker"
                ));

                let options = self
                    .item_options(item, confidence, captured_at)
                    .with_tag(item.tracker.as_str());
                let rendered = self
                    .formatter
                    .format(ItemType::Review, &item.content, &options);
                self.append(&TrackerId::review(), rendered, &mut result, warnings)
                    .await;
            },
        }
        result
    }

    async fn write_direct(
        &self,
        item: &GeneratedItem,
        confidence: f64,
        captured_at: Option<DateTime<Utc>>,
        warnings: &mut Vec<String>,
    ) -> CaptureItemResult {
        let options = self.item_options(item, confidence, captured_at);
        let rendered = self.formatter.format(item.item_type, &item.content, &options);

        let mut result = item_result(item, item.tracker.clone(), confidence);
        self.append(&item.tracker, rendered, &mut result, warnings)
            .await;
        result
    }

    /// Rendering options for a generated item, stamped with the capture time.
    fn item_options(
        &self,
        item: &GeneratedItem,
        confidence: f64,
        captured_at: Option<DateTime<Utc>>,
    ) -> FormatOptions {
        let options = FormatOptions::default()
            .with_priority(item.priority)
            .with_confidence(confidence);
        match captured_at {
            Some(at) => options.with_timestamp(self.formatter.local_time(at)),
            None => options,
        }
    }

    /// Appends `rendered` and records the outcome on `result`.
    async fn append(
        &self,
        tracker: &TrackerId,
        rendered: String,
        result: &mut CaptureItemResult,
        warnings: &mut Vec<String>,
    ) {
        let error = match self.writer.append(tracker, &rendered).await {
            Ok(true) => None,
            Ok(false) => Some(format!("tracker '{tracker}' declined the entry")),
            Err(err) => Some(err.to_string()),
        };
        let status = if error.is_none() { "success" } else { "failed" };
        metrics::counter!(
            "sortbox_tracker_writes_total",
            "backend" => self.writer.name(),
            "status" => status
        )
        .increment(1);

        if let Some(error) = &error {
            tracing::warn!(tracker = %tracker, error = %error, "Tracker write failed");
            warnings.push(format!("write to '{tracker}' failed: {error}"));
        }
        result.success = error.is_none();
        result.rendered = Some(rendered);
        result.error = error;
    }

    async fn complete_task(
        &self,
        completion: &TaskCompletion,
        warnings: &mut Vec<String>,
    ) -> TaskCompletionResult {
        let (success, error) = match self
            .completions
            .mark_complete(&completion.tracker, &completion.description)
            .await
        {
            Ok(marked) => (marked, None),
            Err(err) => {
                tracing::warn!(
                    tracker = %completion.tracker,
                    error = %err,
                    "Task completion failed"
                );
                warnings.push(format!(
                    "could not complete '{}' in '{}': {err}",
                    completion.description, completion.tracker
                ));
                (false, Some(err.to_string()))
            },
        };
        TaskCompletionResult {
            tracker: completion.tracker.clone(),
            description: completion.description.clone(),
            success,
            error,
        }
    }
}

fn item_result(item: &GeneratedItem, tracker: TrackerId, confidence: f64) -> CaptureItemResult {
    CaptureItemResult {
        tracker,
        inferred_tracker: item.tracker.clone(),
        item_type: item.item_type,
        priority: item.priority,
        content: item.content.clone(),
        confidence,
        success: false,
        requires_review: false,
        review_id: None,
        rendered: None,
        error: None,
    }
}

/// Lowercase alphanumeric tokens of `text`, without stop words or repeats.
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
    {
        if STOP_WORDS.contains(&token.as_str()) || keywords.contains(&token) {
            continue;
        }
        keywords.push(token);
    }
    keywords
}
