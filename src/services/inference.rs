//! Inference engine.
//!
//! Wraps one call to the classification provider and owns the per-item
//! review decision.

use crate::config::{ACTION_BYPASS_CONFIDENCE, ReviewConfig};
use crate::llm::system_prompt::compose_context;
use crate::llm::{ClassificationProvider, normalize_tracker};
use crate::models::{CaptureInput, InferenceResult, ItemType, TrackerId};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default deadline for one classification call.
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns captures into typed inference results.
#[derive(Clone)]
pub struct InferenceEngine {
    provider: Arc<dyn ClassificationProvider>,
    config: ReviewConfig,
    timeout: Duration,
}

impl InferenceEngine {
    /// Creates an engine over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn ClassificationProvider>, config: ReviewConfig) -> Self {
        Self {
            provider,
            config,
            timeout: DEFAULT_INFERENCE_TIMEOUT,
        }
    }

    /// Sets the provider deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the review configuration.
    #[must_use]
    pub const fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Classifies one capture.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the capture text is blank or the forced context
    ///   is not a usable tracker id
    /// - `ProviderUnavailable` if the provider fails or returns garbage
    /// - `ProviderTimeout` if the provider misses the deadline
    /// - `UninterpretableCapture` if the provider returns no items
    #[tracing::instrument(
        name = "sortbox.inference.infer",
        skip_all,
        fields(provider = self.provider.name(), input_type = capture.input_type.as_str())
    )]
    pub async fn infer(
        &self,
        capture: &CaptureInput,
        prior_context: Option<&str>,
    ) -> Result<InferenceResult> {
        let text = capture.text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("capture text cannot be empty".to_string()));
        }

        let forced = forced_tracker(capture.force_context.as_deref())?;
        let context = compose_context(forced.as_ref().map(TrackerId::as_str), prior_context);
        let provider = self.provider.name();
        let started = Instant::now();

        let outcome =
            tokio::time::timeout(self.timeout, self.provider.classify(text, context.as_deref()))
                .await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("sortbox_inference_duration_ms", "provider" => provider)
            .record(elapsed_ms);

        let mut result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::warn!(provider = provider, error = %err, "Classification failed");
                return Err(err);
            },
            Err(_elapsed) => {
                tracing::warn!(
                    provider = provider,
                    timeout_ms = self.timeout_ms(),
                    "Classification timed out"
                );
                return Err(Error::ProviderTimeout {
                    provider: provider.to_string(),
                    timeout_ms: self.timeout_ms(),
                });
            },
        };

        if result.generated_items.is_empty() {
            return Err(Error::UninterpretableCapture(format!(
                "classifier produced no items: {}",
                result.overall_reasoning
            )));
        }

        if let Some(forced) = forced {
            for item in &mut result.generated_items {
                item.tracker = forced.clone();
            }
            result.primary_tracker = forced;
        }

        result.requires_review = result.requires_review
            || result.generated_items.iter().any(|item| {
                self.should_flag_for_review(item.effective_confidence(result.confidence), item.item_type)
            });

        tracing::debug!(
            items = result.generated_items.len(),
            completions = result.task_completions.len(),
            confidence = result.confidence,
            "Inference complete"
        );
        Ok(result)
    }

    /// Decides whether an item needs human review.
    ///
    /// Actions are held unless confidence is strictly above 0.8; other types
    /// are held below the configured threshold.
    #[must_use]
    pub fn should_flag_for_review(&self, confidence: f64, item_type: ItemType) -> bool {
        should_flag_for_review(confidence, item_type, self.config.require_review_threshold)
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Normalizes a forced context into a tracker id.
///
/// Blank contexts force nothing.
fn forced_tracker(force_context: Option<&str>) -> Result<Option<TrackerId>> {
    let Some(raw) = force_context.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    let tracker = normalize_tracker(raw);
    if !tracker.is_valid() {
        return Err(Error::InvalidInput(format!(
            "context '{raw}' is not a valid tracker id"
        )));
    }
    Ok(Some(tracker))
}

/// Review decision with an explicit threshold.
#[must_use]
pub fn should_flag_for_review(confidence: f64, item_type: ItemType, threshold: f64) -> bool {
    match item_type {
        ItemType::Action => confidence <= ACTION_BYPASS_CONFIDENCE,
        _ => confidence < threshold,
    }
}
