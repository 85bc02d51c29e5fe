//! Review thresholds and display options.

use super::ConfigFileReview;

/// Action items bypass review only above this confidence.
///
/// Misfiled actions cost the user the most, so this cutoff is stricter than
/// the configurable one and is not configurable itself.
pub const ACTION_BYPASS_CONFIDENCE: f64 = 0.8;

/// Review configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewConfig {
    /// Flagged items below this confidence start `pending`, others `flagged`.
    pub auto_review_threshold: f64,
    /// Non-action items below this confidence are held for review.
    pub require_review_threshold: f64,
    /// Items shown per review page.
    pub default_batch_size: usize,
    /// Colourize CLI output.
    pub color_output: bool,
    /// Show confidence in review entries.
    pub show_confidence_scores: bool,
    /// Maximum items the review queue holds.
    pub max_queue_size: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            auto_review_threshold: 0.5,
            require_review_threshold: 0.7,
            default_batch_size: 10,
            color_output: true,
            show_confidence_scores: true,
            max_queue_size: 1000,
        }
    }
}

impl ReviewConfig {
    /// Applies config-file values on top of `self`.
    #[must_use]
    pub(super) fn merge(mut self, file: &ConfigFileReview) -> Self {
        if let Some(v) = file.auto_review_threshold {
            self.auto_review_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = file.require_review_threshold {
            self.require_review_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = file.default_batch_size {
            self.default_batch_size = v.max(1);
        }
        if let Some(v) = file.color_output {
            self.color_output = v;
        }
        if let Some(v) = file.show_confidence_scores {
            self.show_confidence_scores = v;
        }
        if let Some(v) = file.max_queue_size {
            self.max_queue_size = v.max(1);
        }
        self
    }

    /// Sets the non-action bypass threshold.
    #[must_use]
    pub fn with_require_review_threshold(mut self, threshold: f64) -> Self {
        self.require_review_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }
}
