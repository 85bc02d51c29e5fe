//! # Sortbox
//!
//! Capture-to-tracker inference and review pipeline.
//!
//! Sortbox takes free-text captures (typed or dictated), asks an AI
//! classifier to split them into typed items, and routes each item either
//! straight to its destination tracker or into a review queue when the
//! classifier is not confident enough.
//!
//! ## Components
//!
//! - [`formatting`]: canonical entry templates and their validator
//! - [`services::InferenceEngine`]: provider call plus the review decision
//! - [`services::ReviewQueue`]: items awaiting human confirmation
//! - [`services::CaptureEngine`]: the capture entry point
//! - [`storage`]: tracker writer and completion marker seams
//!
//! ## Example
//!
//! ```rust,ignore
//! use sortbox::{CaptureEngine, CaptureOptions};
//!
//! let result = engine.capture("call the dentist tomorrow", CaptureOptions::default()).await;
//! assert!(result.success);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod clock;
pub mod config;
pub mod formatting;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ReviewConfig, SortboxConfig};
pub use formatting::{FormatOptions, FormatValidation, FormattingEngine};
pub use llm::ClassificationProvider;
pub use models::{
    CaptureInput, CaptureItemResult, CaptureOptions, CaptureResult, GeneratedItem,
    InferenceResult, InputType, ItemType, Priority, ReviewAction, ReviewId, ReviewStatus,
    ReviewableItem, TaskCompletion, TaskCompletionResult, TrackerId,
};
pub use services::{CaptureEngine, InferenceEngine, ReviewQueue, ReviewSink};
pub use storage::{TaskCompletionMarker, TrackerWriter};

/// Error type for sortbox operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty capture text, malformed review values, bad tracker ids |
/// | `OperationFailed` | Config I/O, poisoned locks, snapshot persistence |
/// | `ProviderUnavailable` | Classification call failed or returned unparseable output |
/// | `ProviderTimeout` | Classification call exceeded its deadline |
/// | `WriteFailed` | A tracker append or completion update failed |
/// | `ReviewQueueFailure` | Flagging an item into the review queue failed |
/// | `UnknownReviewAction` | A review action name is not recognised |
/// | `ItemNotFound` | A review action referenced a missing item id |
/// | `UninterpretableCapture` | The classifier produced no items for a capture |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The classification provider failed.
    ///
    /// Raised when:
    /// - The HTTP request to the provider fails or returns a non-success status
    /// - The provider response cannot be parsed into an inference result
    /// - The circuit breaker around the provider is open
    #[error("classification provider '{provider}' unavailable: {cause}")]
    ProviderUnavailable {
        /// Provider name.
        provider: String,
        /// The underlying cause.
        cause: String,
    },

    /// The classification provider did not answer in time.
    #[error("classification provider '{provider}' timed out after {timeout_ms}ms")]
    ProviderTimeout {
        /// Provider name.
        provider: String,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// Writing to a tracker failed.
    #[error("write to tracker '{tracker}' failed: {cause}")]
    WriteFailed {
        /// Target tracker.
        tracker: String,
        /// The underlying cause.
        cause: String,
    },

    /// The review queue could not accept an item.
    #[error("review queue failure: {0}")]
    ReviewQueueFailure(String),

    /// A review action name was not recognised.
    #[error("unsupported review action: '{0}'")]
    UnknownReviewAction(String),

    /// A review item id does not exist in the queue.
    #[error("review item not found: {0}")]
    ItemNotFound(String),

    /// The classifier could not derive any items from a capture.
    #[error("capture could not be interpreted: {0}")]
    UninterpretableCapture(String),
}

impl Error {
    /// Returns true for provider failures, timeouts included.
    #[must_use]
    pub const fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::ProviderTimeout { .. }
        )
    }

    /// Returns true if the provider call timed out.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ProviderTimeout { .. })
    }
}

/// Result type alias for sortbox operations.
pub type Result<T> = std::result::Result<T, Error>;
