//! Data models for sortbox.
//!
//! This module contains the core data structures passed between the
//! inference, review and capture services.

mod capture;
mod inference;
mod review;
mod tracker;

pub use capture::{
    CaptureInput, CaptureItemResult, CaptureOptions, CaptureResult, InputType,
    TaskCompletionResult,
};
pub use inference::{GeneratedItem, InferenceResult, ItemType, Priority, TaskCompletion};
pub use review::{
    BatchReviewResult, FlagRequest, ReviewAction, ReviewActionOutcome, ReviewActionRequest,
    ReviewId, ReviewMetadata, ReviewSource, ReviewStatus, ReviewStatusCounts, ReviewValues,
    ReviewableItem,
};
pub use tracker::TrackerId;
