//! Pipeline services.
//!
//! [`CaptureEngine`] drives one capture through [`InferenceEngine`] and then
//! either a [`crate::storage::TrackerWriter`] or the [`ReviewQueue`].

mod capture;
mod inference;
mod review;

pub use capture::{CaptureEngine, extract_keywords};
pub use inference::{DEFAULT_INFERENCE_TIMEOUT, InferenceEngine, should_flag_for_review};
pub use review::{ReviewQueue, ReviewSink};
