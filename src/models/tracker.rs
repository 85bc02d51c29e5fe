//! Tracker identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a destination log ("tracker").
///
/// Trackers are plain names such as `actions`, `someday` or `activity`.
/// The `review` tracker is reserved for items that still need a human
/// decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackerId(String);

impl TrackerId {
    /// Name of the dedicated review tracker.
    pub const REVIEW: &'static str = "review";

    /// Creates a new tracker ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the dedicated review tracker.
    #[must_use]
    pub fn review() -> Self {
        Self(Self::REVIEW.to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the review tracker.
    #[must_use]
    pub fn is_review(&self) -> bool {
        self.0 == Self::REVIEW
    }

    /// Returns true if the id is safe to use as a storage key.
    ///
    /// Accepts lowercase ASCII letters, digits, `-` and `_`, 1 to 64 chars.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 64
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    }
}

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TrackerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TrackerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_tracker() {
        let id = TrackerId::review();
        assert!(id.is_review());
        assert_eq!(id.as_str(), "review");
        assert!(!TrackerId::new("actions").is_review());
    }

    #[test]
    fn test_is_valid() {
        assert!(TrackerId::new("actions").is_valid());
        assert!(TrackerId::new("work_log-2").is_valid());
        assert!(!TrackerId::new("").is_valid());
        assert!(!TrackerId::new("../etc/passwd").is_valid());
        assert!(!TrackerId::new("Actions").is_valid());
        assert!(!TrackerId::new("a".repeat(65)).is_valid());
    }
}
