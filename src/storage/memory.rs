//! In-memory tracker backend.

use super::{TaskCompletionMarker, TrackerWriter, complete_task_line};
use crate::clock::{Clock, SystemClock};
use crate::models::TrackerId;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Tracker backend that keeps entries in process memory.
///
/// Useful for tests and for dry runs where nothing should touch disk.
pub struct InMemoryTrackerWriter {
    entries: RwLock<HashMap<TrackerId, Vec<String>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTrackerWriter {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty backend stamping completions with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the entries written to `tracker`, oldest first.
    #[must_use]
    pub fn entries(&self, tracker: &str) -> Vec<String> {
        self.entries
            .read()
            .map(|map| map.get(&TrackerId::from(tracker)).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Returns the total number of entries across trackers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|map| map.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_error(e: impl std::fmt::Display) -> Error {
        Error::OperationFailed {
            operation: "in_memory_tracker_lock".to_string(),
            cause: e.to_string(),
        }
    }
}

impl Default for InMemoryTrackerWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackerWriter for InMemoryTrackerWriter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, tracker: &TrackerId, entry: &str) -> Result<bool> {
        let mut map = self.entries.write().map_err(Self::lock_error)?;
        map.entry(tracker.clone()).or_default().push(entry.to_string());
        Ok(true)
    }
}

#[async_trait]
impl TaskCompletionMarker for InMemoryTrackerWriter {
    async fn mark_complete(&self, tracker: &TrackerId, description: &str) -> Result<bool> {
        let today = self.clock.now().date_naive();
        let mut map = self.entries.write().map_err(Self::lock_error)?;
        let Some(lines) = map.get_mut(tracker) else {
            return Ok(false);
        };
        for line in lines.iter_mut() {
            if let Some(done) = complete_task_line(line, description, today) {
                *line = done;
                return Ok(true);
            }
        }
        Ok(false)
    }
}
