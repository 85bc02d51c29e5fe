//! Markdown-file tracker backend.
//!
//! Each tracker is a file `<directory>/<tracker>.<extension>`; entries are
//! appended one per line.
//!
//! # Security
//!
//! Tracker ids are validated before they become file names, so an id like
//! `../../etc/passwd` is rejected instead of escaping the directory.

use super::{TaskCompletionMarker, TrackerWriter, complete_task_line};
use crate::clock::{Clock, SystemClock};
use crate::models::TrackerId;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Maximum tracker file size read back for completion marking (4MB).
const MAX_TRACKER_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Tracker backend writing markdown files.
pub struct FileTrackerStore {
    directory: PathBuf,
    extension: String,
    clock: Arc<dyn Clock>,
}

impl FileTrackerStore {
    /// Creates a store rooted at `directory` using `.md` files.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: "md".to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Creates a store from tracker configuration.
    #[must_use]
    pub fn from_config(config: &crate::config::TrackerConfig) -> Self {
        Self::new(&config.directory).with_extension(&config.extension)
    }

    /// Sets the file extension (without the dot).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Sets the clock used for completion stamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the store directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the file backing `tracker`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the tracker id is not a safe file name.
    pub fn tracker_path(&self, tracker: &TrackerId) -> Result<PathBuf> {
        if !tracker.is_valid() {
            return Err(Error::InvalidInput(format!(
                "tracker id '{tracker}' must be lowercase letters, digits, '-' or '_'"
            )));
        }
        Ok(self
            .directory
            .join(format!("{}.{}", tracker.as_str(), self.extension)))
    }

    fn write_error(tracker: &TrackerId, e: impl std::fmt::Display) -> Error {
        Error::WriteFailed {
            tracker: tracker.to_string(),
            cause: e.to_string(),
        }
    }
}

#[async_trait]
impl TrackerWriter for FileTrackerStore {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn append(&self, tracker: &TrackerId, entry: &str) -> Result<bool> {
        let path = self.tracker_path(tracker)?;
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| Self::write_error(tracker, e))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Self::write_error(tracker, format!("{}: {e}", path.display())))?;

        let mut line = String::with_capacity(entry.len() + 1);
        line.push_str(entry.trim_end_matches('\n'));
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Self::write_error(tracker, e))?;
        file.flush().await.map_err(|e| Self::write_error(tracker, e))?;

        tracing::debug!(tracker = %tracker, path = %path.display(), "Appended tracker entry");
        Ok(true)
    }
}

#[async_trait]
impl TaskCompletionMarker for FileTrackerStore {
    async fn mark_complete(&self, tracker: &TrackerId, description: &str) -> Result<bool> {
        let path = self.tracker_path(tracker)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Self::write_error(tracker, e)),
        };
        if metadata.len() > MAX_TRACKER_FILE_SIZE {
            return Err(Self::write_error(
                tracker,
                format!("tracker file exceeds {MAX_TRACKER_FILE_SIZE} bytes"),
            ));
        }

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Self::write_error(tracker, e))?;

        let today = self.clock.now().date_naive();
        let mut matched = false;
        let mut rewritten = String::with_capacity(contents.len() + 16);
        for line in contents.lines() {
            match (matched, complete_task_line(line, description, today)) {
                (false, Some(done)) => {
                    matched = true;
                    rewritten.push_str(&done);
                },
                _ => rewritten.push_str(line),
            }
            rewritten.push('\n');
        }
        if !matched {
            return Ok(false);
        }

        // Write beside the target and rename so readers never see a torn file.
        let tmp = path.with_extension(format!("{}.tmp", self.extension));
        tokio::fs::write(&tmp, rewritten)
            .await
            .map_err(|e| Self::write_error(tracker, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Self::write_error(tracker, e))?;

        tracing::info!(tracker = %tracker, description = %description, "Marked task complete");
        Ok(true)
    }
}
