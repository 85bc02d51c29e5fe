//! Review queue snapshots.
//!
//! The review queue lives in memory; the CLI persists it between runs as a
//! single JSON document under the data directory.

use crate::models::ReviewableItem;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// File name used under the data directory.
pub const SNAPSHOT_FILE_NAME: &str = "review-queue.json";

/// Serialized review queue state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSnapshot {
    /// Format version.
    pub version: u32,
    /// When the snapshot was written.
    pub saved_at: DateTime<Utc>,
    /// Queue contents in insertion order.
    pub items: Vec<ReviewableItem>,
    /// Items confirmed over the queue's lifetime.
    #[serde(default)]
    pub confirmed_total: u64,
}

impl ReviewSnapshot {
    /// Creates a snapshot stamped now.
    #[must_use]
    pub fn new(items: Vec<ReviewableItem>, confirmed_total: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            items,
            confirmed_total,
        }
    }
}

/// Loads and saves [`ReviewSnapshot`]s as JSON.
#[derive(Debug, Clone)]
pub struct ReviewSnapshotStore {
    path: PathBuf,
}

impl ReviewSnapshotStore {
    /// Creates a store for an explicit file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at the default file name inside `data_dir`.
    #[must_use]
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(SNAPSHOT_FILE_NAME))
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot, or `None` if none has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if it was written by a newer format version.
    pub async fn load(&self) -> Result<Option<ReviewSnapshot>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error("load_review_snapshot", e)),
        };
        let snapshot: ReviewSnapshot =
            serde_json::from_str(&contents).map_err(|e| self.error("parse_review_snapshot", e))?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(self.error(
                "load_review_snapshot",
                format!("unsupported snapshot version {}", snapshot.version),
            ));
        }
        tracing::debug!(
            path = %self.path.display(),
            items = snapshot.items.len(),
            "Loaded review snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Writes the snapshot, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, snapshot: &ReviewSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error("save_review_snapshot", e))?;
        }
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| self.error("serialize_review_snapshot", e))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.error("save_review_snapshot", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.error("save_review_snapshot", e))?;
        Ok(())
    }

    fn error(&self, operation: &str, e: impl std::fmt::Display) -> Error {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: format!("{}: {e}", self.path.display()),
        }
    }
}
