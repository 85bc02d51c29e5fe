//! Tracker storage seams.
//!
//! The pipeline never touches tracker storage directly. It writes through
//! [`TrackerWriter`] and marks tasks done through [`TaskCompletionMarker`],
//! so the destination can be markdown files, a database or a test double.
//!
//! Backends:
//! - [`FileTrackerStore`]: one markdown file per tracker
//! - [`InMemoryTrackerWriter`]: process-local, for tests and dry runs
//!
//! Writes to the same tracker from concurrent captures are not serialized
//! here; backends decide how much ordering they guarantee.

mod filesystem;
mod memory;
mod snapshot;
mod tracker;

pub use filesystem::FileTrackerStore;
pub use memory::InMemoryTrackerWriter;
pub use snapshot::{ReviewSnapshot, ReviewSnapshotStore};
pub use tracker::{TaskCompletionMarker, TrackerWriter, complete_task_line};
