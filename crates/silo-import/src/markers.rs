//! Marker objects and storage event classification.
//!
//! The import lifecycle has no persisted state variable. The state *is* the
//! set of marker objects that exist under `<control>/<table_id>/`:
//!
//! - `init.txt` is written by the upstream pipeline to request an import;
//! - `launched.txt` is written by the controller once the batch job is
//!   running;
//! - `completed.txt` is written by the batch job itself on success;
//! - `trigger.txt` (under `<root>/internal/control/`) requests manifest
//!   generation, a side pipeline outside the capacity lifecycle.
//!
//! Events that do not match the configured control root are classified as
//! ignorable, never as errors: the notification subscription covers the whole
//! bucket and most object changes are simply not ours.

use serde::{Deserialize, Serialize};
use silo_core::paths::StorePath;

/// Marker written upstream to request an import.
pub const INIT_FILE: &str = "init.txt";
/// Marker written by the controller after launching the batch job.
pub const LAUNCHED_FILE: &str = "launched.txt";
/// Marker written by the batch job on completion.
pub const COMPLETED_FILE: &str = "completed.txt";
/// Marker requesting manifest generation for an import root.
pub const TRIGGER_FILE: &str = "trigger.txt";

/// The lifecycle marker kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Import requested.
    Init,
    /// Batch job launched.
    Launched,
    /// Batch job finished.
    Completed,
    /// Manifest generation requested.
    Trigger,
}

impl Marker {
    /// The object file name encoding this marker.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Init => INIT_FILE,
            Self::Launched => LAUNCHED_FILE,
            Self::Completed => COMPLETED_FILE,
            Self::Trigger => TRIGGER_FILE,
        }
    }

    /// Classifies an object name by its marker suffix.
    #[must_use]
    pub fn from_object_name(name: &str) -> Option<Self> {
        if name.ends_with(INIT_FILE) {
            Some(Self::Init)
        } else if name.ends_with(LAUNCHED_FILE) {
            Some(Self::Launched)
        } else if name.ends_with(COMPLETED_FILE) {
            Some(Self::Completed)
        } else if name.ends_with(TRIGGER_FILE) {
            Some(Self::Trigger)
        } else {
            None
        }
    }
}

/// A storage change event, as delivered by the trigger subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    /// Object name within the bucket.
    pub name: String,
    /// Bucket the object lives in.
    pub bucket: String,
}

impl StorageEvent {
    /// Creates an event from a bucket and object name.
    #[must_use]
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
        }
    }
}

/// The result of classifying one storage event against the control root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A lifecycle marker event for one table.
    Transition {
        /// Which marker appeared.
        marker: Marker,
        /// The table the marker belongs to.
        table_id: String,
    },
    /// A manifest-generation trigger.
    Trigger,
    /// Not ours, or not a marker; the reason is for logging only.
    Ignored(String),
}

/// Classifies an event against the configured control path.
///
/// Lifecycle markers must sit directly under `<control>/<table_id>/`; the
/// table id is the second-to-last path segment. Events in other buckets or
/// folders are ignorable, never errors.
#[must_use]
pub fn classify(event: &StorageEvent, control: &StorePath) -> Classification {
    if event.bucket != control.bucket {
        return Classification::Ignored(format!(
            "bucket {} does not match control bucket {}",
            event.bucket, control.bucket
        ));
    }
    let Some(marker) = Marker::from_object_name(&event.name) else {
        return Classification::Ignored(format!("{} is not a marker", event.name));
    };
    if marker == Marker::Trigger {
        return Classification::Trigger;
    }
    let parts: Vec<&str> = event.name.split('/').collect();
    if parts.len() < 3 {
        return Classification::Ignored(format!("{} is too shallow for a marker", event.name));
    }
    let table_id = parts[parts.len() - 2].to_string();
    let folder = parts[..parts.len() - 2].join("/");
    if folder != control.object {
        return Classification::Ignored(format!(
            "folder {folder} does not match control folder {}",
            control.object
        ));
    }
    Classification::Transition { marker, table_id }
}

/// Returns the full path of a marker object for one table.
#[must_use]
pub fn marker_path(control: &StorePath, table_id: &str, marker: Marker) -> StorePath {
    control.child(&[table_id, marker.file_name()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> StorePath {
        StorePath::new("store-bucket", "imports/control")
    }

    #[test]
    fn classifies_init_with_table_id() {
        let event = StorageEvent::new("store-bucket", "imports/control/branch_2021_01_01/init.txt");
        assert_eq!(
            classify(&event, &control()),
            Classification::Transition {
                marker: Marker::Init,
                table_id: "branch_2021_01_01".into(),
            }
        );
    }

    #[test]
    fn classifies_completed() {
        let event = StorageEvent::new("store-bucket", "imports/control/t1/completed.txt");
        assert_eq!(
            classify(&event, &control()),
            Classification::Transition {
                marker: Marker::Completed,
                table_id: "t1".into(),
            }
        );
    }

    #[test]
    fn classifies_trigger_regardless_of_folder() {
        let event = StorageEvent::new("store-bucket", "demo/internal/control/trigger.txt");
        assert_eq!(classify(&event, &control()), Classification::Trigger);
    }

    #[test]
    fn wrong_bucket_is_ignored() {
        let event = StorageEvent::new("other-bucket", "imports/control/t1/init.txt");
        assert!(matches!(
            classify(&event, &control()),
            Classification::Ignored(_)
        ));
    }

    #[test]
    fn wrong_folder_is_ignored() {
        let event = StorageEvent::new("store-bucket", "elsewhere/t1/init.txt");
        assert!(matches!(
            classify(&event, &control()),
            Classification::Ignored(_)
        ));
    }

    #[test]
    fn non_marker_is_ignored() {
        let event = StorageEvent::new("store-bucket", "imports/control/t1/notes.md");
        assert!(matches!(
            classify(&event, &control()),
            Classification::Ignored(_)
        ));
    }

    #[test]
    fn shallow_path_is_ignored() {
        let event = StorageEvent::new("store-bucket", "init.txt");
        assert!(matches!(
            classify(&event, &control()),
            Classification::Ignored(_)
        ));
    }

    #[test]
    fn marker_path_layout() {
        let path = marker_path(&control(), "t1", Marker::Launched);
        assert_eq!(path.to_string(), "gs://store-bucket/imports/control/t1/launched.txt");
    }
}
