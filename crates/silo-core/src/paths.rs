//! Typed path helpers for object-store locations.
//!
//! Three addressing schemes appear in this system:
//!
//! - scheme-prefixed store paths (`gs://bucket/object`), used by
//!   configuration and the object store gateway;
//! - bare relative object names, used by storage events and listings;
//! - mounted paths (`/bigstore/<bucket>/<relative>`), the downstream
//!   ingestion system's addressing scheme used in manifests and
//!   notifications.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Root under which buckets are mounted in the downstream addressing scheme.
pub const MOUNT_ROOT: &str = "bigstore";

const SCHEME: &str = "gs://";

/// A bucket/object pair addressing one object (or prefix) in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePath {
    /// The bucket name.
    pub bucket: String,
    /// The object name (or prefix) within the bucket, no leading slash.
    pub object: String,
}

impl StorePath {
    /// Creates a path from a bucket and object name.
    #[must_use]
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Parses a scheme-prefixed path of the form `gs://<bucket>/<object>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] when the scheme, bucket, or object is
    /// missing.
    pub fn parse(path: &str) -> Result<Self> {
        let rest = path
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        let (bucket, object) = rest
            .split_once('/')
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        if bucket.is_empty() || object.is_empty() {
            return Err(Error::InvalidPath(path.to_string()));
        }
        Ok(Self::new(bucket, object))
    }

    /// Returns a new path with the given segments appended to the object.
    #[must_use]
    pub fn child(&self, segments: &[&str]) -> Self {
        Self::new(self.bucket.clone(), join_url(&self.object, segments))
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.object)
    }
}

/// Joins path segments onto a base, normalizing redundant slashes.
///
/// `std::path::Path` joins are not URL-safe (they collapse `gs://` to
/// `gs:/`), so this operates on strings.
#[must_use]
pub fn join_url(base: &str, segments: &[&str]) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    for segment in segments {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Rewrites a bucket-relative path into the downstream mounted addressing
/// scheme: `/bigstore/<bucket>/<relative>`.
#[must_use]
pub fn mounted_path(bucket: &str, relative: &str) -> String {
    let relative = relative.trim_matches('/');
    format!("/{MOUNT_ROOT}/{bucket}/{relative}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        let path = StorePath::parse("gs://my-bucket/imports/control").expect("should parse");
        assert_eq!(path.bucket, "my-bucket");
        assert_eq!(path.object, "imports/control");
        assert_eq!(path.to_string(), "gs://my-bucket/imports/control");
    }

    #[test]
    fn parse_rejects_missing_scheme() {
        assert!(StorePath::parse("s3://bucket/object").is_err());
        assert!(StorePath::parse("bucket/object").is_err());
    }

    #[test]
    fn parse_rejects_missing_object() {
        assert!(StorePath::parse("gs://bucket").is_err());
        assert!(StorePath::parse("gs://bucket/").is_err());
        assert!(StorePath::parse("gs:///object").is_err());
    }

    #[test]
    fn child_appends_segments() {
        let control = StorePath::new("b", "imports/control");
        let marker = control.child(&["branch_2021", "launched.txt"]);
        assert_eq!(marker.object, "imports/control/branch_2021/launched.txt");
        assert_eq!(marker.bucket, "b");
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("gs://b/root/", &["/cache/", "t1"]), "gs://b/root/cache/t1");
        assert_eq!(join_url("root", &["", "file.txt"]), "root/file.txt");
    }

    #[test]
    fn mounted_path_prefixes_bucket() {
        assert_eq!(
            mounted_path("my-bucket", "demo/data/source1/"),
            "/bigstore/my-bucket/demo/data/source1"
        );
    }
}
