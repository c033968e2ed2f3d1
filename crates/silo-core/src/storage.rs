//! Object store gateway abstraction.
//!
//! The import state machine drives durable state through marker objects, so
//! the storage contract is deliberately small: existence check, whole-object
//! read/write, and a prefix listing. Production backends wrap a cloud object
//! store client; [`MemoryStore`] backs the tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::paths::StorePath;

/// Object store gateway.
///
/// All implementations must be safe to share across concurrent invocations;
/// the state machine relies on the store for cross-invocation coordination
/// and holds no in-process state of its own.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Returns whether an object exists at `path`.
    async fn exists(&self, path: &StorePath) -> Result<bool>;

    /// Reads an entire object.
    ///
    /// Returns [`Error::NotFound`] if the object doesn't exist.
    async fn read(&self, path: &StorePath) -> Result<Bytes>;

    /// Writes an object, replacing any existing content.
    async fn write(&self, path: &StorePath, data: Bytes) -> Result<()>;

    /// Lists object names under `prefix` in `bucket`.
    ///
    /// Returns full object names (not relative to the prefix), in arbitrary
    /// order; callers requiring determinism must sort.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory object store for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<(String, String), Bytes>>>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, path: &StorePath) -> Result<bool> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(objects.contains_key(&(path.bucket.clone(), path.object.clone())))
    }

    async fn read(&self, path: &StorePath) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        objects
            .get(&(path.bucket.clone(), path.object.clone()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn write(&self, path: &StorePath, data: Bytes) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .insert((path.bucket.clone(), path.object.clone()), data);
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(objects
            .keys()
            .filter(|(b, object)| b == bucket && object.starts_with(prefix))
            .map(|(_, object)| object.clone())
            .collect())
    }
}
