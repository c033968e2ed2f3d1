//! Import notification publishing.
//!
//! After a manifest is built and written, downstream consumers are told about
//! it through a publish/subscribe topic. The message is a flat attribute map;
//! every path in it uses the downstream mounted addressing scheme.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use silo_core::paths::mounted_path;

use crate::error::{Error, Result};

/// A fully qualified topic name, `projects/<project>/topics/<topic>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicName {
    /// Owning project.
    pub project: String,
    /// Topic id.
    pub topic: String,
}

impl TopicName {
    /// Parses the fixed `projects/<project>/topics/<topic>` segment format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Publish`] for any other shape.
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "topics", topic] if !project.is_empty() && !topic.is_empty() => {
                Ok(Self {
                    project: (*project).to_string(),
                    topic: (*topic).to_string(),
                })
            }
            _ => Err(Error::publish(format!(
                "topic name must be projects/<project>/topics/<topic>, got {name}"
            ))),
        }
    }
}

impl std::fmt::Display for TopicName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "projects/{}/topics/{}", self.project, self.topic)
    }
}

/// Notification publisher gateway.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Publishes one attribute map to a topic.
    async fn publish(
        &self,
        topic: &TopicName,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// The message published after a manifest build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportNotification {
    /// Name of the first import in the manifest.
    pub import_name: String,
    /// Mounted path of the written manifest.
    pub manifest_path: String,
    /// Mounted path of the raw data directory.
    pub data_directory: String,
    /// Mounted path of the cache directory.
    pub cache_directory: String,
    /// Mounted path of the control directory.
    pub control_directory: String,
}

impl ImportNotification {
    /// Builds the notification for one import root.
    #[must_use]
    pub fn new(bucket: &str, root: &str, import_name: impl Into<String>) -> Self {
        Self {
            import_name: import_name.into(),
            manifest_path: mounted_path(bucket, &format!("{root}/internal/config/config.textproto")),
            data_directory: mounted_path(bucket, &format!("{root}/data")),
            cache_directory: mounted_path(bucket, &format!("{root}/internal/cache")),
            control_directory: mounted_path(bucket, &format!("{root}/internal/control")),
        }
    }

    /// The flat attribute map sent over the wire.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("import_name".to_string(), self.import_name.clone()),
            ("manifest_path".to_string(), self.manifest_path.clone()),
            ("data_directory".to_string(), self.data_directory.clone()),
            ("cache_directory".to_string(), self.cache_directory.clone()),
            ("control_directory".to_string(), self.control_directory.clone()),
        ])
    }
}

/// In-memory publisher for testing. Collects published messages.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<(TopicName, BTreeMap<String, String>)>>,
}

impl MemoryPublisher {
    /// Creates a new fake publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the published messages, in publish order.
    pub fn published(&self) -> Vec<(TopicName, BTreeMap<String, String>)> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(
        &self,
        topic: &TopicName,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.published
            .lock()
            .map_err(|_| Error::publish("publish log lock poisoned"))?
            .push((topic.clone(), attributes.clone()));
        Ok(())
    }
}
