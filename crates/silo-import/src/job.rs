//! Batch ingestion job launcher gateway.
//!
//! The controller launches one templated batch job per import. Two launch
//! styles exist: classic pre-built templates, and flex (containerized)
//! templates described by a `.json` container spec; the template reference's
//! suffix selects between them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Region batch jobs run in.
pub const REGION: &str = "us-central1";
/// Pattern matching the data files of one table under the data path.
pub const DATA_FILE_PATTERN: &str = "cache.csv*";

/// How a job template is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Pre-built template.
    Classic,
    /// Containerized template described by a `.json` spec.
    Flex,
}

/// A reference to a batch job template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef(String);

impl TemplateRef {
    /// Wraps a template reference string.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The raw template path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Selects the launch style from the template suffix.
    #[must_use]
    pub fn mode(&self) -> LaunchMode {
        if self.0.ends_with(".json") {
            LaunchMode::Flex
        } else {
            LaunchMode::Classic
        }
    }
}

/// Everything needed to launch one bulk-load job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Project the job runs in.
    pub project_id: String,
    /// Job name; the table id doubles as the name.
    pub job_name: String,
    /// Template to launch.
    pub template: TemplateRef,
    /// Pattern of the input data files (`gs://…/cache.csv*`).
    pub input_file: String,
    /// Marker object the job writes when it finishes.
    pub completion_file: String,
    /// Destination instance.
    pub instance: String,
    /// Destination table.
    pub table_id: String,
}

impl LaunchRequest {
    /// The template parameter map passed to the launch API.
    #[must_use]
    pub fn parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("inputFile".to_string(), self.input_file.clone()),
            ("completionFile".to_string(), self.completion_file.clone()),
            ("instance".to_string(), self.instance.clone()),
            ("table".to_string(), self.table_id.clone()),
            ("project".to_string(), self.project_id.clone()),
            ("region".to_string(), REGION.to_string()),
        ])
    }
}

/// Batch job launcher gateway.
#[async_trait]
pub trait JobLauncher: Send + Sync + 'static {
    /// Launches one job from a template.
    async fn launch(&self, request: LaunchRequest) -> Result<()>;
}

/// In-memory launcher for testing. Records launch requests in order.
#[derive(Debug, Default)]
pub struct MemoryJobLauncher {
    launches: Mutex<Vec<LaunchRequest>>,
    fail: AtomicBool,
}

impl MemoryJobLauncher {
    /// Creates a new fake launcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent launches fail.
    pub fn fail_launches(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Returns the recorded launch requests, in call order.
    pub fn launches(&self) -> Vec<LaunchRequest> {
        self.launches
            .lock()
            .map(|launches| launches.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobLauncher for MemoryJobLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::launch(format!(
                "injected launch failure for {}",
                request.job_name
            )));
        }
        self.launches
            .lock()
            .map_err(|_| Error::launch("launch log lock poisoned"))?
            .push(request);
        Ok(())
    }
}
