//! The import state machine.
//!
//! One controller invocation handles exactly one storage event and drives
//! exactly one transition to completion. There is no in-process state:
//! correctness under concurrent invocations rests on the durable marker
//! guard and on the conditional scaling checks.
//!
//! Gateway calls are issued sequentially, each under a bounded deadline;
//! a deadline overrun fails the call and with it the whole transition.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use silo_core::config::Config;
use silo_core::observability::import_span;
use silo_core::paths::StorePath;
use silo_core::storage::ObjectStore;
use tracing::Instrument;

use crate::admin::{TableAdmin, COLUMN_FAMILY};
use crate::error::{Error, Result};
use crate::job::{JobLauncher, LaunchRequest, TemplateRef, DATA_FILE_PATTERN};
use crate::layout::{Layout, Provenance};
use crate::manifest::{Manifest, ProvenanceSet, MANIFEST_OBJECT};
use crate::markers::{classify, marker_path, Classification, Marker, StorageEvent, TRIGGER_FILE};
use crate::metrics::ImportMetrics;
use crate::notify::{ImportNotification, Publisher, TopicName};
use crate::rollback::CompensationStack;

/// Retry and deadline policy for gateway calls.
///
/// Only table creation is retried; everything else fails on first error.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts for table creation.
    pub create_table_attempts: u32,
    /// Fixed interval between table creation attempts.
    pub create_table_backoff: Duration,
    /// Deadline applied to each gateway call.
    pub gateway_deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            create_table_attempts: 3,
            create_table_backoff: Duration::from_secs(60),
            gateway_deadline: Duration::from_secs(600),
        }
    }
}

/// What one successfully handled event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The batch job was launched for a table.
    Launched {
        /// The table being loaded.
        table_id: String,
    },
    /// The cluster was scaled back to the low-water count.
    ScaledDown {
        /// The table whose load completed.
        table_id: String,
    },
    /// The cluster was not at the high-water count, so it was left alone.
    ScaleDownSkipped {
        /// The table whose load completed.
        table_id: String,
        /// The observed node count.
        nodes: u32,
    },
    /// A manifest was built, written, and announced.
    ManifestPublished {
        /// Name of the first import in the manifest.
        import_name: String,
    },
    /// The event was not ours.
    Ignored {
        /// Why the event was skipped.
        reason: String,
    },
}

/// Drives import lifecycle transitions from storage events.
pub struct ImportController {
    store: Arc<dyn ObjectStore>,
    admin: Arc<dyn TableAdmin>,
    launcher: Arc<dyn JobLauncher>,
    publisher: Arc<dyn Publisher>,
    config: Config,
    control: StorePath,
    data: StorePath,
    topic: TopicName,
    retry: RetryPolicy,
    metrics: ImportMetrics,
}

impl ImportController {
    /// Creates a controller over the given gateways.
    ///
    /// # Errors
    ///
    /// Fails when the configured control path, data path, or topic does not
    /// parse. This happens at startup, before any event is handled.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        admin: Arc<dyn TableAdmin>,
        launcher: Arc<dyn JobLauncher>,
        publisher: Arc<dyn Publisher>,
        config: Config,
    ) -> Result<Self> {
        let control = StorePath::parse(&config.control_path)?;
        let data = StorePath::parse(&config.data_path)?;
        let topic = TopicName::parse(&config.trigger_topic)?;
        Ok(Self {
            store,
            admin,
            launcher,
            publisher,
            config,
            control,
            data,
            topic,
            retry: RetryPolicy::default(),
            metrics: ImportMetrics::new(),
        })
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Handles one storage event.
    ///
    /// # Errors
    ///
    /// Any error is fatal to this invocation; the caller turns it into its
    /// alerting signal. Redelivered events that match an already-reached
    /// state fail the duplicate-launch guard or no-op the scaling check.
    pub async fn handle_event(&self, event: &StorageEvent) -> Result<Outcome> {
        match classify(event, &self.control) {
            Classification::Ignored(reason) => {
                tracing::info!(name = %event.name, %reason, "ignoring event");
                self.metrics.record_ignored();
                Ok(Outcome::Ignored { reason })
            }
            Classification::Transition {
                marker: Marker::Init,
                table_id,
            } => {
                self.init_to_launched(&table_id)
                    .instrument(import_span("init_to_launched", &table_id))
                    .await
            }
            Classification::Transition {
                marker: Marker::Completed,
                table_id,
            } => {
                self.launched_to_completed(&table_id)
                    .instrument(import_span("launched_to_completed", &table_id))
                    .await
            }
            Classification::Transition {
                marker: Marker::Launched | Marker::Trigger,
                ..
            } => {
                let reason = "launched marker is written by this controller, not consumed".to_string();
                tracing::info!(name = %event.name, %reason, "ignoring event");
                self.metrics.record_ignored();
                Ok(Outcome::Ignored { reason })
            }
            Classification::Trigger => self.generate_manifest(event).await,
        }
    }

    async fn init_to_launched(&self, table_id: &str) -> Result<Outcome> {
        tracing::info!(table_id, "state Init");
        let launched = marker_path(&self.control, table_id, Marker::Launched);
        let exists = self
            .with_deadline("check launched marker", self.store.exists(&launched))
            .await?;
        if exists {
            return Err(Error::AlreadyLaunched {
                table_id: table_id.to_string(),
            });
        }

        self.create_table_with_retry(table_id).await?;
        self.with_deadline(
            "create column family",
            self.admin
                .create_column_family(&self.config.instance, table_id, COLUMN_FAMILY),
        )
        .await?;

        let mut compensation = CompensationStack::new();
        {
            let admin = Arc::clone(&self.admin);
            let instance = self.config.instance.clone();
            let table = table_id.to_string();
            compensation.push(
                format!("delete table {table_id}"),
                move || -> BoxFuture<'static, Result<()>> {
                    Box::pin(async move { admin.delete_table(&instance, &table).await })
                },
            );
        }

        match self.scale_up_and_launch(table_id, &launched).await {
            Ok(()) => {
                compensation.discard();
                self.metrics.record_transition("init_to_launched", "launched");
                tracing::info!(table_id, "state Launched");
                Ok(Outcome::Launched {
                    table_id: table_id.to_string(),
                })
            }
            Err(error) => {
                tracing::warn!(table_id, %error, "launch failed, unwinding");
                self.metrics.record_rollback();
                compensation.unwind().await;
                Err(error)
            }
        }
    }

    async fn scale_up_and_launch(&self, table_id: &str, launched: &StorePath) -> Result<()> {
        let nodes = self
            .with_deadline(
                "read node count",
                self.admin.node_count(&self.config.instance, &self.config.cluster),
            )
            .await?;
        if nodes < self.config.nodes_high {
            tracing::info!(
                cluster = %self.config.cluster,
                nodes,
                target = self.config.nodes_high,
                "scaling up"
            );
            self.with_deadline(
                "scale up",
                self.admin.set_node_count(
                    &self.config.instance,
                    &self.config.cluster,
                    self.config.nodes_high,
                ),
            )
            .await?;
        }

        let request = LaunchRequest {
            project_id: self.config.project_id.clone(),
            job_name: table_id.to_string(),
            template: TemplateRef::new(self.config.job_template.clone()),
            input_file: self.data.child(&[table_id, DATA_FILE_PATTERN]).to_string(),
            completion_file: marker_path(&self.control, table_id, Marker::Completed).to_string(),
            instance: self.config.instance.clone(),
            table_id: table_id.to_string(),
        };
        tracing::info!(table_id, input = %request.input_file, "launching batch job");
        self.with_deadline("launch job", self.launcher.launch(request))
            .await?;

        self.with_deadline("write launched marker", self.store.write(launched, Bytes::new()))
            .await
    }

    async fn create_table_with_retry(&self, table_id: &str) -> Result<()> {
        let attempts = self.retry.create_table_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::info!(table_id, attempt, "creating table");
            match self
                .with_deadline(
                    "create table",
                    self.admin.create_table(&self.config.instance, table_id),
                )
                .await
            {
                Ok(()) => return Ok(()),
                Err(error) if attempt < attempts => {
                    tracing::warn!(table_id, attempt, %error, "table creation failed, retrying");
                    self.metrics.record_create_table_retry(attempt);
                    tokio::time::sleep(self.retry.create_table_backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn launched_to_completed(&self, table_id: &str) -> Result<Outcome> {
        tracing::info!(table_id, "state Completed");
        let nodes = self
            .with_deadline(
                "read node count",
                self.admin.node_count(&self.config.instance, &self.config.cluster),
            )
            .await?;
        if nodes == self.config.nodes_high {
            self.with_deadline(
                "scale down",
                self.admin.set_node_count(
                    &self.config.instance,
                    &self.config.cluster,
                    self.config.nodes_low,
                ),
            )
            .await?;
            self.metrics
                .record_transition("launched_to_completed", "scaled_down");
            Ok(Outcome::ScaledDown {
                table_id: table_id.to_string(),
            })
        } else {
            // Another import may have set a different high-water count.
            tracing::info!(
                nodes,
                high = self.config.nodes_high,
                "cluster not at this config's high-water count, leaving it alone"
            );
            self.metrics
                .record_transition("launched_to_completed", "skipped");
            Ok(Outcome::ScaleDownSkipped {
                table_id: table_id.to_string(),
                nodes,
            })
        }
    }

    async fn generate_manifest(&self, event: &StorageEvent) -> Result<Outcome> {
        let root = find_import_root(&event.name)?;
        tracing::info!(%root, "building manifest");
        let bucket = event.bucket.as_str();

        let mut objects = self
            .with_deadline(
                "list data objects",
                self.store.list(bucket, &format!("{root}/data/")),
            )
            .await?;
        objects.sort();

        let layout = Layout::resolve(&root, &objects)?;
        let provenance = self.load_provenance(bucket, &layout).await?;
        let manifest = Manifest::from_layout(bucket, &layout, &provenance)?;
        let import_name = manifest.first_import_name().unwrap_or_default().to_string();

        let config_path = StorePath::new(bucket, format!("{root}/{MANIFEST_OBJECT}"));
        self.with_deadline(
            "write manifest",
            self.store.write(&config_path, Bytes::from(manifest.to_text())),
        )
        .await?;

        let notification = ImportNotification::new(bucket, &root, &import_name);
        self.with_deadline(
            "publish notification",
            self.publisher.publish(&self.topic, &notification.attributes()),
        )
        .await?;

        self.metrics.record_manifest_built();
        tracing::info!(%import_name, path = %config_path, "manifest published");
        Ok(Outcome::ManifestPublished { import_name })
    }

    async fn load_provenance(&self, bucket: &str, layout: &Layout) -> Result<ProvenanceSet> {
        let mut set = ProvenanceSet::default();
        if let Some(object) = &layout.group_provenance {
            set.group = Some(self.read_provenance(bucket, object).await?);
        }
        for (name, source) in &layout.sources {
            if let Some(object) = &source.provenance {
                set.by_source
                    .insert(name.clone(), self.read_provenance(bucket, object).await?);
            }
        }
        Ok(set)
    }

    async fn read_provenance(&self, bucket: &str, object: &str) -> Result<Provenance> {
        let data = self
            .with_deadline(
                "read provenance",
                self.store.read(&StorePath::new(bucket, object)),
            )
            .await?;
        Provenance::from_json(&data)
    }

    async fn with_deadline<T, E: Into<Error>>(
        &self,
        operation: &str,
        fut: impl std::future::Future<Output = std::result::Result<T, E>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.retry.gateway_deadline, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(Error::DeadlineExceeded {
                operation: operation.to_string(),
            }),
        }
    }
}

/// Locates the import root of a trigger file.
///
/// The trigger must sit at `<root>/internal/control/trigger.txt`; anything
/// else is a fatal path error, not an ignorable event, because the trigger
/// was explicitly addressed to us.
pub fn find_import_root(name: &str) -> Result<String> {
    let parts: Vec<&str> = name.split('/').collect();
    match parts.as_slice() {
        [root @ .., internal, control, file]
            if !root.is_empty()
                && *internal == "internal"
                && *control == "control"
                && *file == TRIGGER_FILE =>
        {
            Ok(root.join("/"))
        }
        _ => Err(Error::TriggerOutsideImportRoot {
            name: name.to_string(),
        }),
    }
}
