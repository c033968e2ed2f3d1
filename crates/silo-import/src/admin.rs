//! Table store admin gateway.
//!
//! Covers the small slice of the admin API the state machine needs: table
//! and column family creation, table deletion for rollback, and cluster node
//! count reads and writes for scaling around a load.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// The single column family every import table carries.
pub const COLUMN_FAMILY: &str = "csv";

/// Admin gateway for the destination table store.
#[async_trait]
pub trait TableAdmin: Send + Sync + 'static {
    /// Creates a table in the given instance.
    async fn create_table(&self, instance: &str, table_id: &str) -> Result<()>;

    /// Creates a column family in an existing table.
    async fn create_column_family(&self, instance: &str, table_id: &str, family: &str)
        -> Result<()>;

    /// Deletes a table. Used as rollback after a failed launch.
    async fn delete_table(&self, instance: &str, table_id: &str) -> Result<()>;

    /// Returns the current node count of a cluster.
    async fn node_count(&self, instance: &str, cluster: &str) -> Result<u32>;

    /// Resizes a cluster to the given node count.
    async fn set_node_count(&self, instance: &str, cluster: &str, nodes: u32) -> Result<()>;
}

/// One mutating admin call, as recorded by [`MemoryTableAdmin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOp {
    /// `create_table` was called.
    CreateTable {
        /// Target instance.
        instance: String,
        /// Target table.
        table_id: String,
    },
    /// `create_column_family` was called.
    CreateColumnFamily {
        /// Target instance.
        instance: String,
        /// Target table.
        table_id: String,
        /// Family name.
        family: String,
    },
    /// `delete_table` was called.
    DeleteTable {
        /// Target instance.
        instance: String,
        /// Target table.
        table_id: String,
    },
    /// `set_node_count` was called.
    SetNodeCount {
        /// Target instance.
        instance: String,
        /// Target cluster.
        cluster: String,
        /// Requested node count.
        nodes: u32,
    },
}

/// In-memory admin gateway for testing.
///
/// Records every mutating call in order and supports per-method failure
/// injection. Node count reads are not recorded.
#[derive(Debug, Default)]
pub struct MemoryTableAdmin {
    ops: Mutex<Vec<AdminOp>>,
    nodes: AtomicU32,
    create_table_failures: AtomicU32,
    fail_column_family: AtomicBool,
    fail_delete_table: AtomicBool,
    fail_set_nodes: AtomicBool,
}

impl MemoryTableAdmin {
    /// Creates a fake with the given current node count.
    #[must_use]
    pub fn with_nodes(nodes: u32) -> Self {
        let admin = Self::default();
        admin.nodes.store(nodes, Ordering::SeqCst);
        admin
    }

    /// Makes the next `n` `create_table` calls fail.
    pub fn fail_create_table_times(&self, n: u32) {
        self.create_table_failures.store(n, Ordering::SeqCst);
    }

    /// Makes `create_column_family` calls fail.
    pub fn fail_column_family(&self) {
        self.fail_column_family.store(true, Ordering::SeqCst);
    }

    /// Makes `delete_table` calls fail.
    pub fn fail_delete_table(&self) {
        self.fail_delete_table.store(true, Ordering::SeqCst);
    }

    /// Makes `set_node_count` calls fail.
    pub fn fail_set_node_count(&self) {
        self.fail_set_nodes.store(true, Ordering::SeqCst);
    }

    /// Returns the recorded operations, in call order.
    ///
    /// Failed calls are recorded too; the log reflects what was attempted.
    pub fn operations(&self) -> Vec<AdminOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    fn record(&self, op: AdminOp) -> Result<()> {
        self.ops
            .lock()
            .map_err(|_| Error::admin("operation log lock poisoned"))?
            .push(op);
        Ok(())
    }
}

#[async_trait]
impl TableAdmin for MemoryTableAdmin {
    async fn create_table(&self, instance: &str, table_id: &str) -> Result<()> {
        self.record(AdminOp::CreateTable {
            instance: instance.to_string(),
            table_id: table_id.to_string(),
        })?;
        let remaining = self.create_table_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.create_table_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(Error::admin(format!("injected create_table failure for {table_id}")));
        }
        Ok(())
    }

    async fn create_column_family(
        &self,
        instance: &str,
        table_id: &str,
        family: &str,
    ) -> Result<()> {
        self.record(AdminOp::CreateColumnFamily {
            instance: instance.to_string(),
            table_id: table_id.to_string(),
            family: family.to_string(),
        })?;
        if self.fail_column_family.load(Ordering::SeqCst) {
            return Err(Error::admin(format!(
                "injected create_column_family failure for {table_id}"
            )));
        }
        Ok(())
    }

    async fn delete_table(&self, instance: &str, table_id: &str) -> Result<()> {
        self.record(AdminOp::DeleteTable {
            instance: instance.to_string(),
            table_id: table_id.to_string(),
        })?;
        if self.fail_delete_table.load(Ordering::SeqCst) {
            return Err(Error::admin(format!("injected delete_table failure for {table_id}")));
        }
        Ok(())
    }

    async fn node_count(&self, _instance: &str, _cluster: &str) -> Result<u32> {
        Ok(self.nodes.load(Ordering::SeqCst))
    }

    async fn set_node_count(&self, instance: &str, cluster: &str, nodes: u32) -> Result<()> {
        self.record(AdminOp::SetNodeCount {
            instance: instance.to_string(),
            cluster: cluster.to_string(),
            nodes,
        })?;
        if self.fail_set_nodes.load(Ordering::SeqCst) {
            return Err(Error::admin("injected set_node_count failure"));
        }
        self.nodes.store(nodes, Ordering::SeqCst);
        Ok(())
    }
}
