//! Import automation configuration.
//!
//! All settings are required; the process must fail at startup, before any
//! side effect, when one is missing or unparseable. The struct is built once
//! via [`Config::from_env`] and passed into the controller and gateway
//! constructors — nothing reads the environment ad hoc after startup.

use crate::error::{Error, Result};
use crate::paths::StorePath;

/// Configuration for the import automation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cloud project that owns the table store and batch jobs.
    pub project_id: String,
    /// Table store instance imports are loaded into.
    pub instance: String,
    /// Compute cluster whose node count is scaled around imports.
    pub cluster: String,
    /// High-water node count used while a bulk load runs.
    pub nodes_high: u32,
    /// Low-water (steady state) node count.
    pub nodes_low: u32,
    /// Batch job template reference. A `.json` suffix selects the flex
    /// (containerized) launch path, anything else the classic template path.
    pub job_template: String,
    /// Root under which per-table data files live (`gs://…`).
    pub data_path: String,
    /// Root under which per-table marker objects live (`gs://…`).
    pub control_path: String,
    /// Notification topic, `projects/<project>/topics/<topic>`.
    pub trigger_topic: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars (all required):
    /// - `SILO_PROJECT_ID`
    /// - `SILO_INSTANCE`
    /// - `SILO_CLUSTER`
    /// - `SILO_NODES_HIGH`
    /// - `SILO_NODES_LOW`
    /// - `SILO_JOB_TEMPLATE`
    /// - `SILO_DATA_PATH`
    /// - `SILO_CONTROL_PATH`
    /// - `SILO_TRIGGER_TOPIC`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when any variable is absent, empty, or
    /// fails to parse or validate.
    pub fn from_env() -> Result<Self> {
        Self::build(|name| std::env::var(name).ok())
    }

    /// Builds and validates a config from a settings lookup.
    ///
    /// Separated from [`Config::from_env`] so tests can supply settings
    /// without mutating process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for missing or invalid settings.
    pub fn build(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            project_id: require(&lookup, "SILO_PROJECT_ID")?,
            instance: require(&lookup, "SILO_INSTANCE")?,
            cluster: require(&lookup, "SILO_CLUSTER")?,
            nodes_high: require_u32(&lookup, "SILO_NODES_HIGH")?,
            nodes_low: require_u32(&lookup, "SILO_NODES_LOW")?,
            job_template: require(&lookup, "SILO_JOB_TEMPLATE")?,
            data_path: require(&lookup, "SILO_DATA_PATH")?,
            control_path: require(&lookup, "SILO_CONTROL_PATH")?,
            trigger_topic: require(&lookup, "SILO_TRIGGER_TOPIC")?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.nodes_low == 0 {
            return Err(Error::config("SILO_NODES_LOW must be greater than 0"));
        }
        if self.nodes_high < self.nodes_low {
            return Err(Error::config(format!(
                "SILO_NODES_HIGH ({}) must be at least SILO_NODES_LOW ({})",
                self.nodes_high, self.nodes_low
            )));
        }
        StorePath::parse(&self.data_path)
            .map_err(|e| Error::config(format!("SILO_DATA_PATH: {e}")))?;
        StorePath::parse(&self.control_path)
            .map_err(|e| Error::config(format!("SILO_CONTROL_PATH: {e}")))?;
        Ok(())
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(Error::config(format!("{name} is not set"))),
    }
}

fn require_u32(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<u32> {
    let value = require(lookup, name)?;
    value
        .parse::<u32>()
        .map_err(|e| Error::config(format!("{name} must be an integer: {e}")))
}
