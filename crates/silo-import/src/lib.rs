//! # silo-import
//!
//! Automation around Silo bulk loads. Two pieces carry the logic:
//!
//! - the **import state machine** ([`controller::ImportController`]): a
//!   durable, marker-driven controller that reacts to storage events to
//!   create the destination table, scale compute capacity up for the load,
//!   launch the batch ingestion job, and scale capacity back down on
//!   completion — idempotent under event redelivery, with best-effort
//!   compensation on partial failure;
//! - the **layout resolver and manifest builder** ([`layout`], [`manifest`]):
//!   turn a flat object listing under an import root into a validated
//!   source/dataset/table hierarchy and emit the declarative import manifest
//!   the downstream ingestion system consumes.
//!
//! Gateways to the table-store admin API, the batch job launcher, and the
//! notification publisher are traits ([`admin::TableAdmin`],
//! [`job::JobLauncher`], [`notify::Publisher`]) with in-memory fakes for
//! tests; the object store gateway comes from `silo-core`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod admin;
pub mod controller;
pub mod error;
pub mod job;
pub mod layout;
pub mod manifest;
pub mod markers;
pub mod metrics;
pub mod notify;
pub mod rollback;

pub use controller::{ImportController, Outcome, RetryPolicy};
pub use error::{Error, Result};
pub use layout::Layout;
pub use manifest::Manifest;
pub use markers::{Marker, StorageEvent};
