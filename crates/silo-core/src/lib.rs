//! # silo-core
//!
//! Core abstractions for the Silo bulk import automation:
//!
//! - **Error Types**: shared error definitions and result alias
//! - **Configuration**: the explicit settings struct built once at startup
//! - **Object Store**: the storage gateway trait and an in-memory test backend
//! - **Paths**: typed bucket/object paths and downstream path rewriting
//! - **Observability**: structured logging setup and span helpers
//!
//! The import state machine, layout resolver, and manifest builder live in
//! `silo-import`; this crate holds only the primitives they share.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod observability;
pub mod paths;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use observability::{init_logging, LogFormat};
pub use paths::{join_url, mounted_path, StorePath};
pub use storage::{MemoryStore, ObjectStore};
