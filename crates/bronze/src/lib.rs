//! Bronze: incremental loader of raw CSV and JSON files into bronze tables.
//!
//! This crate handles:
//! - Discovering new files under a source directory (local or S3)
//! - Parsing CSV and JSON with schema hints and type inference
//! - Appending micro-batches idempotently, tracked by per-source checkpoints
//! - Diverting malformed rows, fields and files to the rescued-data channel

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod failure;
pub mod ingest;
pub mod source;

// Re-export commonly used items
pub use config::{CliArgs, Config};
pub use error::IngestError;
pub use ingest::{BronzeSource, SourceContext};

pub use medallion_core::{Catalog, init_metrics, init_tracing, spawn_shutdown_handler};
