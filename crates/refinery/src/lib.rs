//! Refinery: silver and gold layers built from bronze tables.
//!
//! - `silver` - dimensions, deduplicated sales and expanded sale items
//! - `gold` - country sales, customer spend and top customers per store
//! - `pipeline` - running the stages in order
//! - `records` - typed rows of the refined tables
//! - `config` - YAML configuration and CLI arguments

pub mod config;
pub mod error;
pub mod gold;
pub mod hash;
pub mod pipeline;
pub mod records;
pub mod silver;
pub mod values;

pub use config::{CliArgs, Config, Stage, WriteMode};
pub use error::RefineError;
pub use pipeline::{RefineReport, Refinery};

pub use medallion_core::{Catalog, init_metrics, init_tracing, spawn_shutdown_handler};
