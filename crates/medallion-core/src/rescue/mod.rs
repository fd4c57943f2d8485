//! Rescued-data channel.
//!
//! Rows, fields and files that could not be ingested or expanded are kept
//! here together with their raw payload and the reason they were rejected,
//! written as NDJSON for later inspection and replay.

mod queue;
mod types;

pub use queue::{DEFAULT_RESCUE_DIR, RescuedDataQueue};
pub use types::{RescueStats, RescuedRecord};
