//! Failure tracking with rescued-data integration.
//!
//! Whole-file failures count towards `max_failures`; row and field rescues
//! are recorded but never stop a source.

use std::sync::Arc;
use tracing::{error, warn};

use medallion_core::emit;
use medallion_core::metrics::events::{FileFailed, FileProcessed, FileStatus};
use medallion_core::rescue::{RescueStats, RescuedDataQueue, RescuedRecord};

use crate::error::{IngestError, MaxFailuresSnafu};
use crate::source::FileFailure;

pub struct FailureTracker {
    count: usize,
    max_failures: usize,
    rescue: Arc<RescuedDataQueue>,
    target: String,
}

impl FailureTracker {
    /// `max_failures` of 0 means unlimited.
    pub fn new(max_failures: usize, rescue: Arc<RescuedDataQueue>, target: impl Into<String>) -> Self {
        Self {
            count: 0,
            max_failures,
            rescue,
            target: target.into(),
        }
    }

    /// Record a file that could not be read or decoded.
    ///
    /// Returns `Err` once `max_failures` is reached, after flushing what has
    /// been rescued so far.
    pub async fn record_file_failure(
        &mut self,
        source_file: &str,
        failure: FileFailure,
    ) -> Result<(), IngestError> {
        self.count += 1;
        let stage = failure.stage;
        warn!(
            target = %self.target,
            file = %source_file,
            stage = stage.as_str(),
            reason = %failure.reason,
            "File rejected"
        );
        emit!(FileProcessed {
            status: FileStatus::Failed,
            target: self.target.clone(),
        });
        emit!(FileFailed {
            stage,
            target: self.target.clone(),
        });

        self.rescue.record(failure.into_record(source_file)).await;

        if self.max_failures > 0 && self.count >= self.max_failures {
            error!(target = %self.target, "Max failures ({}) reached, stopping source", self.count);
            self.flush().await;
            return MaxFailuresSnafu { count: self.count }.fail();
        }
        Ok(())
    }

    /// Record row- and field-level rescues from a parsed file.
    pub async fn rescue_rows(&self, records: Vec<RescuedRecord>) {
        for record in records {
            self.rescue.record(record).await;
        }
    }

    /// Write buffered rescues, logging any error.
    pub async fn flush(&self) {
        if let Err(e) = self.rescue.flush().await {
            error!(target = %self.target, error = %e, "Failed to flush rescued data");
        }
    }

    /// Flush and return the final rescue counts.
    pub async fn finalize(&self) -> RescueStats {
        match self.rescue.finalize().await {
            Ok(stats) => stats,
            Err(e) => {
                error!(target = %self.target, error = %e, "Failed to finalize rescued data");
                self.rescue.stats().await
            }
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}
