//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.
//!
//! ## Target Labels
//!
//! Metrics carry a `target` label naming the source or table involved
//! (e.g., `"sales"`, `"silver_sales"`).

use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Ingestion events
// ============================================================================

/// Event emitted when files are discovered during source listing.
pub struct FilesDiscovered {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for FilesDiscovered {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Files discovered");
        counter!("medallion_files_discovered_total", "target" => self.target).increment(self.count);
    }
}

/// Event emitted to track files discovered but not yet ingested.
pub struct PendingFiles {
    pub count: usize,
    pub target: String,
}

impl InternalEvent for PendingFiles {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Pending files");
        gauge!("medallion_pending_files", "target" => self.target).set(self.count as f64);
    }
}

/// Status of a processed file.
#[derive(Debug, Clone, Copy)]
pub enum FileStatus {
    Success,
    Failed,
}

impl FileStatus {
    fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Success => "success",
            FileStatus::Failed => "failed",
        }
    }
}

/// Event emitted when an input file is processed.
pub struct FileProcessed {
    pub status: FileStatus,
    pub target: String,
}

impl InternalEvent for FileProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), target = %self.target, "File processed");
        counter!("medallion_files_processed_total", "status" => self.status.as_str(), "target" => self.target)
            .increment(1);
    }
}

/// Stage at which data was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// The file could not be fetched.
    Read,
    /// The file bytes are not valid text.
    Decode,
    /// A row could not be parsed.
    Parse,
    /// A field did not fit its hinted type.
    Coerce,
    /// A nested payload could not be expanded.
    Expand,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Read => "read",
            FailureStage::Decode => "decode",
            FailureStage::Parse => "parse",
            FailureStage::Coerce => "coerce",
            FailureStage::Expand => "expand",
        }
    }
}

/// Event emitted when a whole file fails processing.
pub struct FileFailed {
    pub stage: FailureStage,
    pub target: String,
}

impl InternalEvent for FileFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), target = %self.target, "File failed");
        counter!("medallion_files_failed_total", "stage" => self.stage.as_str(), "target" => self.target)
            .increment(1);
    }
}

/// Event emitted when records land in a raw table.
pub struct RecordsIngested {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for RecordsIngested {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Records ingested");
        counter!("medallion_records_ingested_total", "target" => self.target).increment(self.count);
    }
}

/// Event emitted when rows or fields are diverted to the rescued-data channel.
pub struct RowsRescued {
    pub count: u64,
    pub stage: FailureStage,
    pub target: String,
}

impl InternalEvent for RowsRescued {
    fn emit(self) {
        trace!(count = self.count, stage = self.stage.as_str(), target = %self.target, "Rows rescued");
        counter!("medallion_rows_rescued_total", "stage" => self.stage.as_str(), "target" => self.target)
            .increment(self.count);
    }
}

/// Event emitted when a source checkpoint is saved.
pub struct CheckpointSaved {
    pub target: String,
}

impl InternalEvent for CheckpointSaved {
    fn emit(self) {
        trace!(target = %self.target, "Checkpoint saved");
        counter!("medallion_checkpoints_saved_total", "target" => self.target).increment(1);
    }
}

/// Event emitted with the number of files a checkpoint tracks.
pub struct CheckpointFiles {
    pub count: usize,
    pub target: String,
}

impl InternalEvent for CheckpointFiles {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Checkpoint files tracked");
        gauge!("medallion_checkpoint_files", "target" => self.target).set(self.count as f64);
    }
}

// ============================================================================
// Table events
// ============================================================================

/// Event emitted when a table version is committed.
pub struct TableCommitted {
    pub table: String,
    pub operation: &'static str,
    pub rows: u64,
}

impl InternalEvent for TableCommitted {
    fn emit(self) {
        trace!(table = %self.table, operation = self.operation, rows = self.rows, "Table committed");
        counter!("medallion_table_commits_total", "table" => self.table.clone(), "operation" => self.operation)
            .increment(1);
        counter!("medallion_table_rows_written_total", "table" => self.table).increment(self.rows);
    }
}

/// Event emitted when a Parquet data file is written.
pub struct ParquetFileWritten {
    pub bytes: usize,
    pub table: String,
}

impl InternalEvent for ParquetFileWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, table = %self.table, "Parquet file written");
        counter!("medallion_parquet_files_written_total", "table" => self.table.clone())
            .increment(1);
        counter!("medallion_parquet_bytes_written_total", "table" => self.table)
            .increment(self.bytes as u64);
    }
}

/// Event emitted when a table's schema gains or widens columns.
pub struct SchemaEvolved {
    pub table: String,
    pub added: usize,
    pub widened: usize,
}

impl InternalEvent for SchemaEvolved {
    fn emit(self) {
        trace!(table = %self.table, added = self.added, widened = self.widened, "Schema evolved");
        counter!("medallion_schema_evolutions_total", "table" => self.table).increment(1);
    }
}

// ============================================================================
// Refinement events
// ============================================================================

/// Event emitted after deduplicating a raw table.
pub struct DuplicatesResolved {
    /// Raw rows discarded because a more recent row shared their key.
    pub discarded: u64,
    /// Keys whose winner was chosen by tie-break rather than recency.
    pub ambiguous: u64,
    /// Raw rows skipped because their key was missing.
    pub missing_key: u64,
    pub target: String,
}

impl InternalEvent for DuplicatesResolved {
    fn emit(self) {
        trace!(
            discarded = self.discarded,
            ambiguous = self.ambiguous,
            missing_key = self.missing_key,
            target = %self.target,
            "Duplicates resolved"
        );
        counter!("medallion_duplicates_discarded_total", "target" => self.target.clone())
            .increment(self.discarded);
        counter!("medallion_ambiguous_recency_total", "target" => self.target.clone())
            .increment(self.ambiguous);
        counter!("medallion_missing_key_rows_total", "target" => self.target)
            .increment(self.missing_key);
    }
}

/// Event emitted after expanding nested line items.
pub struct ItemsExpanded {
    pub items: u64,
    pub malformed: u64,
    pub target: String,
}

impl InternalEvent for ItemsExpanded {
    fn emit(self) {
        trace!(items = self.items, malformed = self.malformed, target = %self.target, "Items expanded");
        counter!("medallion_items_expanded_total", "target" => self.target.clone())
            .increment(self.items);
        counter!("medallion_malformed_payloads_total", "target" => self.target)
            .increment(self.malformed);
    }
}

/// Event emitted with the outcome of a key-based merge.
pub struct RowsMerged {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deleted: u64,
    pub table: String,
}

impl InternalEvent for RowsMerged {
    fn emit(self) {
        trace!(
            inserted = self.inserted,
            updated = self.updated,
            unchanged = self.unchanged,
            deleted = self.deleted,
            table = %self.table,
            "Rows merged"
        );
        counter!("medallion_merge_rows_total", "table" => self.table.clone(), "action" => "insert")
            .increment(self.inserted);
        counter!("medallion_merge_rows_total", "table" => self.table.clone(), "action" => "update")
            .increment(self.updated);
        counter!("medallion_merge_rows_total", "table" => self.table.clone(), "action" => "unchanged")
            .increment(self.unchanged);
        counter!("medallion_merge_rows_total", "table" => self.table, "action" => "delete")
            .increment(self.deleted);
    }
}

/// Event emitted when a refinement stage finishes.
pub struct StageCompleted {
    pub stage: &'static str,
    pub duration: Duration,
}

impl InternalEvent for StageCompleted {
    fn emit(self) {
        trace!(stage = self.stage, duration_ms = self.duration.as_millis(), "Stage completed");
        histogram!("medallion_stage_duration_seconds", "stage" => self.stage)
            .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Head,
    Put,
    Delete,
    List,
    Rename,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Head => "head",
            StorageOperation::Put => "put",
            StorageOperation::Delete => "delete",
            StorageOperation::List => "list",
            StorageOperation::Rename => "rename",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "medallion_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        histogram!(
            "medallion_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Polling iteration events
// ============================================================================

/// Result type for iteration metrics.
#[derive(Debug, Clone, Copy)]
pub enum IterationResultType {
    Processed,
    NoItems,
}

impl IterationResultType {
    fn as_str(&self) -> &'static str {
        match self {
            IterationResultType::Processed => "processed",
            IterationResultType::NoItems => "no_items",
        }
    }
}

/// Event emitted when a polling iteration completes.
pub struct IterationCompleted {
    pub service: &'static str,
    pub result: IterationResultType,
    pub target: String,
}

impl InternalEvent for IterationCompleted {
    fn emit(self) {
        trace!(
            service = self.service,
            result = self.result.as_str(),
            target = %self.target,
            "Iteration completed"
        );
        counter!(
            "medallion_iterations_total",
            "service" => self.service,
            "result" => self.result.as_str(),
            "target" => self.target
        )
        .increment(1);
    }
}

/// Event emitted with the wall-clock duration of a polling iteration.
pub struct IterationDuration {
    pub service: &'static str,
    pub duration: Duration,
    pub target: String,
}

impl InternalEvent for IterationDuration {
    fn emit(self) {
        histogram!(
            "medallion_iteration_duration_seconds",
            "service" => self.service,
            "target" => self.target
        )
        .record(self.duration.as_secs_f64());
    }
}
