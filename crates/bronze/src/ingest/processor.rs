//! Micro-batch processor for incremental and continuous sources.
//!
//! Each batch follows the same protocol so that a crash at any point is
//! recoverable without losing or duplicating rows:
//!
//! 1. Plan: pick unprocessed files and save them as the pending batch.
//! 2. Load: read, parse and rescue.
//! 3. Commit: append to the table tagged with `(bronze:<source>, batch_id)`.
//! 4. Flush rescued data.
//! 5. Acknowledge: mark the files processed and clear the pending batch.
//!
//! On cold start a pending batch whose marker is already in the table is
//! acknowledged; any other pending batch is discarded and its files are
//! planned again.

use async_trait::async_trait;
use object_store::path::Path;
use snafu::prelude::*;
use tracing::{info, warn};

use medallion_core::emit;
use medallion_core::metrics::events::{FilesDiscovered, PendingFiles, RecordsIngested};
use medallion_core::polling::{IterationResult, PollingProcessor};
use medallion_core::rescue::RescueStats;
use medallion_core::storage::StorageProviderRef;
use medallion_core::table::{AppendOptions, AppendOutcome, Table, Transaction};

use crate::checkpoint::CheckpointManager;
use crate::config::SourceConfig;
use crate::error::{IngestError, ListingSnafu};
use crate::failure::FailureTracker;
use crate::source::{FileParser, SourceLocation, list_pending_files};

use super::load::load_files;

/// Transaction app id under which a source's batches are committed.
pub fn app_id(source_name: &str) -> String {
    format!("bronze:{source_name}")
}

/// Files planned for one micro-batch.
#[derive(Debug)]
pub struct MicroBatch {
    pub batch_id: u64,
    pub files: Vec<String>,
}

pub struct Ingestor {
    name: String,
    config: SourceConfig,
    storage: StorageProviderRef,
    location: SourceLocation,
    parser: Box<dyn FileParser>,
    table: Table,
    checkpoint: CheckpointManager,
    failures: FailureTracker,
}

impl Ingestor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        config: SourceConfig,
        storage: StorageProviderRef,
        location: SourceLocation,
        parser: Box<dyn FileParser>,
        table: Table,
        checkpoint: CheckpointManager,
        failures: FailureTracker,
    ) -> Self {
        Self {
            name,
            config,
            storage,
            location,
            parser,
            table,
            checkpoint,
            failures,
        }
    }

    /// Reconcile the checkpoint with the table after a restart.
    async fn recover(&mut self) -> Result<(), IngestError> {
        self.checkpoint.load().await?;
        let marker = self
            .table
            .transaction_version(&app_id(&self.name))
            .await?
            .unwrap_or(0);

        let state = self.checkpoint.state_mut();
        let mut changed = false;

        if let Some(pending) = state.pending.clone() {
            if marker >= pending.batch_id {
                info!(
                    target = %self.name,
                    batch_id = pending.batch_id,
                    files = pending.files.len(),
                    "Pending batch was committed before restart, acknowledging"
                );
                state.complete(pending.batch_id);
            } else {
                warn!(
                    target = %self.name,
                    batch_id = pending.batch_id,
                    files = pending.files.len(),
                    "Pending batch was not committed, replanning its files"
                );
                state.abandon();
            }
            changed = true;
        }

        // A stale checkpoint must never reuse a batch id the table already holds
        if marker > state.committed_batch {
            warn!(
                target = %self.name,
                checkpoint = state.committed_batch,
                table = marker,
                "Checkpoint is behind the table, advancing batch id"
            );
            state.committed_batch = marker;
            changed = true;
        }

        if changed {
            self.checkpoint.save().await?;
        }
        Ok(())
    }

    async fn pending_files(&self) -> Result<Vec<String>, IngestError> {
        let processed = &self.checkpoint.state().processed_files;

        let Some(file) = &self.location.file else {
            return Ok(list_pending_files(
                &self.storage,
                self.config.format.extensions(),
                processed,
                self.config.max_files_per_batch,
                &self.name,
            )
            .await?);
        };

        let exists = self
            .storage
            .exists(&Path::from(file.as_str()))
            .await
            .context(ListingSnafu)?;
        let pending: Vec<String> = if exists && !processed.contains_key(file) {
            vec![file.clone()]
        } else {
            Vec::new()
        };
        emit!(FilesDiscovered {
            count: pending.len() as u64,
            target: self.name.clone(),
        });
        Ok(pending)
    }

    /// Flush rescued data and return the source's final counts.
    pub async fn finish(&self) -> RescueStats {
        self.failures.finalize().await
    }
}

#[async_trait]
impl PollingProcessor for Ingestor {
    type State = MicroBatch;
    type Error = IngestError;

    async fn prepare(&mut self, cold_start: bool) -> Result<Option<MicroBatch>, IngestError> {
        if cold_start {
            self.recover().await?;
        }

        let files = self.pending_files().await?;
        emit!(PendingFiles {
            count: files.len(),
            target: self.name.clone(),
        });

        if files.is_empty() {
            if self.checkpoint.state_mut().mark_idle() {
                self.checkpoint.save().await?;
            }
            return Ok(None);
        }

        let batch_id = self.checkpoint.state().next_batch_id();
        self.checkpoint.state_mut().begin(batch_id, files.clone());
        self.checkpoint.save().await?;

        info!(target = %self.name, batch_id, files = files.len(), "Planned micro-batch");
        Ok(Some(MicroBatch { batch_id, files }))
    }

    async fn process(&mut self, batch: MicroBatch) -> Result<IterationResult, IngestError> {
        let loaded = load_files(
            &self.storage,
            &batch.files,
            self.parser.as_ref(),
            &mut self.failures,
            &self.name,
        )
        .await?;

        let options = AppendOptions {
            mode: self.config.schema_evolution,
            transaction: Some(Transaction::new(app_id(&self.name), batch.batch_id)),
        };
        let rows = loaded.rows.len() as u64;

        match self.table.append(&loaded.rows, &loaded.schema, options).await? {
            AppendOutcome::Committed(commit) => {
                emit!(RecordsIngested {
                    count: rows,
                    target: self.name.clone(),
                });
                info!(
                    target = %self.name,
                    batch_id = batch.batch_id,
                    version = commit.version,
                    rows,
                    files = loaded.loaded,
                    failed_files = loaded.failed,
                    "Committed micro-batch"
                );
            }
            AppendOutcome::AlreadyApplied { committed } => {
                info!(
                    target = %self.name,
                    batch_id = batch.batch_id,
                    committed,
                    "Micro-batch already committed, skipping append"
                );
            }
            AppendOutcome::Empty => {}
        }

        self.failures.flush().await;

        self.checkpoint.state_mut().complete(batch.batch_id);
        self.checkpoint.save().await?;

        Ok(IterationResult::ProcessedItems)
    }
}
