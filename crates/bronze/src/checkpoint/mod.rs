//! Checkpoint persistence for incremental sources.
//!
//! Checkpoints live next to the tables they feed, at
//! `{warehouse}/_checkpoints/{source}.json`, and are replaced atomically
//! (temp file + rename) so a reader never sees a partial write.

pub mod state;

pub use state::{CheckpointState, PendingBatch, WatermarkState};

use object_store::path::Path;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use medallion_core::emit;
use medallion_core::metrics::events::{CheckpointFiles, CheckpointSaved};
use medallion_core::storage::StorageProviderRef;

use crate::error::{CheckpointError, CheckpointSerializeSnafu, CheckpointStorageSnafu};

/// Directory holding checkpoint files, relative to the warehouse root.
pub const CHECKPOINT_DIR: &str = "_checkpoints";

/// Loads and saves the checkpoint of one source.
pub struct CheckpointManager {
    storage: StorageProviderRef,
    source_name: String,
    state: CheckpointState,
}

impl CheckpointManager {
    pub fn new(storage: StorageProviderRef, source_name: impl Into<String>) -> Self {
        Self {
            storage,
            source_name: source_name.into(),
            state: CheckpointState::default(),
        }
    }

    fn checkpoint_path(&self) -> Path {
        Path::from(format!("{CHECKPOINT_DIR}/{}.json", self.source_name))
    }

    /// Load the checkpoint from storage.
    ///
    /// Returns `Ok(true)` if one was loaded, `Ok(false)` if none exists or it
    /// could not be parsed (the source then starts fresh).
    pub async fn load(&mut self) -> Result<bool, CheckpointError> {
        let path = self.checkpoint_path();

        match self.storage.get(&path).await {
            Ok(bytes) => match serde_json::from_slice::<CheckpointState>(&bytes) {
                Ok(state) => {
                    info!(
                        target = %self.source_name,
                        processed_files = state.processed_files.len(),
                        committed_batch = state.committed_batch,
                        pending = state.pending.as_ref().map(|p| p.batch_id),
                        "Loaded checkpoint"
                    );
                    self.state = state;
                    Ok(true)
                }
                Err(e) => {
                    warn!(
                        target = %self.source_name,
                        error = %e,
                        "Failed to parse checkpoint JSON, starting fresh"
                    );
                    self.state = CheckpointState::default();
                    Ok(false)
                }
            },
            Err(e) if e.is_not_found() => {
                debug!(target = %self.source_name, "No checkpoint found, starting fresh");
                Ok(false)
            }
            Err(source) => Err(CheckpointError::CheckpointStorage { source }),
        }
    }

    /// Persist the current state.
    pub async fn save(&self) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec_pretty(&self.state).context(CheckpointSerializeSnafu)?;

        self.storage
            .atomic_write(&self.checkpoint_path(), json)
            .await
            .context(CheckpointStorageSnafu)?;

        emit!(CheckpointSaved {
            target: self.source_name.clone(),
        });
        emit!(CheckpointFiles {
            count: self.state.processed_files.len(),
            target: self.source_name.clone(),
        });
        debug!(
            target = %self.source_name,
            committed_batch = self.state.committed_batch,
            watermark = ?self.state.watermark,
            "Saved checkpoint"
        );
        Ok(())
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut CheckpointState {
        &mut self.state
    }
}
