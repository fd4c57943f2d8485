//! Checkpoint state for incremental sources.
//!
//! Records which files a source has consumed and which micro-batch, if any,
//! was in flight when the loader stopped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_schema_version() -> u32 {
    1
}

/// Activity state of a source, kept for operational visibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "value")]
pub enum WatermarkState {
    /// Nothing processed yet.
    #[default]
    Initial,
    /// Last batch consumed files; holds the greatest file path seen.
    Active(String),
    /// Last poll found no new files.
    Idle(String),
}

impl WatermarkState {
    pub fn path(&self) -> Option<&str> {
        match self {
            WatermarkState::Initial => None,
            WatermarkState::Active(path) | WatermarkState::Idle(path) => Some(path),
        }
    }

    /// Transition to Idle if currently Active. Returns true if changed.
    pub fn mark_idle(&mut self) -> bool {
        match self {
            WatermarkState::Active(path) => {
                let path = std::mem::take(path);
                *self = WatermarkState::Idle(path);
                true
            }
            _ => false,
        }
    }

    fn advance(&mut self, candidate: &str) {
        let next = match self.path() {
            Some(current) if current >= candidate => current.to_string(),
            _ => candidate.to_string(),
        };
        *self = WatermarkState::Active(next);
    }
}

/// A micro-batch that was planned but not yet acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingBatch {
    pub batch_id: u64,
    pub files: Vec<String>,
}

/// Persisted progress of one source.
///
/// # Example
///
/// ```json
/// {
///   "schema_version": 1,
///   "processed_files": {"2021-10-01/sales-1.json": 1},
///   "committed_batch": 1,
///   "pending": null,
///   "watermark": {"state": "Idle", "value": "2021-10-01/sales-1.json"},
///   "last_update_ts": 1633046500
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Relative file path to the batch that consumed it.
    #[serde(default)]
    pub processed_files: BTreeMap<String, u64>,
    /// Highest batch id whose files are recorded above.
    #[serde(default)]
    pub committed_batch: u64,
    #[serde(default)]
    pub pending: Option<PendingBatch>,
    #[serde(default)]
    pub watermark: WatermarkState,
    /// Unix timestamp of the last update.
    #[serde(default)]
    pub last_update_ts: i64,
}

impl Default for CheckpointState {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            processed_files: BTreeMap::new(),
            committed_batch: 0,
            pending: None,
            watermark: WatermarkState::Initial,
            last_update_ts: 0,
        }
    }
}

impl CheckpointState {
    pub fn is_processed(&self, path: &str) -> bool {
        self.processed_files.contains_key(path)
    }

    /// Id for the next batch to plan.
    pub fn next_batch_id(&self) -> u64 {
        self.committed_batch + 1
    }

    /// Record a batch as in flight.
    pub fn begin(&mut self, batch_id: u64, files: Vec<String>) {
        self.pending = Some(PendingBatch { batch_id, files });
        self.touch();
    }

    /// Mark the pending batch's files as processed and clear it.
    ///
    /// Does nothing if no batch (or a different batch) is pending.
    pub fn complete(&mut self, batch_id: u64) {
        let Some(pending) = self.pending.take_if(|p| p.batch_id == batch_id) else {
            return;
        };
        for file in &pending.files {
            self.processed_files.insert(file.clone(), batch_id);
            self.watermark.advance(file);
        }
        self.committed_batch = self.committed_batch.max(batch_id);
        self.touch();
    }

    /// Drop the pending batch without recording its files.
    pub fn abandon(&mut self) -> Option<PendingBatch> {
        let pending = self.pending.take();
        self.touch();
        pending
    }

    pub fn mark_idle(&mut self) -> bool {
        self.watermark.mark_idle()
    }

    fn touch(&mut self) {
        self.last_update_ts = chrono::Utc::now().timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_records_files_and_watermark() {
        let mut state = CheckpointState::default();
        assert_eq!(state.next_batch_id(), 1);

        state.begin(1, vec!["b.json".into(), "a.json".into()]);
        assert!(!state.is_processed("a.json"));

        state.complete(1);
        assert!(state.is_processed("a.json"));
        assert!(state.pending.is_none());
        assert_eq!(state.committed_batch, 1);
        assert_eq!(state.watermark, WatermarkState::Active("b.json".into()));
        assert_eq!(state.next_batch_id(), 2);

        assert!(state.mark_idle());
        assert_eq!(state.watermark.path(), Some("b.json"));
    }

    #[test]
    fn test_complete_ignores_other_batches() {
        let mut state = CheckpointState::default();
        state.begin(3, vec!["a.json".into()]);
        state.complete(2);
        assert!(state.pending.is_some());
        assert!(state.processed_files.is_empty());
    }

    #[test]
    fn test_abandon_leaves_files_unprocessed() {
        let mut state = CheckpointState::default();
        state.begin(1, vec!["a.json".into()]);
        let pending = state.abandon().unwrap();
        assert_eq!(pending.files, vec!["a.json".to_string()]);
        assert!(!state.is_processed("a.json"));
        assert_eq!(state.committed_batch, 0);
    }

    #[test]
    fn test_serde_roundtrip_and_defaults() {
        let mut state = CheckpointState::default();
        state.begin(1, vec!["a.json".into()]);
        state.complete(1);

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""watermark":{"state":"Active","value":"a.json"}"#));
        let restored: CheckpointState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);

        let minimal: CheckpointState = serde_json::from_str("{}").unwrap();
        assert_eq!(minimal.schema_version, 1);
        assert_eq!(minimal.watermark, WatermarkState::Initial);
    }
}
