//! Rescued-data queue.
//!
//! Buffers rescued records and writes them as NDJSON files under
//! `<root>/<channel>/rescued-<timestamp>-<seq>.ndjson`. Every flush creates
//! a new file, so earlier files are never rewritten.

use bytes::Bytes;
use chrono::Utc;
use object_store::PutPayload;
use object_store::path::Path;
use snafu::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ErrorHandlingConfig;
use crate::emit;
use crate::error::{RescueError, RescueSerializeSnafu, RescueStorageSnafu, RescueWriteSnafu};
use crate::metrics::events::RowsRescued;
use crate::storage::{StorageProvider, StorageProviderRef};

use super::types::{RescueStats, RescuedRecord};

/// Directory under the warehouse used when no rescue path is configured.
pub const DEFAULT_RESCUE_DIR: &str = "_rescued";

/// Records buffered before an automatic flush.
const BUFFER_SIZE: usize = 1000;

pub struct RescuedDataQueue {
    storage: StorageProviderRef,
    /// Directory (relative to `storage`) receiving this channel's files.
    prefix: String,
    channel: String,
    buffer: Mutex<Vec<RescuedRecord>>,
    stats: Mutex<RescueStats>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for RescuedDataQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RescuedDataQueue<{}/{}>", self.storage.canonical_url(), self.prefix)
    }
}

impl RescuedDataQueue {
    /// Queue writing to `<storage root>/<root>/<channel>/`.
    pub fn new(storage: StorageProviderRef, root: Option<&str>, channel: &str) -> Self {
        let prefix = match root {
            Some(root) => format!("{}/{channel}", root.trim_end_matches('/')),
            None => channel.to_string(),
        };
        Self {
            storage,
            prefix,
            channel: channel.to_string(),
            buffer: Mutex::new(Vec::new()),
            stats: Mutex::new(RescueStats::default()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Queue for `channel` as configured.
    ///
    /// Without a `rescue_path` records go to `_rescued/` in the warehouse.
    pub async fn from_config(
        config: &ErrorHandlingConfig,
        warehouse: &StorageProviderRef,
        channel: &str,
    ) -> Result<Self, RescueError> {
        let queue = match &config.rescue_path {
            Some(path) => {
                let storage = StorageProvider::for_url_with_options(
                    path,
                    config.rescue_storage_options.clone(),
                )
                .await
                .context(RescueStorageSnafu)?;
                Self::new(Arc::new(storage), None, channel)
            }
            None => Self::new(warehouse.clone(), Some(DEFAULT_RESCUE_DIR), channel),
        };

        debug!(channel, location = ?queue, "Rescued-data channel ready");
        Ok(queue)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Directory, relative to the storage root, receiving rescued files.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Buffer a rescued record, flushing when the buffer is full.
    pub async fn record(&self, mut record: RescuedRecord) {
        record.channel = self.channel.clone();

        debug!(
            channel = %self.channel,
            stage = record.stage.as_str(),
            source_file = ?record.source_file,
            row = ?record.row_number,
            reason = %record.reason,
            "Rescuing data"
        );
        emit!(RowsRescued {
            count: 1,
            stage: record.stage,
            target: self.channel.clone(),
        });
        self.stats.lock().await.increment(record.stage);

        let should_flush = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(record);
            buffer.len() >= BUFFER_SIZE
        };

        if should_flush && let Err(e) = self.flush().await {
            warn!(channel = %self.channel, error = %e, "Failed to flush rescued data, will retry");
        }
    }

    /// Number of records not yet written.
    pub async fn pending(&self) -> usize {
        self.buffer.lock().await.len()
    }

    pub async fn stats(&self) -> RescueStats {
        *self.stats.lock().await
    }

    /// Write buffered records to a new file. Returns the number written.
    ///
    /// On failure the records stay buffered for the next flush.
    pub async fn flush(&self) -> Result<usize, RescueError> {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            return Ok(0);
        }

        let mut ndjson = String::new();
        for record in buffer.iter() {
            let line = serde_json::to_string(record).context(RescueSerializeSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = Path::from(format!(
            "{}/rescued-{}-{sequence:06}.ndjson",
            self.prefix,
            Utc::now().format("%Y%m%dT%H%M%S%3fZ")
        ));
        self.storage
            .put_payload(&path, PutPayload::from(Bytes::from(ndjson)))
            .await
            .context(RescueWriteSnafu)?;

        let count = buffer.len();
        buffer.clear();
        self.stats.lock().await.written += count;

        info!(channel = %self.channel, count, path = %path, "Flushed rescued data");
        Ok(count)
    }

    /// Flush remaining records and return the final counts.
    pub async fn finalize(&self) -> Result<RescueStats, RescueError> {
        self.flush().await?;
        let stats = self.stats().await;
        if stats.total() > 0 {
            info!(
                channel = %self.channel,
                total = stats.total(),
                read = stats.read,
                decode = stats.decode,
                parse = stats.parse,
                coerce = stats.coerce,
                expand = stats.expand,
                "Rescued-data channel finalized"
            );
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::events::FailureStage;
    use tempfile::TempDir;

    async fn warehouse(dir: &TempDir) -> StorageProviderRef {
        Arc::new(
            StorageProvider::for_url(dir.path().to_str().unwrap())
                .await
                .unwrap(),
        )
    }

    async fn read_rescued(storage: &StorageProvider, prefix: &str) -> Vec<RescuedRecord> {
        let mut records = Vec::new();
        for path in storage.list_paths(Some(prefix)).await.unwrap() {
            let bytes = storage.get(&path).await.unwrap();
            for line in std::str::from_utf8(&bytes).unwrap().lines() {
                records.push(serde_json::from_str(line).unwrap());
            }
        }
        records
    }

    #[tokio::test]
    async fn test_default_location_is_inside_warehouse() {
        let dir = TempDir::new().unwrap();
        let storage = warehouse(&dir).await;
        let queue = RescuedDataQueue::from_config(&ErrorHandlingConfig::default(), &storage, "sales")
            .await
            .unwrap();

        queue
            .record(RescuedRecord::new(FailureStage::Parse, "bad json", "{oops").with_row_number(2))
            .await;
        assert_eq!(queue.flush().await.unwrap(), 1);

        let records = read_rescued(&storage, "_rescued/sales").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel, "sales");
        assert_eq!(records[0].raw_payload, "{oops");
    }

    #[tokio::test]
    async fn test_each_flush_writes_a_new_file() {
        let dir = TempDir::new().unwrap();
        let storage = warehouse(&dir).await;
        let queue = RescuedDataQueue::new(storage.clone(), Some(DEFAULT_RESCUE_DIR), "silver_sale_items");

        queue
            .record(RescuedRecord::new(FailureStage::Expand, "not an array", "{}"))
            .await;
        queue.flush().await.unwrap();
        queue
            .record(RescuedRecord::new(FailureStage::Expand, "not an array", "7"))
            .await;
        let stats = queue.finalize().await.unwrap();

        assert_eq!(stats.expand, 2);
        assert_eq!(stats.written, 2);
        assert_eq!(
            storage
                .list_paths(Some("_rescued/silver_sale_items"))
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_empty_flush_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let storage = warehouse(&dir).await;
        let queue = RescuedDataQueue::new(storage.clone(), None, "sales");

        assert_eq!(queue.flush().await.unwrap(), 0);
        assert!(storage.list_paths(Some("sales")).await.unwrap().is_empty());
    }
}
