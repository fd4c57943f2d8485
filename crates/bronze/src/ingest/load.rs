//! Reading a set of source files into one batch of rows.

use chrono::Utc;
use tracing::debug;

use medallion_core::emit;
use medallion_core::metrics::events::{FileProcessed, FileStatus};
use medallion_core::storage::StorageProvider;
use medallion_core::table::{Row, TableSchema};

use crate::error::IngestError;
use crate::failure::FailureTracker;
use crate::source::{FileParser, add_provenance, read_source_file, source_file_url};

/// Rows and combined schema of every readable file in a batch.
#[derive(Debug, Default)]
pub struct LoadedFiles {
    pub rows: Vec<Row>,
    pub schema: TableSchema,
    pub loaded: usize,
    pub failed: usize,
}

/// Read, parse and stamp `files` (relative to `storage`).
///
/// Unreadable files are rescued through `failures` and skipped; the batch
/// only fails once `max_failures` is exceeded.
pub async fn load_files(
    storage: &StorageProvider,
    files: &[String],
    parser: &dyn FileParser,
    failures: &mut FailureTracker,
    target: &str,
) -> Result<LoadedFiles, IngestError> {
    let ingested_at = Utc::now();
    let mut batch = LoadedFiles::default();

    for relative in files {
        let source_file = source_file_url(storage, relative);

        let mut parsed = match read_source_file(storage, relative, parser).await {
            Ok(parsed) => parsed,
            Err(failure) => {
                batch.failed += 1;
                failures.record_file_failure(&source_file, failure).await?;
                continue;
            }
        };

        debug!(
            target = %target,
            file = %relative,
            rows = parsed.rows.len(),
            rescued = parsed.rescued.len(),
            "Parsed file"
        );
        failures.rescue_rows(std::mem::take(&mut parsed.rescued)).await;
        add_provenance(&mut parsed, &source_file, ingested_at);

        for column in parsed.schema.columns() {
            batch.schema.observe(&column.name, column.column_type);
        }
        batch.rows.append(&mut parsed.rows);
        batch.loaded += 1;

        emit!(FileProcessed {
            status: FileStatus::Success,
            target: target.to_string(),
        });
    }

    Ok(batch)
}
