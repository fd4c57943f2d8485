//! Full reload of an overwrite source.

use object_store::path::Path;
use snafu::prelude::*;
use tracing::info;

use medallion_core::emit;
use medallion_core::metrics::events::{FilesDiscovered, RecordsIngested};
use medallion_core::storage::StorageProvider;
use medallion_core::table::{CommitInfo, Table};

use crate::config::SourceFormat;
use crate::error::{IngestError, ListingSnafu, NoFilesSnafu};
use crate::failure::FailureTracker;
use crate::source::{FileParser, SourceLocation, list_candidates};

use super::load::load_files;

/// Read every file of the source and replace the table with their rows.
pub async fn load_snapshot(
    name: &str,
    storage: &StorageProvider,
    location: &SourceLocation,
    parser: &dyn FileParser,
    table: &Table,
    failures: &mut FailureTracker,
    format: &SourceFormat,
) -> Result<CommitInfo, IngestError> {
    let files = match &location.file {
        Some(file) => {
            let exists = storage
                .exists(&Path::from(file.as_str()))
                .await
                .context(ListingSnafu)?;
            if exists { vec![file.clone()] } else { Vec::new() }
        }
        None => list_candidates(storage, format.extensions(), name).await?,
    };
    emit!(FilesDiscovered {
        count: files.len() as u64,
        target: name.to_string(),
    });

    let no_files = NoFilesSnafu {
        path: storage.canonical_url(),
        format: format.name(),
    };
    ensure!(!files.is_empty(), no_files);

    // Every file failing would otherwise empty the table
    let loaded = load_files(storage, &files, parser, failures, name).await?;
    ensure!(loaded.loaded > 0, no_files);
    let commit = table.overwrite(&loaded.schema, &loaded.rows).await?;
    failures.flush().await;

    emit!(RecordsIngested {
        count: commit.rows_added,
        target: name.to_string(),
    });
    info!(
        target = %name,
        version = commit.version,
        rows = commit.rows_added,
        files = loaded.loaded,
        failed_files = loaded.failed,
        "Replaced table content"
    );
    Ok(commit)
}
