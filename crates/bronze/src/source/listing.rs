//! Source file discovery.
//!
//! Lists a source location recursively and keeps the files a source should
//! ingest: matching extension, not hidden, not yet processed. Results are
//! sorted lexicographically so ingestion order is deterministic.

use std::collections::BTreeMap;

use object_store::path::Path;
use snafu::prelude::*;
use tracing::debug;

use medallion_core::emit;
use medallion_core::metrics::events::FilesDiscovered;
use medallion_core::storage::StorageProvider;

use crate::error::{ListingSnafu, SourceError};

/// Where a source's files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// URL of the directory to open storage on.
    pub root: String,
    /// A single file inside `root`, when the configured path names one.
    pub file: Option<String>,
}

impl SourceLocation {
    /// Split a configured path into a directory and an optional file name.
    ///
    /// A path whose last segment carries one of `extensions` names a file.
    pub fn resolve(path: &str, extensions: &[&str]) -> Self {
        let trimmed = path.trim_end_matches('/');
        if has_extension(trimmed, extensions) {
            let (root, file) = trimmed.rsplit_once('/').unwrap_or((".", trimmed));
            return Self {
                root: root.to_string(),
                file: Some(file.to_string()),
            };
        }

        Self {
            root: trimmed.to_string(),
            file: None,
        }
    }
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((_, ext)) => extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        None => false,
    }
}

/// Whether `path` (relative to the source root) should be ingested.
///
/// Any segment starting with `_` or `.` hides the file, which keeps
/// checkpoint, rescue and temp files out of discovery.
pub fn is_candidate(path: &str, extensions: &[&str]) -> bool {
    let hidden = path
        .split('/')
        .any(|segment| segment.starts_with('_') || segment.starts_with('.'));
    !hidden && has_extension(path, extensions)
}

/// List every candidate file under the storage root, sorted.
pub async fn list_candidates(
    storage: &StorageProvider,
    extensions: &[&str],
    target: &str,
) -> Result<Vec<String>, SourceError> {
    let paths: Vec<Path> = storage.list_paths(None).await.context(ListingSnafu)?;
    let files: Vec<String> = paths
        .iter()
        .map(|p| p.to_string())
        .filter(|p| is_candidate(p, extensions))
        .collect();

    debug!(target = %target, listed = paths.len(), candidates = files.len(), "Listed source");
    Ok(files)
}

/// List candidate files not in `processed`, capped at `limit`.
pub async fn list_pending_files(
    storage: &StorageProvider,
    extensions: &[&str],
    processed: &BTreeMap<String, u64>,
    limit: usize,
    target: &str,
) -> Result<Vec<String>, SourceError> {
    let mut pending: Vec<String> = list_candidates(storage, extensions, target)
        .await?
        .into_iter()
        .filter(|path| !processed.contains_key(path))
        .collect();

    emit!(FilesDiscovered {
        count: pending.len() as u64,
        target: target.to_string(),
    });

    if limit > 0 && pending.len() > limit {
        debug!(
            target = %target,
            available = pending.len(),
            limit,
            "Capping micro-batch"
        );
        pending.truncate(limit);
    }
    Ok(pending)
}
