//! Table manifests and the commit log layout.
//!
//! ```text
//! <table>/_log/00000000000000000000.json   version 0 (create-only)
//! <table>/_log/00000000000000000001.json   version 1
//! <table>/_log/_current.json               hint: latest known version
//! <table>/data/<version>-<uuid>.parquet    data files
//! ```
//!
//! A version is committed once its manifest exists. Manifests are written
//! create-only so two writers can never both commit the same version; the
//! `_current.json` hint only saves readers from probing the whole log.

use chrono::{DateTime, Utc};
use object_store::path::Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::schema::TableSchema;

pub(crate) const LOG_DIR: &str = "_log";
pub(crate) const DATA_DIR: &str = "data";
const CURRENT_FILE: &str = "_current.json";

/// Kind of change a version introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// The table content was replaced.
    Overwrite,
    /// Rows were added to the existing content.
    Append,
    /// Rows were inserted or replaced by key.
    Merge,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Overwrite => "overwrite",
            Operation::Append => "append",
            Operation::Merge => "merge",
        }
    }
}

/// A Parquet file belonging to a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFile {
    /// Path relative to the table root.
    pub path: String,
    pub rows: u64,
    pub size_bytes: u64,
}

/// Counters describing what a commit changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub rows_added: u64,
    #[serde(default)]
    pub rows_updated: u64,
    #[serde(default)]
    pub rows_removed: u64,
    #[serde(default)]
    pub columns_added: Vec<String>,
    #[serde(default)]
    pub columns_widened: Vec<String>,
}

/// Complete description of one table version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u64,
    pub operation: Operation,
    pub committed_at: DateTime<Utc>,
    pub schema: TableSchema,
    /// Every data file visible at this version, in scan order.
    pub files: Vec<DataFile>,
    /// Last committed idempotency marker per writer application.
    #[serde(default)]
    pub transactions: BTreeMap<String, u64>,
    #[serde(default)]
    pub metrics: OperationMetrics,
}

impl Manifest {
    pub fn row_count(&self) -> u64 {
        self.files.iter().map(|f| f.rows).sum()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CurrentVersion {
    pub version: u64,
}

pub(crate) fn manifest_path(table: &str, version: u64) -> Path {
    Path::from(format!("{table}/{LOG_DIR}/{version:020}.json"))
}

pub(crate) fn current_path(table: &str) -> Path {
    Path::from(format!("{table}/{LOG_DIR}/{CURRENT_FILE}"))
}

pub(crate) fn data_file_name(version: u64) -> String {
    format!("{DATA_DIR}/{version:020}-{}.parquet", uuid::Uuid::now_v7())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_paths_sort_by_version() {
        let v9 = manifest_path("sales_raw", 9).to_string();
        let v10 = manifest_path("sales_raw", 10).to_string();
        assert!(v9 < v10);
        assert_eq!(v9, "sales_raw/_log/00000000000000000009.json");
    }

    #[test]
    fn test_data_file_names_are_unique() {
        assert_ne!(data_file_name(1), data_file_name(1));
        assert!(data_file_name(3).starts_with("data/00000000000000000003-"));
    }

    #[test]
    fn test_manifest_defaults_on_read() {
        let json = r#"{
            "version": 0,
            "operation": "overwrite",
            "committed_at": "2021-10-01T00:00:00Z",
            "schema": [{"name": "id", "type": "string"}],
            "files": []
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert!(manifest.transactions.is_empty());
        assert_eq!(manifest.metrics, OperationMetrics::default());
        assert_eq!(manifest.row_count(), 0);
    }
}
