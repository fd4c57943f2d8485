//! Versioned tables on object storage.
//!
//! A [`Catalog`] is a handle on a warehouse root; each [`Table`] lives under
//! `<warehouse>/<name>/` as Parquet data files plus a log of JSON manifests
//! (see [`manifest`]). Every write produces exactly one new version, and a
//! version only becomes visible once its manifest has been created.

pub mod batch;
pub mod evolution;
pub mod manifest;
mod merge;
pub mod schema;

pub use evolution::{SchemaEvolutionMode, SchemaPlan, reconcile};
pub use manifest::{DataFile, Manifest, Operation, OperationMetrics};
pub use merge::{MergeOptions, MergeOutcome, MergeStats, ReplaceScope};
pub use schema::{ColumnSpec, ColumnType, CoercionError, Row, TableSchema, coerce_value};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use object_store::PutPayload;
use object_store::path::Path;
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ParquetCompression;
use crate::emit;
use crate::error::{
    ConcurrentCommitSnafu, InvalidTableNameSnafu, ManifestSnafu, RecordSnafu, TableError,
    TableNotFoundSnafu, TableStorageSnafu, ValueMismatchSnafu, VersionNotFoundSnafu,
};
use crate::metrics::events::{ParquetFileWritten, SchemaEvolved, TableCommitted};
use crate::storage::{StorageProvider, StorageProviderRef};
use manifest::{CurrentVersion, current_path, data_file_name, manifest_path};

/// Data files fetched in parallel when reading a version.
const READ_CONCURRENCY: usize = 8;

/// A record type with a fixed table schema.
pub trait TableRecord {
    fn schema() -> TableSchema;
}

/// Handle on a warehouse root holding many tables.
#[derive(Debug, Clone)]
pub struct Catalog {
    storage: StorageProviderRef,
    compression: ParquetCompression,
}

impl Catalog {
    pub fn new(storage: StorageProviderRef) -> Self {
        Self {
            storage,
            compression: ParquetCompression::default(),
        }
    }

    /// Open a catalog rooted at `uri`.
    pub async fn open(
        uri: &str,
        storage_options: HashMap<String, String>,
    ) -> Result<Self, TableError> {
        let storage = StorageProvider::for_url_with_options(uri, storage_options)
            .await
            .context(TableStorageSnafu)?;
        Ok(Self::new(Arc::new(storage)))
    }

    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Storage rooted at the warehouse.
    pub fn storage(&self) -> &StorageProviderRef {
        &self.storage
    }

    /// Handle on the table called `name`. The table need not exist yet.
    pub fn table(&self, name: &str) -> Result<Table, TableError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        ensure!(valid, InvalidTableNameSnafu { name });

        Ok(Table {
            name: name.to_string(),
            storage: self.storage.clone(),
            compression: self.compression,
        })
    }
}

/// Summary of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub version: u64,
    pub operation: Operation,
    pub rows_added: u64,
    pub files_added: usize,
}

/// One entry of a table's version history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub version: u64,
    pub operation: Operation,
    pub committed_at: DateTime<Utc>,
    /// Rows visible at this version.
    pub rows: u64,
    pub metrics: OperationMetrics,
}

/// Idempotency marker attached to an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub app_id: String,
    pub version: u64,
}

impl Transaction {
    pub fn new(app_id: impl Into<String>, version: u64) -> Self {
        Self {
            app_id: app_id.into(),
            version,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    pub mode: SchemaEvolutionMode,
    pub transaction: Option<Transaction>,
}

/// Result of [`Table::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Committed(CommitInfo),
    /// The transaction marker was already committed; nothing was written.
    AlreadyApplied { committed: u64 },
    /// No rows and no transaction marker; nothing to commit.
    Empty,
}

/// A named table inside a [`Catalog`].
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    storage: StorageProviderRef,
    compression: ParquetCompression,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest committed version, or `None` if the table was never written.
    pub async fn latest_version(&self) -> Result<Option<u64>, TableError> {
        let mut version = match self.read_current_hint().await? {
            Some(version) => version,
            None => {
                if !self.version_exists(0).await? {
                    return Ok(None);
                }
                0
            }
        };

        // The hint is written after the manifest and may lag behind
        while self.version_exists(version + 1).await? {
            version += 1;
        }
        Ok(Some(version))
    }

    pub async fn exists(&self) -> Result<bool, TableError> {
        Ok(self.latest_version().await?.is_some())
    }

    /// Manifest of the latest version.
    pub async fn snapshot(&self) -> Result<Manifest, TableError> {
        self.try_snapshot()
            .await?
            .context(TableNotFoundSnafu { table: &self.name })
    }

    /// Manifest of the latest version, or `None` if the table does not exist.
    pub async fn try_snapshot(&self) -> Result<Option<Manifest>, TableError> {
        match self.latest_version().await? {
            Some(version) => self.snapshot_at(version).await.map(Some),
            None => Ok(None),
        }
    }

    /// Manifest of a specific version.
    pub async fn snapshot_at(&self, version: u64) -> Result<Manifest, TableError> {
        let bytes = match self.storage.get(&manifest_path(&self.name, version)).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                return VersionNotFoundSnafu {
                    table: &self.name,
                    version,
                }
                .fail();
            }
            Err(source) => return Err(TableError::TableStorage { source }),
        };
        serde_json::from_slice(&bytes).context(ManifestSnafu { table: &self.name })
    }

    /// All committed versions, oldest first.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, TableError> {
        let Some(latest) = self.latest_version().await? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::with_capacity(latest as usize + 1);
        for version in 0..=latest {
            let manifest = self.snapshot_at(version).await?;
            entries.push(HistoryEntry {
                version,
                operation: manifest.operation,
                committed_at: manifest.committed_at,
                rows: manifest.row_count(),
                metrics: manifest.metrics,
            });
        }
        Ok(entries)
    }

    /// Last committed transaction marker for `app_id`.
    pub async fn transaction_version(&self, app_id: &str) -> Result<Option<u64>, TableError> {
        Ok(self
            .try_snapshot()
            .await?
            .and_then(|m| m.transactions.get(app_id).copied()))
    }

    /// Rows of the latest version, in scan order.
    pub async fn read_rows(&self) -> Result<Vec<Row>, TableError> {
        let manifest = self.snapshot().await?;
        self.read_manifest(&manifest).await
    }

    /// Rows of a specific version.
    pub async fn read_rows_at(&self, version: u64) -> Result<Vec<Row>, TableError> {
        let manifest = self.snapshot_at(version).await?;
        self.read_manifest(&manifest).await
    }

    /// Rows of the latest version deserialized into `T`.
    pub async fn read_records<T: DeserializeOwned>(&self) -> Result<Vec<T>, TableError> {
        self.read_rows()
            .await?
            .into_iter()
            .map(|row| {
                serde_json::from_value(serde_json::Value::Object(row))
                    .context(RecordSnafu { table: &self.name })
            })
            .collect()
    }

    /// Read every file of `manifest`, conforming rows to the manifest schema.
    ///
    /// Older files may predate added or widened columns; conforming fills the
    /// missing columns with null and casts widened ones.
    pub async fn read_manifest(&self, manifest: &Manifest) -> Result<Vec<Row>, TableError> {
        let files: Vec<Vec<Row>> = futures::stream::iter(manifest.files.iter())
            .map(|file| self.read_data_file(file))
            .buffered(READ_CONCURRENCY)
            .try_collect()
            .await?;

        files
            .into_iter()
            .flatten()
            .map(|row| self.conform(&manifest.schema, &row))
            .collect()
    }

    async fn read_data_file(&self, file: &DataFile) -> Result<Vec<Row>, TableError> {
        let bytes = self
            .storage
            .get(&self.data_path(&file.path))
            .await
            .context(TableStorageSnafu)?;
        batch::decode_parquet(&self.name, bytes)
    }

    /// Atomically replace the table content.
    pub async fn overwrite(
        &self,
        schema: &TableSchema,
        rows: &[Row],
    ) -> Result<CommitInfo, TableError> {
        let previous = self.latest_version().await?;
        let version = previous.map_or(0, |v| v + 1);

        let rows = rows
            .iter()
            .map(|row| self.conform(schema, row))
            .collect::<Result<Vec<_>, _>>()?;

        let mut files = Vec::new();
        if !rows.is_empty() {
            files.push(self.write_data_file(version, schema, &rows).await?);
        }

        let rows_removed = match previous {
            Some(v) => self.snapshot_at(v).await?.row_count(),
            None => 0,
        };

        let manifest = Manifest {
            version,
            operation: Operation::Overwrite,
            committed_at: Utc::now(),
            schema: schema.clone(),
            files,
            transactions: BTreeMap::new(),
            metrics: OperationMetrics {
                rows_added: rows.len() as u64,
                rows_removed,
                ..Default::default()
            },
        };
        self.commit(manifest).await
    }

    /// Overwrite the table with typed records.
    pub async fn overwrite_records<T>(&self, records: &[T]) -> Result<CommitInfo, TableError>
    where
        T: TableRecord + Serialize,
    {
        let rows = records
            .iter()
            .map(|record| self.record_to_row(record))
            .collect::<Result<Vec<_>, _>>()?;
        self.overwrite(&T::schema(), &rows).await
    }

    fn record_to_row<T: Serialize>(&self, record: &T) -> Result<Row, TableError> {
        match serde_json::to_value(record).context(RecordSnafu { table: &self.name })? {
            serde_json::Value::Object(row) => Ok(row),
            _ => Err(TableError::Record {
                table: self.name.clone(),
                source: <serde_json::Error as serde::ser::Error>::custom(
                    "record did not serialize to an object",
                ),
            }),
        }
    }

    /// Atomically append rows whose columns are described by `incoming`.
    ///
    /// The table schema is reconciled with `incoming` according to
    /// `options.mode`. With a transaction marker the append happens at most
    /// once per `(app_id, version)`: if the table already holds that marker
    /// (or a later one) nothing is written. A marker with no rows still
    /// commits so the marker itself becomes durable.
    pub async fn append(
        &self,
        rows: &[Row],
        incoming: &TableSchema,
        options: AppendOptions,
    ) -> Result<AppendOutcome, TableError> {
        let current = self.try_snapshot().await?;

        if let Some(txn) = &options.transaction
            && let Some(committed) = current
                .as_ref()
                .and_then(|m| m.transactions.get(&txn.app_id).copied())
            && committed >= txn.version
        {
            debug!(
                table = %self.name,
                app_id = %txn.app_id,
                committed,
                requested = txn.version,
                "Transaction already applied"
            );
            return Ok(AppendOutcome::AlreadyApplied { committed });
        }

        if rows.is_empty() && options.transaction.is_none() {
            return Ok(AppendOutcome::Empty);
        }

        let plan = match &current {
            Some(manifest) => reconcile(&self.name, &manifest.schema, incoming, options.mode)?,
            None => SchemaPlan {
                merged: incoming.clone(),
                added: Vec::new(),
                widened: Vec::new(),
            },
        };

        if !plan.is_unchanged() {
            info!(
                table = %self.name,
                added = ?plan.added,
                widened = ?plan.widened,
                "Evolving table schema"
            );
            emit!(SchemaEvolved {
                table: self.name.clone(),
                added: plan.added.len(),
                widened: plan.widened.len(),
            });
        }

        let rows = rows
            .iter()
            .map(|row| self.conform(&plan.merged, row))
            .collect::<Result<Vec<_>, _>>()?;

        let version = current.as_ref().map_or(0, |m| m.version + 1);
        let (mut files, mut transactions) = match current {
            Some(manifest) => (manifest.files, manifest.transactions),
            None => (Vec::new(), BTreeMap::new()),
        };
        if !rows.is_empty() {
            files.push(self.write_data_file(version, &plan.merged, &rows).await?);
        }
        if let Some(txn) = options.transaction {
            transactions.insert(txn.app_id, txn.version);
        }

        let manifest = Manifest {
            version,
            operation: Operation::Append,
            committed_at: Utc::now(),
            schema: plan.merged,
            files,
            transactions,
            metrics: OperationMetrics {
                rows_added: rows.len() as u64,
                columns_added: plan.added,
                columns_widened: plan.widened,
                ..Default::default()
            },
        };
        self.commit(manifest).await.map(AppendOutcome::Committed)
    }

    fn conform(&self, schema: &TableSchema, row: &Row) -> Result<Row, TableError> {
        schema.conform(row).map_err(|e| {
            ValueMismatchSnafu {
                table: &self.name,
                column: e.column.clone(),
                message: e.to_string(),
            }
            .build()
        })
    }

    fn data_path(&self, relative: &str) -> Path {
        Path::from(format!("{}/{relative}", self.name))
    }

    pub(crate) async fn write_data_file(
        &self,
        version: u64,
        schema: &TableSchema,
        rows: &[Row],
    ) -> Result<DataFile, TableError> {
        let encoded = batch::encode_parquet(&self.name, schema, rows, self.compression)?;
        let size = encoded.len();
        let relative = data_file_name(version);

        self.storage
            .put_payload(
                &self.data_path(&relative),
                PutPayload::from(Bytes::from(encoded)),
            )
            .await
            .context(TableStorageSnafu)?;

        emit!(ParquetFileWritten {
            bytes: size,
            table: self.name.clone(),
        });

        Ok(DataFile {
            path: relative,
            rows: rows.len() as u64,
            size_bytes: size as u64,
        })
    }

    /// Publish `manifest` as its version.
    ///
    /// The manifest is created with a create-only put, so a writer that lost
    /// the race for this version gets [`TableError::ConcurrentCommit`] and
    /// its data files stay unreferenced.
    pub(crate) async fn commit(&self, manifest: Manifest) -> Result<CommitInfo, TableError> {
        let version = manifest.version;
        let body = serde_json::to_vec_pretty(&manifest).context(ManifestSnafu { table: &self.name })?;

        match self
            .storage
            .put_if_absent(
                &manifest_path(&self.name, version),
                PutPayload::from(Bytes::from(body)),
            )
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {
                return ConcurrentCommitSnafu {
                    table: &self.name,
                    version,
                }
                .fail();
            }
            Err(source) => return Err(TableError::TableStorage { source }),
        }

        self.write_current_hint(version).await;

        let new_prefix = format!("{}/{version:020}-", manifest::DATA_DIR);
        let files_added = manifest
            .files
            .iter()
            .filter(|f| f.path.starts_with(&new_prefix))
            .count();

        info!(
            table = %self.name,
            version,
            operation = manifest.operation.as_str(),
            rows_added = manifest.metrics.rows_added,
            rows_updated = manifest.metrics.rows_updated,
            "Committed table version"
        );
        emit!(TableCommitted {
            table: self.name.clone(),
            operation: manifest.operation.as_str(),
            rows: manifest.metrics.rows_added,
        });

        Ok(CommitInfo {
            version,
            operation: manifest.operation,
            rows_added: manifest.metrics.rows_added,
            files_added,
        })
    }

    async fn version_exists(&self, version: u64) -> Result<bool, TableError> {
        self.storage
            .exists(&manifest_path(&self.name, version))
            .await
            .context(TableStorageSnafu)
    }

    async fn read_current_hint(&self) -> Result<Option<u64>, TableError> {
        match self.storage.get(&current_path(&self.name)).await {
            Ok(bytes) => match serde_json::from_slice::<CurrentVersion>(&bytes) {
                Ok(current) => Ok(Some(current.version)),
                Err(e) => {
                    warn!(table = %self.name, error = %e, "Ignoring unreadable version hint");
                    Ok(None)
                }
            },
            Err(e) if e.is_not_found() => Ok(None),
            Err(source) => Err(TableError::TableStorage { source }),
        }
    }

    /// Best effort: readers look past a stale hint.
    async fn write_current_hint(&self, version: u64) {
        let body = match serde_json::to_vec(&CurrentVersion { version }) {
            Ok(body) => body,
            Err(e) => {
                warn!(table = %self.name, error = %e, "Failed to encode version hint");
                return;
            }
        };
        if let Err(e) = self
            .storage
            .atomic_write(&current_path(&self.name), body)
            .await
        {
            warn!(table = %self.name, version, error = %e, "Failed to update version hint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    async fn test_catalog(dir: &TempDir) -> Catalog {
        Catalog::open(dir.path().to_str().unwrap(), HashMap::new())
            .await
            .unwrap()
    }

    fn rows(values: Vec<Value>) -> Vec<Row> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn raw_schema() -> TableSchema {
        TableSchema::of(&[("SaleID", ColumnType::String), ("ts", ColumnType::Long)])
    }

    #[tokio::test]
    async fn test_missing_table() {
        let dir = TempDir::new().unwrap();
        let table = test_catalog(&dir).await.table("sales_raw").unwrap();

        assert_eq!(table.latest_version().await.unwrap(), None);
        assert!(table.history().await.unwrap().is_empty());
        assert!(matches!(
            table.read_rows().await.unwrap_err(),
            TableError::TableNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_table_names_are_validated() {
        let dir = TempDir::new().unwrap();
        let catalog = test_catalog(&dir).await;
        assert!(catalog.table("silver_sales").is_ok());
        assert!(catalog.table("../etc").is_err());
        assert!(catalog.table("").is_err());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_and_keeps_history() {
        let dir = TempDir::new().unwrap();
        let table = test_catalog(&dir).await.table("dim_locations").unwrap();
        let schema = TableSchema::of(&[("id", ColumnType::String)]);

        table
            .overwrite(&schema, &rows(vec![json!({"id": "SYD01"}), json!({"id": "AKL01"})]))
            .await
            .unwrap();
        let info = table
            .overwrite(&schema, &rows(vec![json!({"id": "MEL01"})]))
            .await
            .unwrap();

        assert_eq!(info.version, 1);
        assert_eq!(table.read_rows().await.unwrap(), rows(vec![json!({"id": "MEL01"})]));
        assert_eq!(table.read_rows_at(0).await.unwrap().len(), 2);

        let history = table.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].operation, Operation::Overwrite);
        assert_eq!(history[1].metrics.rows_removed, 2);
    }

    #[tokio::test]
    async fn test_append_evolves_schema_and_fills_nulls() {
        let dir = TempDir::new().unwrap();
        let table = test_catalog(&dir).await.table("sales_raw").unwrap();

        table
            .append(
                &rows(vec![json!({"SaleID": "S1", "ts": 1})]),
                &raw_schema(),
                AppendOptions::default(),
            )
            .await
            .unwrap();

        let incoming = TableSchema::of(&[
            ("SaleID", ColumnType::String),
            ("ts", ColumnType::Double),
            ("STATE", ColumnType::String),
        ]);
        table
            .append(
                &rows(vec![json!({"SaleID": "S2", "ts": 2.5, "STATE": "paid"})]),
                &incoming,
                AppendOptions::default(),
            )
            .await
            .unwrap();

        let manifest = table.snapshot().await.unwrap();
        assert_eq!(manifest.schema.column("ts").unwrap().column_type, ColumnType::Double);
        assert_eq!(manifest.metrics.columns_added, vec!["STATE".to_string()]);

        let all = table.read_rows().await.unwrap();
        assert_eq!(
            all,
            rows(vec![
                json!({"SaleID": "S1", "ts": 1.0, "STATE": null}),
                json!({"SaleID": "S2", "ts": 2.5, "STATE": "paid"}),
            ])
        );
    }

    #[tokio::test]
    async fn test_append_schema_conflict_leaves_table_untouched() {
        let dir = TempDir::new().unwrap();
        let table = test_catalog(&dir).await.table("sales_raw").unwrap();
        table
            .append(
                &rows(vec![json!({"SaleID": "S1", "ts": 1})]),
                &raw_schema(),
                AppendOptions::default(),
            )
            .await
            .unwrap();

        let incoming = TableSchema::of(&[("ts", ColumnType::Boolean)]);
        let err = table
            .append(
                &rows(vec![json!({"ts": true})]),
                &incoming,
                AppendOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TableError::SchemaConflict { .. }));
        assert_eq!(table.latest_version().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_transaction_marker_makes_append_idempotent() {
        let dir = TempDir::new().unwrap();
        let table = test_catalog(&dir).await.table("sales_raw").unwrap();
        let options = || AppendOptions {
            transaction: Some(Transaction::new("bronze:sales", 1)),
            ..Default::default()
        };
        let batch = rows(vec![json!({"SaleID": "S1", "ts": 1})]);

        let first = table.append(&batch, &raw_schema(), options()).await.unwrap();
        let second = table.append(&batch, &raw_schema(), options()).await.unwrap();

        assert!(matches!(first, AppendOutcome::Committed(_)));
        assert_eq!(second, AppendOutcome::AlreadyApplied { committed: 1 });
        assert_eq!(table.read_rows().await.unwrap().len(), 1);
        assert_eq!(
            table.transaction_version("bronze:sales").await.unwrap(),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_empty_append_without_marker_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let table = test_catalog(&dir).await.table("sales_raw").unwrap();
        let outcome = table
            .append(&[], &raw_schema(), AppendOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, AppendOutcome::Empty);
        assert!(!table.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_losing_writer_gets_concurrent_commit() {
        let dir = TempDir::new().unwrap();
        let table = test_catalog(&dir).await.table("sales_raw").unwrap();
        table
            .overwrite(&raw_schema(), &rows(vec![json!({"SaleID": "S1", "ts": 1})]))
            .await
            .unwrap();

        let stale = table.snapshot_at(0).await.unwrap();
        let err = table.commit(stale).await.unwrap_err();
        assert!(matches!(err, TableError::ConcurrentCommit { version: 0, .. }));
    }

    #[tokio::test]
    async fn test_stale_hint_is_passed_over() {
        let dir = TempDir::new().unwrap();
        let table = test_catalog(&dir).await.table("sales_raw").unwrap();
        for i in 0..3 {
            table
                .overwrite(&raw_schema(), &rows(vec![json!({"SaleID": format!("S{i}")})]))
                .await
                .unwrap();
        }
        table.write_current_hint(0).await;
        assert_eq!(table.latest_version().await.unwrap(), Some(2));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Location {
        id: String,
        country_code: Option<String>,
    }

    impl TableRecord for Location {
        fn schema() -> TableSchema {
            TableSchema::of(&[("id", ColumnType::String), ("country_code", ColumnType::String)])
        }
    }

    #[tokio::test]
    async fn test_typed_records() {
        let dir = TempDir::new().unwrap();
        let table = test_catalog(&dir).await.table("dim_locations").unwrap();
        let records = vec![
            Location {
                id: "SYD01".into(),
                country_code: Some("AUS".into()),
            },
            Location {
                id: "LON01".into(),
                country_code: None,
            },
        ];

        table.overwrite_records(&records).await.unwrap();
        assert_eq!(table.read_records::<Location>().await.unwrap(), records);
    }
}
