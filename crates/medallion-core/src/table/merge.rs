//! Key-based upsert into an existing table.
//!
//! Incoming rows are matched to table rows by a key column. A matched row is
//! only rewritten when its comparison column (typically a content hash)
//! differs; data files without any updated row are carried over untouched.
//!
//! A merge may carry a replace scope: table rows belonging to a scoped parent
//! key that have no incoming counterpart are deleted. Child tables use it so
//! that a parent re-exported with fewer children loses the extra ones.

use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::manifest::{DataFile, Manifest, Operation, OperationMetrics};
use super::schema::{Row, TableSchema};
use super::{
    CommitInfo, READ_CONCURRENCY, SchemaEvolutionMode, SchemaPlan, Table, TableRecord, reconcile,
};
use crate::emit;
use crate::error::TableError;
use crate::metrics::events::RowsMerged;

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Column identifying a row.
    pub key: String,
    /// Column whose change marks a matched row as updated.
    pub compare: String,
    pub replace_scope: Option<ReplaceScope>,
}

/// Parent keys whose table rows are fully replaced by the incoming rows.
#[derive(Debug, Clone)]
pub struct ReplaceScope {
    pub column: String,
    pub keys: HashSet<String>,
}

impl MergeOptions {
    pub fn new(key: impl Into<String>, compare: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            compare: compare.into(),
            replace_scope: None,
        }
    }

    /// Delete unmatched table rows whose `column` value is one of `keys`.
    pub fn with_replace_scope(
        mut self,
        column: impl Into<String>,
        keys: impl IntoIterator<Item = String>,
    ) -> Self {
        self.replace_scope = Some(ReplaceScope {
            column: column.into(),
            keys: keys.into_iter().collect(),
        });
        self
    }

    fn in_scope(&self, row: &Row) -> bool {
        self.replace_scope.as_ref().is_some_and(|scope| {
            key_of(row, &scope.column).is_some_and(|key| scope.keys.contains(&key))
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deleted: u64,
}

impl MergeStats {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Result of [`Table::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Committed { info: CommitInfo, stats: MergeStats },
    /// Every incoming row matched an identical table row and nothing was
    /// deleted; no version was written.
    Unchanged(MergeStats),
}

impl MergeOutcome {
    pub fn stats(&self) -> MergeStats {
        match self {
            MergeOutcome::Committed { stats, .. } => *stats,
            MergeOutcome::Unchanged(stats) => *stats,
        }
    }
}

fn key_of(row: &Row, key: &str) -> Option<String> {
    match row.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

impl Table {
    /// Upsert `rows` by `options.key`.
    ///
    /// Rows whose key is absent from the table are inserted; rows whose key
    /// exists are replaced only if `options.compare` differs. Table rows with
    /// no incoming counterpart are kept unless they fall in the replace scope.
    /// When nothing changes no version is committed.
    pub async fn merge(
        &self,
        schema: &TableSchema,
        rows: &[Row],
        options: &MergeOptions,
    ) -> Result<MergeOutcome, TableError> {
        let current = self.try_snapshot().await?;

        let plan = match &current {
            Some(manifest) => {
                reconcile(self.name(), &manifest.schema, schema, SchemaEvolutionMode::Merge)?
            }
            None => SchemaPlan {
                merged: schema.clone(),
                added: Vec::new(),
                widened: Vec::new(),
            },
        };

        let incoming = rows
            .iter()
            .map(|row| self.conform(&plan.merged, row))
            .collect::<Result<Vec<_>, _>>()?;

        // Last occurrence of a key wins
        let mut pending: HashMap<String, usize> = HashMap::new();
        for (index, row) in incoming.iter().enumerate() {
            if let Some(key) = key_of(row, &options.key) {
                pending.insert(key, index);
            }
        }
        let mut changed = vec![true; incoming.len()];
        for (index, row) in incoming.iter().enumerate() {
            if let Some(key) = key_of(row, &options.key)
                && pending.get(&key) != Some(&index)
            {
                changed[index] = false;
            }
        }

        let mut stats = MergeStats::default();
        let mut files: Vec<DataFile> = Vec::new();
        let mut rewrites: Vec<(usize, Vec<Row>)> = Vec::new();
        let version = current.as_ref().map_or(0, |m| m.version + 1);

        if let Some(manifest) = &current {
            let contents: Vec<Vec<Row>> = futures::stream::iter(manifest.files.iter())
                .map(|file| self.read_data_file(file))
                .buffered(READ_CONCURRENCY)
                .try_collect()
                .await?;

            for (file, rows) in manifest.files.iter().zip(contents) {
                let mut kept = Vec::with_capacity(rows.len());
                let mut touched = false;

                for row in rows {
                    let row = self.conform(&plan.merged, &row)?;
                    let matched = key_of(&row, &options.key)
                        .and_then(|key| pending.remove(&key));

                    match matched {
                        Some(index)
                            if incoming[index].get(&options.compare)
                                == row.get(&options.compare) =>
                        {
                            stats.unchanged += 1;
                            changed[index] = false;
                            kept.push(row);
                        }
                        Some(_) => {
                            stats.updated += 1;
                            touched = true;
                        }
                        None if options.in_scope(&row) => {
                            stats.deleted += 1;
                            touched = true;
                        }
                        None => kept.push(row),
                    }
                }

                if touched {
                    rewrites.push((files.len(), kept));
                }
                files.push(file.clone());
            }
        }

        stats.inserted = changed.iter().filter(|c| **c).count() as u64 - stats.updated;

        emit!(RowsMerged {
            inserted: stats.inserted,
            updated: stats.updated,
            unchanged: stats.unchanged,
            deleted: stats.deleted,
            table: self.name().to_string(),
        });

        if stats.is_noop() && plan.is_unchanged() && current.is_some() {
            debug!(table = %self.name(), unchanged = stats.unchanged, "Merge changed nothing");
            return Ok(MergeOutcome::Unchanged(stats));
        }

        // Copy-on-write: files holding an updated or deleted row are replaced by a copy without it
        let mut removed = Vec::new();
        for (position, kept) in rewrites.into_iter().rev() {
            if kept.is_empty() {
                removed.push(files.remove(position));
            } else {
                files[position] = self.write_data_file(version, &plan.merged, &kept).await?;
            }
        }
        debug!(table = %self.name(), dropped_files = removed.len(), "Rewrote merged files");

        let changed_rows: Vec<Row> = incoming
            .into_iter()
            .zip(changed)
            .filter_map(|(row, changed)| changed.then_some(row))
            .collect();
        if !changed_rows.is_empty() {
            files.push(
                self.write_data_file(version, &plan.merged, &changed_rows)
                    .await?,
            );
        }

        let transactions = current
            .map(|manifest| manifest.transactions)
            .unwrap_or_default();

        let manifest = Manifest {
            version,
            operation: Operation::Merge,
            committed_at: Utc::now(),
            schema: plan.merged,
            files,
            transactions,
            metrics: OperationMetrics {
                rows_added: stats.inserted,
                rows_updated: stats.updated,
                rows_removed: stats.deleted,
                columns_added: plan.added,
                columns_widened: plan.widened,
                ..Default::default()
            },
        };
        let info = self.commit(manifest).await?;
        Ok(MergeOutcome::Committed { info, stats })
    }

    /// Upsert typed records. See [`Table::merge`].
    pub async fn merge_records<T>(
        &self,
        records: &[T],
        options: &MergeOptions,
    ) -> Result<MergeOutcome, TableError>
    where
        T: TableRecord + Serialize,
    {
        let rows = records
            .iter()
            .map(|record| self.record_to_row(record))
            .collect::<Result<Vec<_>, _>>()?;
        self.merge(&T::schema(), &rows, options).await
    }
}
