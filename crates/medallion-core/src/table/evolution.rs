//! Schema evolution for appends.
//!
//! Compares an incoming batch schema with the committed table schema and
//! decides what the table schema becomes after the append.

use serde::{Deserialize, Serialize};

use super::schema::{ColumnType, TableSchema};
use crate::error::{SchemaChangeRejectedSnafu, SchemaConflictSnafu, TableError};

/// Schema evolution mode determining how schema changes are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaEvolutionMode {
    /// Reject new columns and table type changes.
    Strict,
    /// Add new nullable columns and widen `long` columns to `double` (default).
    #[default]
    Merge,
}

/// Outcome of reconciling an incoming schema with a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    /// Schema the table has after the append; incoming rows are conformed to it.
    pub merged: TableSchema,
    /// Columns added to the table.
    pub added: Vec<String>,
    /// Table columns widened from `long` to `double`.
    pub widened: Vec<String>,
}

impl SchemaPlan {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.widened.is_empty()
    }
}

/// How a single incoming column relates to the table column of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnChange {
    /// Same type, or incoming values can be cast into the table type.
    Compatible,
    /// The table column must widen to the incoming type.
    Widen,
    /// No safe conversion exists.
    Conflict,
}

fn classify(table: ColumnType, incoming: ColumnType) -> ColumnChange {
    use ColumnType::*;
    match (table, incoming) {
        (a, b) if a == b => ColumnChange::Compatible,
        (Double, Long) => ColumnChange::Compatible,
        (String, Long | Double | Boolean) => ColumnChange::Compatible,
        (Long, Double) => ColumnChange::Widen,
        _ => ColumnChange::Conflict,
    }
}

/// Reconcile `incoming` against the committed `table` schema.
///
/// - identical types pass; `long` into `double` and scalars into `string` are cast
/// - `double` into a `long` column widens the table column (merge mode only)
/// - any other type difference is a fatal [`TableError::SchemaConflict`]
/// - new columns are appended in merge mode and rejected in strict mode
///
/// Columns missing from the incoming batch are kept and read back as null.
pub fn reconcile(
    table_name: &str,
    table: &TableSchema,
    incoming: &TableSchema,
    mode: SchemaEvolutionMode,
) -> Result<SchemaPlan, TableError> {
    let mut merged = table.clone();
    let mut added = Vec::new();
    let mut widened = Vec::new();

    for column in incoming.columns() {
        let Some(existing) = table.column(&column.name) else {
            added.push(column.name.clone());
            merged.ensure(&column.name, column.column_type);
            continue;
        };

        match classify(existing.column_type, column.column_type) {
            ColumnChange::Compatible => {}
            ColumnChange::Widen => {
                widened.push(column.name.clone());
                if let Some(spec) = merged.column_mut(&column.name) {
                    spec.column_type = column.column_type;
                }
            }
            ColumnChange::Conflict => {
                return SchemaConflictSnafu {
                    table: table_name,
                    column: column.name.clone(),
                    existing: existing.column_type.to_string(),
                    incoming: column.column_type.to_string(),
                }
                .fail();
            }
        }
    }

    if mode == SchemaEvolutionMode::Strict && !(added.is_empty() && widened.is_empty()) {
        let mut changes: Vec<String> = added.iter().map(|c| format!("new column '{c}'")).collect();
        changes.extend(widened.iter().map(|c| format!("widening '{c}' to double")));
        return SchemaChangeRejectedSnafu {
            table: table_name,
            message: changes.join(", "),
        }
        .fail();
    }

    Ok(SchemaPlan {
        merged,
        added,
        widened,
    })
}
