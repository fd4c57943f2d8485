//! Column types and value coercion for table rows.
//!
//! Tables hold a small closed set of column types. Rows travel through the
//! pipeline as JSON objects; every value written to a table is first
//! coerced to its column's type so data files always match the manifest.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;

/// A loosely typed table row.
pub type Row = Map<String, Value>;

/// Column types supported by the table store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Long,
    Double,
    Boolean,
    StringList,
}

impl ColumnType {
    /// Parse a type name as written in schema hints (`long`, `bigint`, `double`, ...).
    pub fn parse_hint(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "varchar" => Some(ColumnType::String),
            "long" | "bigint" | "int" | "integer" | "int64" => Some(ColumnType::Long),
            "double" | "float" | "float64" | "decimal" => Some(ColumnType::Double),
            "boolean" | "bool" => Some(ColumnType::Boolean),
            "array<string>" | "list<string>" => Some(ColumnType::StringList),
            _ => None,
        }
    }

    /// The Arrow type this column is stored as.
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::String => DataType::Utf8,
            ColumnType::Long => DataType::Int64,
            ColumnType::Double => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::StringList => {
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
            }
        }
    }

    /// Infer the narrowest type for a JSON value. Nulls carry no type.
    pub fn of_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(ColumnType::Long),
            Value::Number(_) => Some(ColumnType::Double),
            Value::String(_) | Value::Object(_) => Some(ColumnType::String),
            Value::Array(items) if items.iter().all(|v| v.is_string() || v.is_null()) => {
                Some(ColumnType::StringList)
            }
            Value::Array(_) => Some(ColumnType::String),
        }
    }

    /// Common type for two observations of the same column.
    pub fn unify(self, other: Self) -> Self {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Long, Double) | (Double, Long) => Double,
            _ => String,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Long => "long",
            ColumnType::Double => "double",
            ColumnType::Boolean => "boolean",
            ColumnType::StringList => "array<string>",
        };
        f.write_str(name)
    }
}

/// One named, nullable column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered list of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Build a schema from `(name, type)` pairs.
    pub fn of(columns: &[(&str, ColumnType)]) -> Self {
        Self::new(
            columns
                .iter()
                .map(|(name, ty)| ColumnSpec::new(*name, *ty))
                .collect(),
        )
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnSpec> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Append a column, or unify its type with an existing one.
    pub fn observe(&mut self, name: &str, column_type: ColumnType) {
        match self.column_mut(name) {
            Some(existing) => existing.column_type = existing.column_type.unify(column_type),
            None => self.columns.push(ColumnSpec::new(name, column_type)),
        }
    }

    /// Add a column if it is not already present.
    pub fn ensure(&mut self, name: &str, column_type: ColumnType) {
        if self.column(name).is_none() {
            self.columns.push(ColumnSpec::new(name, column_type));
        }
    }

    /// Infer a schema from rows, in first-seen column order.
    ///
    /// Columns whose values are all null default to `string`.
    pub fn infer(rows: &[Row]) -> Self {
        let mut schema = TableSchema::default();
        let mut seen_null_only: Vec<String> = Vec::new();

        for row in rows {
            for (name, value) in row {
                match ColumnType::of_value(value) {
                    Some(ty) => {
                        seen_null_only.retain(|n| n != name);
                        schema.observe(name, ty);
                    }
                    None => {
                        if schema.column(name).is_none() && !seen_null_only.contains(name) {
                            seen_null_only.push(name.clone());
                        }
                    }
                }
            }
        }

        for name in seen_null_only {
            schema.ensure(&name, ColumnType::String);
        }
        schema
    }

    /// The Arrow schema for data files of this table. All columns are nullable.
    pub fn to_arrow(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(|c| Field::new(&c.name, c.column_type.data_type(), true))
                .collect::<Vec<_>>(),
        ))
    }

    /// Coerce every column of `row` to this schema. Unknown columns are dropped,
    /// missing columns become null.
    pub fn conform(&self, row: &Row) -> Result<Row, CoercionError> {
        let mut out = Row::new();
        for column in &self.columns {
            let value = row.get(&column.name).unwrap_or(&Value::Null);
            let coerced = coerce_value(value, column.column_type).map_err(|mut e| {
                e.column = column.name.clone();
                e
            })?;
            out.insert(column.name.clone(), coerced);
        }
        Ok(out)
    }
}

/// A value that does not fit its column type.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionError {
    pub column: String,
    pub expected: ColumnType,
    pub value: Value,
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value {} in column '{}' is not a valid {}",
            self.value, self.column, self.expected
        )
    }
}

impl std::error::Error for CoercionError {}

/// Coerce a JSON value to a column type.
///
/// - anything can become a `string` (nested values as their JSON text)
/// - numeric strings and integral doubles can become `long`
/// - numbers and numeric strings can become `double`
/// - `true`/`false` strings can become `boolean`
/// - arrays (or JSON text of arrays) of scalars can become `array<string>`
pub fn coerce_value(value: &Value, column_type: ColumnType) -> Result<Value, CoercionError> {
    let fail = || CoercionError {
        column: String::new(),
        expected: column_type,
        value: value.clone(),
    };

    if value.is_null() {
        return Ok(Value::Null);
    }

    match column_type {
        ColumnType::String => Ok(Value::String(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ColumnType::Long => match value {
            Value::Number(n) if n.is_i64() => Ok(value.clone()),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| Value::from(f as i64))
                .ok_or_else(fail),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| fail()),
            _ => Err(fail()),
        },
        ColumnType::Double => {
            let parsed = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(fail)
        }
        ColumnType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(fail()),
        },
        ColumnType::StringList => {
            let items = match value {
                Value::Array(items) => items.clone(),
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(Value::Array(items)) => items,
                    _ => return Err(fail()),
                },
                _ => return Err(fail()),
            };
            items
                .into_iter()
                .map(|item| match item {
                    Value::Null => Ok(Value::Null),
                    Value::String(s) => Ok(Value::String(s)),
                    Value::Array(_) | Value::Object(_) => Err(fail()),
                    scalar => Ok(Value::String(scalar.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
    }
}
