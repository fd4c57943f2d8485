//! Conversion between rows, Arrow record batches and Parquet bytes.

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanBuilder, Float64Builder, Int64Builder, ListBuilder,
    RecordBatch, StringBuilder,
};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde_json::{Number, Value};
use snafu::prelude::*;
use std::sync::Arc;

use super::schema::{ColumnType, Row, TableSchema};
use crate::config::ParquetCompression;
use crate::error::{
    ArrowSnafu, ParquetSnafu, TableError, UnsupportedTypeSnafu, ValueMismatchSnafu,
};

/// Rows per Arrow batch / Parquet row group.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Build a record batch from rows already conformed to `schema`.
pub fn rows_to_batch(
    table: &str,
    schema: &TableSchema,
    rows: &[Row],
) -> Result<RecordBatch, TableError> {
    let columns = schema
        .columns()
        .iter()
        .map(|column| build_column(table, &column.name, column.column_type, rows))
        .collect::<Result<Vec<ArrayRef>, _>>()?;

    RecordBatch::try_new(schema.to_arrow(), columns).context(ArrowSnafu { table })
}

fn mismatch(table: &str, column: &str, value: &Value, expected: ColumnType) -> TableError {
    ValueMismatchSnafu {
        table,
        column,
        message: format!("expected {expected}, got {value}"),
    }
    .build()
}

fn build_column(
    table: &str,
    name: &str,
    column_type: ColumnType,
    rows: &[Row],
) -> Result<ArrayRef, TableError> {
    let values = rows.iter().map(|row| row.get(name).unwrap_or(&Value::Null));

    let array: ArrayRef = match column_type {
        ColumnType::String => {
            let mut builder = StringBuilder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::String(s) => builder.append_value(s),
                    other => return Err(mismatch(table, name, other, column_type)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Long => {
            let mut builder = Int64Builder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Number(n) if n.is_i64() => builder.append_option(n.as_i64()),
                    other => return Err(mismatch(table, name, other, column_type)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Double => {
            let mut builder = Float64Builder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Number(n) => builder.append_option(n.as_f64()),
                    other => return Err(mismatch(table, name, other, column_type)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Boolean => {
            let mut builder = BooleanBuilder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(*b),
                    other => return Err(mismatch(table, name, other, column_type)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::StringList => {
            let mut builder = ListBuilder::new(StringBuilder::new());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Array(items) => {
                        for item in items {
                            match item {
                                Value::Null => builder.values().append_null(),
                                Value::String(s) => builder.values().append_value(s),
                                other => return Err(mismatch(table, name, other, column_type)),
                            }
                        }
                        builder.append(true);
                    }
                    other => return Err(mismatch(table, name, other, column_type)),
                }
            }
            Arc::new(builder.finish())
        }
    };

    Ok(array)
}

/// Convert a record batch back into rows.
pub fn batch_to_rows(table: &str, batch: &RecordBatch) -> Result<Vec<Row>, TableError> {
    let schema = batch.schema();
    let mut rows: Vec<Row> = (0..batch.num_rows()).map(|_| Row::new()).collect();

    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let values = column_values(table, array)?;
        for (row, value) in rows.iter_mut().zip(values) {
            row.insert(field.name().clone(), value);
        }
    }

    Ok(rows)
}

fn column_values(table: &str, array: &ArrayRef) -> Result<Vec<Value>, TableError> {
    let len = array.len();
    let values = match array.data_type() {
        DataType::Utf8 => {
            let strings = array.as_string::<i32>();
            (0..len)
                .map(|i| {
                    if strings.is_null(i) {
                        Value::Null
                    } else {
                        Value::String(strings.value(i).to_string())
                    }
                })
                .collect()
        }
        DataType::Int64 => {
            let longs = array.as_primitive::<Int64Type>();
            (0..len)
                .map(|i| {
                    if longs.is_null(i) {
                        Value::Null
                    } else {
                        Value::from(longs.value(i))
                    }
                })
                .collect()
        }
        DataType::Float64 => {
            let doubles = array.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| {
                    if doubles.is_null(i) {
                        Value::Null
                    } else {
                        Number::from_f64(doubles.value(i))
                            .map(Value::Number)
                            .unwrap_or(Value::Null)
                    }
                })
                .collect()
        }
        DataType::Boolean => {
            let bools = array.as_boolean();
            (0..len)
                .map(|i| {
                    if bools.is_null(i) {
                        Value::Null
                    } else {
                        Value::Bool(bools.value(i))
                    }
                })
                .collect()
        }
        DataType::List(_) => {
            let lists = array.as_list::<i32>();
            let mut out = Vec::with_capacity(len);
            for i in 0..len {
                if lists.is_null(i) {
                    out.push(Value::Null);
                    continue;
                }
                out.push(Value::Array(column_values(table, &lists.value(i))?));
            }
            out
        }
        other => {
            return UnsupportedTypeSnafu {
                table,
                data_type: other.to_string(),
            }
            .fail();
        }
    };

    Ok(values)
}

fn writer_properties(compression: ParquetCompression) -> WriterProperties {
    let compression = match compression {
        ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
        ParquetCompression::Snappy => Compression::SNAPPY,
        ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
        ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
        ParquetCompression::Lz4 => Compression::LZ4_RAW,
    };

    WriterProperties::builder()
        .set_compression(compression)
        .set_max_row_group_size(DEFAULT_BATCH_SIZE)
        .build()
}

/// Encode rows as one Parquet file.
pub fn encode_parquet(
    table: &str,
    schema: &TableSchema,
    rows: &[Row],
    compression: ParquetCompression,
) -> Result<Vec<u8>, TableError> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(
        &mut buffer,
        schema.to_arrow(),
        Some(writer_properties(compression)),
    )
    .context(ParquetSnafu { table })?;

    for chunk in rows.chunks(DEFAULT_BATCH_SIZE) {
        let batch = rows_to_batch(table, schema, chunk)?;
        writer.write(&batch).context(ParquetSnafu { table })?;
    }

    writer.close().context(ParquetSnafu { table })?;
    Ok(buffer)
}

/// Decode a Parquet file into rows.
pub fn decode_parquet(table: &str, bytes: Bytes) -> Result<Vec<Row>, TableError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .context(ParquetSnafu { table })?
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build()
        .context(ParquetSnafu { table })?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.context(ArrowSnafu { table })?;
        rows.extend(batch_to_rows(table, &batch)?);
    }
    Ok(rows)
}
