//! CSV parsing with optional type inference.

use serde_json::Value;

use medallion_core::error::{ConfigError, InvalidCsvOptionSnafu};
use medallion_core::metrics::events::FailureStage;
use medallion_core::rescue::RescuedRecord;
use medallion_core::table::{ColumnType, Row, TableSchema, coerce_value};

use super::{FileParser, ParsedFile};
use crate::config::{CsvOptions, single_byte};

pub struct CsvParser {
    header: bool,
    delimiter: u8,
    quote: u8,
    infer_schema: bool,
}

impl CsvParser {
    pub fn new(source_name: &str, options: &CsvOptions) -> Result<Self, ConfigError> {
        let delimiter = single_byte(&options.delimiter).ok_or_else(|| {
            InvalidCsvOptionSnafu {
                source_name,
                option: "delimiter",
            }
            .build()
        })?;
        let quote = single_byte(&options.quote).ok_or_else(|| {
            InvalidCsvOptionSnafu {
                source_name,
                option: "quote",
            }
            .build()
        })?;

        Ok(Self {
            header: options.header,
            delimiter,
            quote,
            infer_schema: options.infer_schema,
        })
    }

    fn column_names(&self, first: &csv::StringRecord) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(first.len());
        for (i, field) in first.iter().enumerate() {
            let name = field.trim();
            let name = if !self.header || name.is_empty() {
                format!("_c{i}")
            } else if names.iter().any(|n| n == name) {
                format!("{name}{i}")
            } else {
                name.to_string()
            };
            names.push(name);
        }
        names
    }
}

/// Narrowest type every non-empty value of a column parses as.
fn infer_column(values: impl Iterator<Item = String>) -> ColumnType {
    let mut candidate: Option<ColumnType> = None;

    for value in values {
        let value = value.trim();
        let observed = if value.parse::<i64>().is_ok() {
            ColumnType::Long
        } else if value.parse::<f64>().is_ok_and(f64::is_finite) {
            ColumnType::Double
        } else if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
            ColumnType::Boolean
        } else {
            return ColumnType::String;
        };
        candidate = Some(match candidate {
            Some(current) => current.unify(observed),
            None => observed,
        });
        if candidate == Some(ColumnType::String) {
            return ColumnType::String;
        }
    }

    candidate.unwrap_or(ColumnType::String)
}

impl FileParser for CsvParser {
    fn parse(&self, source_file: &str, text: &str) -> ParsedFile {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut parsed = ParsedFile::default();

        let mut names: Option<Vec<String>> = None;
        let mut rows: Vec<Row> = Vec::new();
        let mut record = csv::StringRecord::new();

        loop {
            let before = reader.position().byte();
            match reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    let raw = raw_record(text, before, reader.position().byte());
                    let mut rescued = RescuedRecord::new(FailureStage::Parse, e.to_string(), raw)
                        .with_source_file(source_file);
                    if let Some(position) = e.position() {
                        rescued = rescued.with_row_number(position.line());
                    }
                    parsed.rescued.push(rescued);
                    continue;
                }
            }
            let (line, start) = record
                .position()
                .map(|p| (p.line(), p.byte()))
                .unwrap_or((0, before));

            if names.is_none() {
                names = Some(self.column_names(&record));
                if self.header {
                    continue;
                }
            }
            let columns = names.as_deref().unwrap_or_default();

            if record.len() != columns.len() {
                parsed.rescued.push(
                    RescuedRecord::new(
                        FailureStage::Parse,
                        format!("expected {} fields, found {}", columns.len(), record.len()),
                        raw_record(text, start, reader.position().byte()),
                    )
                    .with_source_file(source_file)
                    .with_row_number(line),
                );
                continue;
            }

            rows.push(to_row(columns, &record));
        }

        let names = names.unwrap_or_default();
        let mut schema = TableSchema::default();
        for name in &names {
            let column_type = if self.infer_schema {
                infer_column(
                    rows.iter()
                        .filter_map(|row| row.get(name).and_then(Value::as_str).map(str::to_string)),
                )
            } else {
                ColumnType::String
            };
            schema.ensure(name, column_type);
        }

        if self.infer_schema {
            for row in &mut rows {
                for column in schema.columns() {
                    if column.column_type == ColumnType::String {
                        continue;
                    }
                    if let Some(value) = row.get_mut(&column.name) {
                        *value = coerce_value(value, column.column_type).unwrap_or(Value::Null);
                    }
                }
            }
        }

        parsed.rows = rows;
        parsed.schema = schema;
        parsed
    }
}

/// Source text between two reader offsets, without line terminators.
fn raw_record(text: &str, start: u64, end: u64) -> String {
    let (Ok(start), Ok(end)) = (usize::try_from(start), usize::try_from(end)) else {
        return String::new();
    };
    text.get(start..end)
        .unwrap_or_default()
        .trim_matches(['\r', '\n'])
        .to_string()
}

fn to_row(columns: &[String], record: &csv::StringRecord) -> Row {
    columns
        .iter()
        .zip(record.iter())
        .map(|(name, field)| {
            let value = if field.is_empty() {
                Value::Null
            } else {
                Value::String(field.to_string())
            };
            (name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser(options: CsvOptions) -> CsvParser {
        CsvParser::new("stores", &options).unwrap()
    }

    const STORES: &str = "id,name,city,hq,size\n\
                          SYD01,Sydney CBD,Sydney,true,120\n\
                          AKL01,Auckland,Auckland,false,95.5\n";

    #[test]
    fn test_header_and_inference() {
        let parsed = parser(CsvOptions::default()).parse("stores.csv", STORES);

        assert!(parsed.rescued.is_empty());
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(
            parsed.schema,
            TableSchema::of(&[
                ("id", ColumnType::String),
                ("name", ColumnType::String),
                ("city", ColumnType::String),
                ("hq", ColumnType::Boolean),
                ("size", ColumnType::Double),
            ])
        );
        assert_eq!(parsed.rows[0]["hq"], json!(true));
        assert_eq!(parsed.rows[0]["size"], json!(120.0));
    }

    #[test]
    fn test_without_inference_everything_is_string() {
        let parsed = parser(CsvOptions {
            infer_schema: false,
            ..Default::default()
        })
        .parse("stores.csv", STORES);

        assert!(
            parsed
                .schema
                .columns()
                .iter()
                .all(|c| c.column_type == ColumnType::String)
        );
        assert_eq!(parsed.rows[1]["size"], json!("95.5"));
    }

    #[test]
    fn test_no_header_uses_positional_names() {
        let parsed = parser(CsvOptions {
            header: false,
            ..Default::default()
        })
        .parse("stores.csv", "SYD01,1\nMEL01,2\n");

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0]["_c0"], json!("SYD01"));
        assert_eq!(parsed.rows[1]["_c1"], json!(2));
    }

    #[test]
    fn test_ragged_row_is_rescued() {
        let parsed = parser(CsvOptions::default()).parse(
            "stores.csv",
            "id,city\nSYD01,Sydney\nBROKEN\nMEL01,Melbourne\n",
        );

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rescued.len(), 1);
        assert_eq!(parsed.rescued[0].raw_payload, "BROKEN");
        assert_eq!(parsed.rescued[0].row_number, Some(3));
    }

    #[test]
    fn test_rescued_row_keeps_source_text() {
        let parsed = parser(CsvOptions::default()).parse(
            "stores.csv",
            "id,address\r\nSYD01,\"1 George St, Sydney\",\"extra \"\"quoted\"\" field\"\r\nMEL01,Collins St\r\n",
        );

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rescued.len(), 1);
        assert_eq!(
            parsed.rescued[0].raw_payload,
            "SYD01,\"1 George St, Sydney\",\"extra \"\"quoted\"\" field\""
        );
        assert_eq!(parsed.rescued[0].row_number, Some(2));
    }

    #[test]
    fn test_empty_cells_are_null_and_quotes_respected() {
        let parsed = parser(CsvOptions {
            delimiter: ";".into(),
            quote: "'".into(),
            ..Default::default()
        })
        .parse("stores.csv", "id;address\nSYD01;'1 George St; Sydney'\nMEL01;\n");

        assert_eq!(parsed.rows[0]["address"], json!("1 George St; Sydney"));
        assert_eq!(parsed.rows[1]["address"], Value::Null);
    }

    #[test]
    fn test_mixed_numeric_column_becomes_string() {
        let parsed = parser(CsvOptions::default()).parse("t.csv", "code\n12\nA7\n");
        assert_eq!(
            parsed.schema.column("code").unwrap().column_type,
            ColumnType::String
        );
    }
}
