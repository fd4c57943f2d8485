//! JSON parsing: newline-delimited objects or a single top-level array.

use serde_json::Value;

use medallion_core::metrics::events::FailureStage;
use medallion_core::rescue::RescuedRecord;
use medallion_core::table::{ColumnType, Row, TableSchema, coerce_value};

use super::{FileParser, ParsedFile};
use crate::config::{JsonOptions, parse_schema_hints};
use crate::error::ConfigError;

pub struct JsonParser {
    hints: Vec<(String, ColumnType)>,
    infer_column_types: bool,
}

impl JsonParser {
    pub fn new(options: &JsonOptions) -> Result<Self, ConfigError> {
        let hints = match &options.schema_hints {
            Some(hints) => parse_schema_hints(hints)?,
            None => Vec::new(),
        };
        Ok(Self {
            hints,
            infer_column_types: options.infer_column_types,
        })
    }

    fn hint(&self, name: &str) -> Option<ColumnType> {
        self.hints
            .iter()
            .find(|(hinted, _)| hinted == name)
            .map(|(_, column_type)| *column_type)
    }

    fn accept(
        &self,
        parsed: &mut ParsedFile,
        source_file: &str,
        row_number: u64,
        value: Value,
        raw: &str,
    ) {
        let Value::Object(object) = value else {
            parsed.rescued.push(
                RescuedRecord::new(FailureStage::Parse, "expected a JSON object", raw)
                    .with_source_file(source_file)
                    .with_row_number(row_number),
            );
            return;
        };

        let mut row = Row::new();
        for (name, value) in object {
            let value = match self.hint(&name) {
                Some(column_type) => match coerce_value(&value, column_type) {
                    Ok(coerced) => coerced,
                    Err(e) => {
                        parsed.rescued.push(
                            RescuedRecord::new(FailureStage::Coerce, e.to_string(), raw)
                                .with_source_file(source_file)
                                .with_row_number(row_number)
                                .with_field(name.as_str()),
                        );
                        Value::Null
                    }
                },
                None if self.infer_column_types => match value {
                    Value::Object(_) => Value::String(value.to_string()),
                    Value::Array(_) if ColumnType::of_value(&value) != Some(ColumnType::StringList) => {
                        Value::String(value.to_string())
                    }
                    other => other,
                },
                // Everything unhinted lands as text, nested values as their JSON
                None => coerce_value(&value, ColumnType::String).unwrap_or(Value::Null),
            };
            row.insert(name, value);
        }
        parsed.rows.push(row);
    }

    fn schema_for(&self, rows: &[Row]) -> TableSchema {
        let mut schema = TableSchema::infer(rows);
        for (name, column_type) in &self.hints {
            match schema.column_mut(name) {
                Some(column) => column.column_type = *column_type,
                None => schema.ensure(name, *column_type),
            }
        }
        schema
    }
}

impl FileParser for JsonParser {
    fn parse(&self, source_file: &str, text: &str) -> ParsedFile {
        let mut parsed = ParsedFile::default();

        if text.trim_start().starts_with('[') {
            match serde_json::from_str::<Vec<Value>>(text) {
                Ok(values) => {
                    for (index, value) in values.into_iter().enumerate() {
                        let raw = value.to_string();
                        self.accept(&mut parsed, source_file, index as u64 + 1, value, &raw);
                    }
                }
                Err(e) => parsed.rescued.push(
                    RescuedRecord::new(FailureStage::Parse, e.to_string(), text)
                        .with_source_file(source_file),
                ),
            }
        } else {
            for (index, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let row_number = index as u64 + 1;
                match serde_json::from_str::<Value>(line) {
                    Ok(value) => self.accept(&mut parsed, source_file, row_number, value, line),
                    Err(e) => parsed.rescued.push(
                        RescuedRecord::new(FailureStage::Parse, e.to_string(), line)
                            .with_source_file(source_file)
                            .with_row_number(row_number),
                    ),
                }
            }
        }

        parsed.schema = self.schema_for(&parsed.rows);
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser(schema_hints: Option<&str>, infer_column_types: bool) -> JsonParser {
        JsonParser::new(&JsonOptions {
            schema_hints: schema_hints.map(str::to_string),
            infer_column_types,
        })
        .unwrap()
    }

    #[test]
    fn test_ndjson_defaults_to_strings() {
        let text = r#"{"id": "S1", "amount": 12.5, "items": "[{\"sku\":1}]"}
{"id": "S2", "amount": 3, "meta": {"k": 1}}
"#;
        let parsed = parser(None, false).parse("sales-1.json", text);

        assert!(parsed.rescued.is_empty());
        assert_eq!(parsed.rows[0]["amount"], json!("12.5"));
        assert_eq!(parsed.rows[1]["meta"], json!(r#"{"k":1}"#));
        assert!(
            parsed
                .schema
                .columns()
                .iter()
                .all(|c| c.column_type == ColumnType::String)
        );
    }

    #[test]
    fn test_array_document() {
        let parsed = parser(None, true).parse(
            "sales-1.json",
            r#"  [{"id": "S1", "qty": 2}, {"id": "S2", "qty": 3.5}]"#,
        );

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(
            parsed.schema.column("qty").unwrap().column_type,
            ColumnType::Double
        );
    }

    #[test]
    fn test_hints_coerce_and_rescue_bad_fields() {
        let text = "{\"id\": \"S1\", \"exported_ts\": \"1633046400.5\"}\n\
                    {\"id\": \"S2\", \"exported_ts\": \"yesterday\"}\n";
        let parsed = parser(Some("exported_ts double, store_id string"), false)
            .parse("sales-1.json", text);

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0]["exported_ts"], json!(1633046400.5));
        assert_eq!(parsed.rows[1]["exported_ts"], Value::Null);

        assert_eq!(parsed.rescued.len(), 1);
        let rescued = &parsed.rescued[0];
        assert_eq!(rescued.stage, FailureStage::Coerce);
        assert_eq!(rescued.field.as_deref(), Some("exported_ts"));
        assert_eq!(rescued.row_number, Some(2));

        // Hinted columns exist even when no row carries them
        assert_eq!(
            parsed.schema.column("store_id").unwrap().column_type,
            ColumnType::String
        );
        assert_eq!(
            parsed.schema.column("exported_ts").unwrap().column_type,
            ColumnType::Double
        );
    }

    #[test]
    fn test_malformed_lines_and_non_objects_are_rescued() {
        let text = "{\"id\": \"S1\"}\n{\"id\": \n\n[1, 2]\n{\"id\": \"S2\"}\n";
        let parsed = parser(None, false).parse("sales-1.json", text);

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rescued.len(), 2);
        assert!(parsed.rescued.iter().all(|r| r.stage == FailureStage::Parse));
        assert_eq!(parsed.rescued[0].raw_payload, "{\"id\": ");
        assert_eq!(parsed.rescued[1].row_number, Some(4));
    }

    #[test]
    fn test_broken_array_document_is_one_rescue() {
        let parsed = parser(None, false).parse("sales-1.json", "[{\"id\": \"S1\"},");
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.rescued.len(), 1);
        assert_eq!(parsed.rescued[0].row_number, None);
    }
}
