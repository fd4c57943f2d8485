//! Schema hints for JSON sources.
//!
//! Hints are written the way they are in a DDL column list:
//! `"ts long, exported_ts long, SaleID string"`.

use medallion_core::error::{ConfigError, InvalidSchemaHintSnafu};
use medallion_core::table::ColumnType;

/// Parse a comma-separated list of `name type` pairs.
pub fn parse_schema_hints(hints: &str) -> Result<Vec<(String, ColumnType)>, ConfigError> {
    let mut parsed: Vec<(String, ColumnType)> = Vec::new();

    for entry in hints.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, type_name)) = entry.split_once(char::is_whitespace) else {
            return InvalidSchemaHintSnafu {
                hint: entry,
                reason: "expected '<column> <type>'",
            }
            .fail();
        };

        let Some(column_type) = ColumnType::parse_hint(type_name) else {
            return InvalidSchemaHintSnafu {
                hint: entry,
                reason: format!("unsupported type '{}'", type_name.trim()),
            }
            .fail();
        };

        if parsed.iter().any(|(existing, _)| existing == name) {
            return InvalidSchemaHintSnafu {
                hint: entry,
                reason: format!("column '{name}' is hinted twice"),
            }
            .fail();
        }

        parsed.push((name.to_string(), column_type));
    }

    Ok(parsed)
}
