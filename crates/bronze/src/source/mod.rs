//! Source files: discovery, decoding and format parsing.
//!
//! A file moves through three stages before its rows reach a table:
//! `read` (fetch bytes), `decode` (UTF-8 text) and `parse` (format-specific
//! rows, with per-row and per-field rescue). Failures of the first two
//! stages reject the whole file; parse failures only reject rows.

mod csv;
mod json;
mod listing;

pub use self::csv::CsvParser;
pub use self::json::JsonParser;
pub use listing::{SourceLocation, is_candidate, list_candidates, list_pending_files};

use chrono::{DateTime, SecondsFormat, Utc};
use object_store::path::Path;
use serde_json::Value;

use medallion_core::metrics::events::FailureStage;
use medallion_core::rescue::RescuedRecord;
use medallion_core::storage::StorageProvider;
use medallion_core::table::{ColumnType, Row, TableSchema};

use crate::config::SourceFormat;
use crate::error::ConfigError;

/// Column holding the URL of the file a row came from.
pub const SOURCE_FILE_COLUMN: &str = "source_file";
/// Column holding the time a row was loaded.
pub const INGESTED_AT_COLUMN: &str = "ingested_at";

/// Longest raw payload kept for a whole-file rescue.
const MAX_FILE_PAYLOAD: usize = 64 * 1024;

/// Rows parsed from one file along with everything that was rejected.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub rows: Vec<Row>,
    pub schema: TableSchema,
    pub rescued: Vec<RescuedRecord>,
}

/// Parser for one source format.
pub trait FileParser: Send + Sync {
    /// Parse decoded file contents. Never fails as a whole: rows that cannot
    /// be parsed are returned in [`ParsedFile::rescued`].
    fn parse(&self, source_file: &str, text: &str) -> ParsedFile;
}

/// Build the parser for a source's configured format.
pub fn parser_for(
    source_name: &str,
    format: &SourceFormat,
) -> Result<Box<dyn FileParser>, ConfigError> {
    Ok(match format {
        SourceFormat::Csv(options) => Box::new(CsvParser::new(source_name, options)?),
        SourceFormat::Json(options) => Box::new(JsonParser::new(options)?),
    })
}

/// A file rejected before parsing.
#[derive(Debug)]
pub struct FileFailure {
    pub stage: FailureStage,
    pub reason: String,
    pub raw_payload: String,
}

impl FileFailure {
    pub fn into_record(self, source_file: &str) -> RescuedRecord {
        RescuedRecord::new(self.stage, self.reason, self.raw_payload).with_source_file(source_file)
    }
}

fn truncate_payload(mut payload: String) -> String {
    if payload.len() > MAX_FILE_PAYLOAD {
        let mut end = MAX_FILE_PAYLOAD;
        while !payload.is_char_boundary(end) {
            end -= 1;
        }
        payload.truncate(end);
    }
    payload
}

/// Turn raw file bytes into text. A leading byte-order mark is dropped.
pub fn decode(bytes: &[u8]) -> Result<&str, FileFailure> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.strip_prefix('\u{feff}').unwrap_or(text)),
        Err(e) => Err(FileFailure {
            stage: FailureStage::Decode,
            reason: e.to_string(),
            raw_payload: truncate_payload(String::from_utf8_lossy(bytes).into_owned()),
        }),
    }
}

/// URL identifying `relative` under the source root.
pub fn source_file_url(storage: &StorageProvider, relative: &str) -> String {
    format!("{}/{}", storage.canonical_url().trim_end_matches('/'), relative)
}

/// Fetch, decode and parse one file.
pub async fn read_source_file(
    storage: &StorageProvider,
    relative: &str,
    parser: &dyn FileParser,
) -> Result<ParsedFile, FileFailure> {
    let bytes = storage
        .get(&Path::from(relative))
        .await
        .map_err(|e| FileFailure {
            stage: FailureStage::Read,
            reason: e.to_string(),
            raw_payload: String::new(),
        })?;
    let text = decode(&bytes)?;
    Ok(parser.parse(&source_file_url(storage, relative), text))
}

/// Stamp every row with where and when it was loaded.
pub fn add_provenance(parsed: &mut ParsedFile, source_file: &str, ingested_at: DateTime<Utc>) {
    let ingested_at = ingested_at.to_rfc3339_opts(SecondsFormat::Micros, true);
    for row in &mut parsed.rows {
        row.insert(
            SOURCE_FILE_COLUMN.to_string(),
            Value::String(source_file.to_string()),
        );
        row.insert(
            INGESTED_AT_COLUMN.to_string(),
            Value::String(ingested_at.clone()),
        );
    }
    parsed.schema.ensure(SOURCE_FILE_COLUMN, ColumnType::String);
    parsed.schema.ensure(INGESTED_AT_COLUMN, ColumnType::String);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonOptions;
    use tempfile::TempDir;

    #[test]
    fn test_decode_strips_bom() {
        assert_eq!(decode("\u{feff}id,city\n".as_bytes()).unwrap(), "id,city\n");
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let failure = decode(&[b'{', 0xff, 0xfe, b'}']).unwrap_err();
        assert_eq!(failure.stage, FailureStage::Decode);
        assert!(failure.raw_payload.starts_with('{'));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_read_failure() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageProvider::for_url(temp_dir.path().to_str().unwrap())
            .await
            .unwrap();
        let parser = parser_for("sales", &SourceFormat::Json(JsonOptions::default())).unwrap();

        let failure = read_source_file(&storage, "missing.json", parser.as_ref())
            .await
            .unwrap_err();
        assert_eq!(failure.stage, FailureStage::Read);
    }

    #[tokio::test]
    async fn test_provenance_columns() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.json"), "{\"id\": \"S1\"}\n").unwrap();
        let storage = StorageProvider::for_url(temp_dir.path().to_str().unwrap())
            .await
            .unwrap();
        let parser = parser_for("sales", &SourceFormat::Json(JsonOptions::default())).unwrap();

        let mut parsed = read_source_file(&storage, "a.json", parser.as_ref())
            .await
            .unwrap();
        let url = source_file_url(&storage, "a.json");
        add_provenance(&mut parsed, &url, Utc::now());

        assert!(url.ends_with("/a.json"));
        assert_eq!(parsed.rows[0][SOURCE_FILE_COLUMN], Value::String(url));
        assert!(
            parsed.rows[0][INGESTED_AT_COLUMN]
                .as_str()
                .unwrap()
                .ends_with('Z')
        );
        assert_eq!(
            parsed.schema.column(INGESTED_AT_COLUMN).unwrap().column_type,
            ColumnType::String
        );
    }
}
