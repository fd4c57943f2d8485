//! Configuration for the bronze loader.
//!
//! # Example
//!
//! ```yaml
//! warehouse:
//!   uri: s3://lake/warehouse
//!
//! sources:
//!   stores:
//!     path: s3://landing/exports/stores.csv
//!     format:
//!       type: csv
//!     table: stores
//!     mode: overwrite
//!   sales:
//!     path: s3://landing/sales_stream
//!     format:
//!       type: json
//!       schema_hints: "ts long, exported_ts long, SaleID string"
//!     table: sales_raw
//!     mode: continuous
//!     poll_interval_secs: 30
//!
//! error_handling:
//!   max_failures: 10
//! ```

mod hints;

use clap::Parser;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::collections::HashMap;

pub use hints::parse_schema_hints;
pub use medallion_core::config::{
    ConfigArgs, ConfigPath, ErrorHandlingConfig, Mergeable, MetricsConfig, WarehouseConfig,
    load_from_paths, merge_components,
};
use medallion_core::error::{
    ConfigError, EmptySourcePathSnafu, EmptyWarehouseSnafu, InvalidCsvOptionSnafu,
    InvalidTableNameConfigSnafu,
};
use medallion_core::table::SchemaEvolutionMode;

/// Command-line arguments for the `bronze` binary.
#[derive(Parser, Debug)]
#[command(name = "bronze")]
#[command(about = "Load raw CSV and JSON files into bronze tables")]
#[command(version)]
pub struct CliArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Process everything currently available for continuous sources, then exit
    #[arg(long)]
    pub once: bool,
}

impl CliArgs {
    pub fn config_paths(&self) -> Vec<ConfigPath> {
        self.config.config_paths()
    }
}

/// How a source is loaded into its table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Read every file and replace the table content.
    Overwrite,
    /// Ingest files not seen before, then stop.
    #[default]
    Incremental,
    /// Poll for new files until shut down.
    Continuous,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Overwrite => "overwrite",
            SourceMode::Incremental => "incremental",
            SourceMode::Continuous => "continuous",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_quote() -> String {
    "\"".to_string()
}

/// CSV reader options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvOptions {
    /// First line holds column names. Without a header columns are `_c0`, `_c1`, ...
    #[serde(default = "default_true")]
    pub header: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_quote")]
    pub quote: String,
    /// Type columns as long/double/boolean when every value allows it.
    #[serde(default = "default_true")]
    pub infer_schema: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            header: true,
            delimiter: default_delimiter(),
            quote: default_quote(),
            infer_schema: true,
        }
    }
}

/// JSON reader options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonOptions {
    /// Forced column types, e.g. `"ts long, exported_ts long"`.
    #[serde(default)]
    pub schema_hints: Option<String>,
    /// Keep JSON numbers and booleans typed. Off by default: unhinted
    /// columns are stored as strings so later files cannot conflict.
    #[serde(default)]
    pub infer_column_types: bool,
}

/// Format of the files in a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceFormat {
    Csv(CsvOptions),
    Json(JsonOptions),
}

impl SourceFormat {
    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Csv(_) => "csv",
            SourceFormat::Json(_) => "json",
        }
    }

    /// File extensions picked up during discovery.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceFormat::Csv(_) => &["csv"],
            SourceFormat::Json(_) => &["json", "jsonl", "ndjson"],
        }
    }
}

fn default_max_files_per_batch() -> usize {
    1000
}

fn default_poll_interval() -> u64 {
    10
}

/// Configuration for one source directory or file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Directory (or, in overwrite mode, a single file) to read.
    pub path: String,
    pub format: SourceFormat,
    /// Target table name in the warehouse.
    pub table: String,
    #[serde(default)]
    pub mode: SourceMode,
    /// Upper bound on files per micro-batch.
    #[serde(default = "default_max_files_per_batch")]
    pub max_files_per_batch: usize,
    /// Poll interval in seconds for continuous sources.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum random jitter added to each poll interval.
    #[serde(default)]
    pub poll_jitter_secs: u64,
    /// Schema evolution mode: "merge" (default) or "strict".
    #[serde(default)]
    pub schema_evolution: SchemaEvolutionMode,
    /// Storage options for the source location (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

/// Main configuration for the bronze loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    /// Named sources.
    #[serde(default)]
    pub sources: IndexMap<String, SourceConfig>,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Mergeable for Config {
    fn parse_yaml(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::YamlParse { source })
    }

    fn merge(&mut self, other: Self) -> Result<(), ConfigError> {
        merge_components(&mut self.sources, other.sources)?;
        if !other.warehouse.uri.is_empty() {
            self.warehouse = other.warehouse;
        }
        self.error_handling.merge_from(other.error_handling);
        self.metrics.merge_from(other.metrics);
        Ok(())
    }
}

impl Config {
    /// Load configuration from multiple paths (files or directories).
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config: Self = load_from_paths(paths)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_yaml(&medallion_core::config::interpolate(contents)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.warehouse.uri.is_empty(), EmptyWarehouseSnafu);

        for (name, source) in &self.sources {
            ensure!(
                !source.path.is_empty(),
                EmptySourcePathSnafu { source_name: name }
            );

            let valid_table = !source.table.is_empty()
                && source
                    .table
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            ensure!(
                valid_table,
                InvalidTableNameConfigSnafu { name: &source.table }
            );

            match &source.format {
                SourceFormat::Csv(csv) => {
                    ensure!(
                        single_byte(&csv.delimiter).is_some(),
                        InvalidCsvOptionSnafu {
                            source_name: name,
                            option: "delimiter"
                        }
                    );
                    ensure!(
                        single_byte(&csv.quote).is_some(),
                        InvalidCsvOptionSnafu {
                            source_name: name,
                            option: "quote"
                        }
                    );
                }
                SourceFormat::Json(json) => {
                    if let Some(hints) = &json.schema_hints {
                        parse_schema_hints(hints)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

/// The byte of a one-character ASCII option.
pub fn single_byte(option: &str) -> Option<u8> {
    match option.as_bytes() {
        [byte] if byte.is_ascii() => Some(*byte),
        _ => None,
    }
}
