//! Common configuration types shared between the bronze loader and the refinery.

mod loader;
mod path;
mod vars;

pub use loader::{Mergeable, load_file, load_from_paths, merge_components};
pub use path::{ConfigArgs, ConfigPath, is_yaml_file};
pub use vars::{interpolate, interpolate_with};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::metrics::DEFAULT_METRICS_ADDR;

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether to serve `/metrics` at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_metrics_address(),
        }
    }
}

impl MetricsConfig {
    /// Merge values from another MetricsConfig (non-default values win).
    pub fn merge_from(&mut self, other: Self) {
        if other.address != default_metrics_address() {
            self.address = other.address;
        }
        if !other.enabled {
            self.enabled = false;
        }
    }
}

fn default_metrics_address() -> String {
    DEFAULT_METRICS_ADDR.to_string()
}

fn default_true() -> bool {
    true
}

/// Error handling configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ErrorHandlingConfig {
    /// Maximum file failures before stopping a source (0 = unlimited, default: 0).
    #[serde(default)]
    pub max_failures: usize,
    /// Where rescued rows are written. Defaults to `<warehouse>/_rescued`.
    #[serde(default)]
    pub rescue_path: Option<String>,
    /// Storage options for the rescue location (credentials, region, etc.)
    #[serde(default)]
    pub rescue_storage_options: HashMap<String, String>,
}

impl ErrorHandlingConfig {
    pub fn merge_from(&mut self, other: Self) {
        if other.max_failures != 0 {
            self.max_failures = other.max_failures;
        }
        if other.rescue_path.is_some() {
            self.rescue_path = other.rescue_path;
            self.rescue_storage_options = other.rescue_storage_options;
        }
    }
}

/// Parquet compression codec for table data files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
    Lz4,
}

/// Warehouse location shared by every stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WarehouseConfig {
    /// Root URI holding all tables, checkpoints and rescued data.
    pub uri: String,
    /// Storage options (credentials, region, endpoint, ...).
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
    /// Compression for table data files.
    #[serde(default)]
    pub compression: ParquetCompression,
}
