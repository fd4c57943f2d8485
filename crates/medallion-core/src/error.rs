//! Common error types shared between the bronze loader and the refinery.
//!
//! This module defines error types for storage, configuration, metrics,
//! table and rescued-data operations that are used by both crates.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error: {source}"))]
    S3Config { source: object_store::Error },

    /// A local warehouse root exists but is not a directory.
    #[snafu(display("Local storage root is not a directory: {path}"))]
    NotADirectory { path: String },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }

    /// Check if this error was caused by a create-only write hitting an existing object.
    pub fn is_already_exists(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::AlreadyExists { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Warehouse URI is empty.
    #[snafu(display("Warehouse URI cannot be empty"))]
    EmptyWarehouse,

    /// Source path is empty for a specific source.
    #[snafu(display("Source '{source_name}' has empty path"))]
    EmptySourcePath { source_name: String },

    /// Table name is not usable as a storage prefix.
    #[snafu(display("'{name}' is not a valid table name (use letters, digits and '_')"))]
    InvalidTableNameConfig { name: String },

    /// A schema hint could not be parsed.
    #[snafu(display("Invalid schema hint '{hint}': {reason}"))]
    InvalidSchemaHint { hint: String, reason: String },

    /// A CSV option that must be a single byte was not.
    #[snafu(display("Source '{source_name}': {option} must be a single ASCII character"))]
    InvalidCsvOption {
        source_name: String,
        option: &'static str,
    },

    /// A store code was mapped to more than one country.
    #[snafu(display("Store '{store}' is mapped to both '{first}' and '{second}'"))]
    AmbiguousStoreCountry {
        store: String,
        first: String,
        second: String,
    },

    /// A numeric option is outside its allowed range.
    #[snafu(display("Option '{option}' {reason}"))]
    InvalidOption {
        option: &'static str,
        reason: &'static str,
    },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },

    /// Duplicate component keys found across config files.
    #[snafu(display("Duplicate component keys: {}", keys.join(", ")))]
    DuplicateComponents { keys: Vec<String> },

    /// Unsupported config file format.
    #[snafu(display("Unsupported config format for {}: only .yaml/.yml supported", path.display()))]
    UnsupportedFormat { path: std::path::PathBuf },

    /// Failed to read configuration directory.
    #[snafu(display("Failed to read directory {}", path.display()))]
    ReadDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Multiple configuration errors occurred.
    #[snafu(display("Multiple config errors:\n{}", errors.join("\n")))]
    MultipleErrors { errors: Vec<String> },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to parse metrics address.
    #[snafu(display("Failed to parse metrics address: {source}"))]
    AddressParse { source: std::net::AddrParseError },

    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Metrics server already initialized (double-init attempted).
    #[snafu(display("Metrics server already initialized"))]
    AlreadyInitialized,

    /// Metrics server not initialized (controller accessed before init).
    #[snafu(display("Metrics server not initialized"))]
    NotInitialized,
}

// ============ Table Errors ============

/// Errors raised by the versioned table store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TableError {
    /// Underlying storage failed.
    #[snafu(display("Table storage error: {source}"))]
    TableStorage { source: StorageError },

    /// Parquet encode/decode failed.
    #[snafu(display("Parquet error in table '{table}': {source}"))]
    Parquet {
        table: String,
        source: parquet::errors::ParquetError,
    },

    /// Arrow array construction or decoding failed.
    #[snafu(display("Arrow error in table '{table}': {source}"))]
    Arrow {
        table: String,
        source: arrow::error::ArrowError,
    },

    /// Manifest could not be serialized or deserialized.
    #[snafu(display("Invalid manifest for table '{table}': {source}"))]
    Manifest {
        table: String,
        source: serde_json::Error,
    },

    /// Typed record (de)serialization failed.
    #[snafu(display("Record conversion failed for table '{table}': {source}"))]
    Record {
        table: String,
        source: serde_json::Error,
    },

    /// Table has never been committed.
    #[snafu(display("Table '{table}' does not exist"))]
    TableNotFound { table: String },

    /// Requested version is not in the table's history.
    #[snafu(display("Table '{table}' has no version {version}"))]
    VersionNotFound { table: String, version: u64 },

    /// Another writer committed the same version first.
    #[snafu(display("Concurrent commit detected on table '{table}' at version {version}"))]
    ConcurrentCommit { table: String, version: u64 },

    /// Table name is not usable as a storage prefix.
    #[snafu(display("'{name}' is not a valid table name"))]
    InvalidTableName { name: String },

    /// An incoming column type cannot be reconciled with the table.
    #[snafu(display(
        "Schema conflict on table '{table}': column '{column}' is {existing}, incoming is {incoming}"
    ))]
    SchemaConflict {
        table: String,
        column: String,
        existing: String,
        incoming: String,
    },

    /// Strict evolution mode rejected a schema change.
    #[snafu(display("Schema change rejected on table '{table}' (strict mode): {message}"))]
    SchemaChangeRejected { table: String, message: String },

    /// A value could not be stored in its column.
    #[snafu(display("Column '{column}' of table '{table}' cannot hold value: {message}"))]
    ValueMismatch {
        table: String,
        column: String,
        message: String,
    },

    /// A data file contained a column type the table store does not use.
    #[snafu(display("Unsupported column type {data_type} in table '{table}'"))]
    UnsupportedType { table: String, data_type: String },
}

// ============ Rescue Errors ============

/// Errors that can occur while writing rescued data.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[allow(clippy::enum_variant_names)]
pub enum RescueError {
    /// Failed to write rescued records.
    #[snafu(display("Failed to write rescued data"))]
    RescueWrite { source: StorageError },

    /// Failed to serialize a rescued record.
    #[snafu(display("Failed to serialize rescued record"))]
    RescueSerialize { source: serde_json::Error },

    /// Failed to create rescue storage provider.
    #[snafu(display("Failed to create rescue storage"))]
    RescueStorage { source: StorageError },
}
