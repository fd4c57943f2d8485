//! Error types for the bronze loader.

use snafu::prelude::*;

// Re-export common errors
pub use medallion_core::error::{
    ConfigError, MetricsError, RescueError, StorageError, TableError,
};

/// Errors raised while discovering source files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// The source location could not be opened.
    #[snafu(display("Failed to open source '{path}': {source}"))]
    SourceStorage { path: String, source: StorageError },

    /// Listing the source location failed.
    #[snafu(display("Failed to list source files: {source}"))]
    Listing { source: StorageError },

    /// An overwrite source matched no files.
    #[snafu(display("No {format} files found at '{path}'"))]
    NoFiles { path: String, format: &'static str },
}

/// Errors raised while persisting checkpoints.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CheckpointError {
    /// Reading or writing the checkpoint file failed.
    #[snafu(display("Checkpoint storage error: {source}"))]
    CheckpointStorage { source: StorageError },

    /// The checkpoint state could not be serialized.
    #[snafu(display("Failed to serialize checkpoint: {source}"))]
    CheckpointSerialize { source: serde_json::Error },
}

/// Top-level ingestion errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Source discovery error.
    #[snafu(display("Source error: {source}"))]
    Source { source: SourceError },

    /// Checkpoint error.
    #[snafu(display("Checkpoint error: {source}"))]
    Checkpoint { source: CheckpointError },

    /// Table commit or read error. Schema conflicts land here.
    #[snafu(display("Table error: {source}"))]
    Table { source: TableError },

    /// Rescued-data channel error.
    #[snafu(display("Rescued data error: {source}"))]
    Rescue { source: RescueError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    /// Maximum failures exceeded.
    #[snafu(display("Maximum failures exceeded: {count} failures"))]
    MaxFailures { count: usize },
}

impl From<ConfigError> for IngestError {
    fn from(source: ConfigError) -> Self {
        IngestError::Config { source }
    }
}

impl From<SourceError> for IngestError {
    fn from(source: SourceError) -> Self {
        IngestError::Source { source }
    }
}

impl From<CheckpointError> for IngestError {
    fn from(source: CheckpointError) -> Self {
        IngestError::Checkpoint { source }
    }
}

impl From<TableError> for IngestError {
    fn from(source: TableError) -> Self {
        IngestError::Table { source }
    }
}

impl From<RescueError> for IngestError {
    fn from(source: RescueError) -> Self {
        IngestError::Rescue { source }
    }
}

impl From<MetricsError> for IngestError {
    fn from(source: MetricsError) -> Self {
        IngestError::Metrics { source }
    }
}
