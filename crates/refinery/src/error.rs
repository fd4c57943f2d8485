//! Error types for the refinery.

use snafu::prelude::*;

pub use medallion_core::error::{ConfigError, MetricsError, RescueError, TableError};

/// Top-level refinement errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RefineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Table read or commit error.
    #[snafu(display("Table error: {source}"))]
    Table { source: TableError },

    /// Rescued-data channel error.
    #[snafu(display("Rescued data error: {source}"))]
    Rescue { source: RescueError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    /// An upstream table lacks a column the stage cannot do without.
    #[snafu(display("Table '{table}' has no column '{column}'"))]
    MissingColumn { table: String, column: String },
}

impl From<ConfigError> for RefineError {
    fn from(source: ConfigError) -> Self {
        RefineError::Config { source }
    }
}

impl From<TableError> for RefineError {
    fn from(source: TableError) -> Self {
        RefineError::Table { source }
    }
}

impl From<RescueError> for RefineError {
    fn from(source: RescueError) -> Self {
        RefineError::Rescue { source }
    }
}

impl From<MetricsError> for RefineError {
    fn from(source: MetricsError) -> Self {
        RefineError::Metrics { source }
    }
}
