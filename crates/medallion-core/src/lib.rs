//! medallion-core: Shared components for the bronze loader and the refinery.
//!
//! - `storage/` - Object storage abstraction (S3, local filesystem)
//! - `table/` - Versioned Parquet tables with atomic overwrite, append and merge
//! - `rescue/` - Side channel for rows and files that failed to parse
//! - `metrics/` - Prometheus metrics infrastructure
//! - `config/` - Common configuration types and environment variable interpolation
//! - `topology` - Running several pipelines under one shutdown token
//! - `polling` - Generic polling loop trait and runner
//! - `signal` - Signal handling for graceful shutdown
//! - `error` - Common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod polling;
pub mod rescue;
pub mod signal;
pub mod storage;
pub mod table;
pub mod topology;
pub mod tracing;

// Re-export commonly used items
pub use config::{
    ConfigArgs, ErrorHandlingConfig, MetricsConfig, Mergeable, ParquetCompression,
    WarehouseConfig,
};
pub use error::{ConfigError, MetricsError, RescueError, StorageError, TableError};
pub use metrics::{
    DEFAULT_METRICS_ADDR, MetricsController, init_global as init_metrics,
    init_test as init_metrics_test,
};
pub use polling::{IterationResult, PollingProcessor, run_polling_loop, run_until_idle};
pub use rescue::{RescueStats, RescuedDataQueue, RescuedRecord};
pub use signal::{shutdown_signal, spawn_shutdown_handler};
pub use storage::{StorageProvider, StorageProviderRef};
pub use table::{
    AppendOptions, AppendOutcome, Catalog, ColumnType, CommitInfo, MergeOptions, MergeOutcome,
    Row, SchemaEvolutionMode, Table, TableRecord, TableSchema, Transaction,
};
pub use topology::{Pipeline, PipelineRunner, RunSummary, random_jitter};
pub use self::tracing::init_tracing;
