//! Running configured sources.
//!
//! Every source becomes one [`BronzeSource`] task. Overwrite sources reload
//! their table once; incremental sources ingest everything new and stop;
//! continuous sources keep polling until shutdown (or stop once idle when
//! started with `--once`).

mod load;
mod processor;
mod snapshot;

pub use load::{LoadedFiles, load_files};
pub use processor::{Ingestor, MicroBatch, app_id};
pub use snapshot::load_snapshot;

use std::sync::Arc;
use std::time::Duration;

use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

use medallion_core::config::ErrorHandlingConfig;
use medallion_core::polling::{run_polling_loop, run_until_idle};
use medallion_core::rescue::RescuedDataQueue;
use medallion_core::storage::StorageProvider;
use medallion_core::table::Catalog;
use medallion_core::topology::Pipeline;

use crate::checkpoint::CheckpointManager;
use crate::config::{Config, SourceConfig, SourceMode};
use crate::error::{IngestError, SourceStorageSnafu};
use crate::failure::FailureTracker;
use crate::source::{SourceLocation, parser_for};

/// Service label used in iteration metrics.
const SERVICE: &str = "bronze";

/// State shared by every source of one run.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub catalog: Catalog,
    pub error_handling: ErrorHandlingConfig,
    pub shutdown: CancellationToken,
    /// Stop continuous sources once no new files remain.
    pub once: bool,
}

/// One configured source bound to its table.
pub struct BronzeSource {
    pub key: String,
    pub config: SourceConfig,
    pub context: SourceContext,
}

impl BronzeSource {
    pub fn from_config(config: &Config, context: SourceContext) -> Vec<Self> {
        config
            .sources
            .iter()
            .map(|(key, source)| Self {
                key: key.clone(),
                config: source.clone(),
                context: context.clone(),
            })
            .collect()
    }

    async fn execute(self) -> Result<(), IngestError> {
        let name = self.key;
        let config = self.config;
        let context = self.context;

        let location = SourceLocation::resolve(&config.path, config.format.extensions());
        let storage = Arc::new(
            StorageProvider::for_url_with_options(&location.root, config.storage_options.clone())
                .await
                .context(SourceStorageSnafu {
                    path: config.path.as_str(),
                })?,
        );
        let parser = parser_for(&name, &config.format)?;
        let table = context.catalog.table(&config.table)?;

        let rescue = RescuedDataQueue::from_config(
            &context.error_handling,
            context.catalog.storage(),
            &name,
        )
        .await?;
        let mut failures =
            FailureTracker::new(context.error_handling.max_failures, Arc::new(rescue), &name);

        info!(
            target = %name,
            mode = config.mode.as_str(),
            format = config.format.name(),
            source = %storage.canonical_url(),
            table = %config.table,
            "Starting source"
        );

        if config.mode == SourceMode::Overwrite {
            let result = load_snapshot(
                &name,
                &storage,
                &location,
                parser.as_ref(),
                &table,
                &mut failures,
                &config.format,
            )
            .await;
            failures.finalize().await;
            return result.map(|_| ());
        }

        let checkpoint = CheckpointManager::new(context.catalog.storage().clone(), &name);
        let mode = config.mode;
        let poll_interval = Duration::from_secs(config.poll_interval_secs);
        let poll_jitter_secs = config.poll_jitter_secs;

        let mut ingestor = Ingestor::new(
            name.clone(),
            config,
            storage,
            location,
            parser,
            table,
            checkpoint,
            failures,
        );

        let result = if mode == SourceMode::Continuous && !context.once {
            run_polling_loop(
                &mut ingestor,
                poll_interval,
                poll_jitter_secs,
                context.shutdown,
                &name,
                SERVICE,
            )
            .await
        } else {
            run_until_idle(&mut ingestor, context.shutdown, &name, SERVICE)
                .await
                .map(|batches| info!(target = %name, batches, "Source is up to date"))
        };

        ingestor.finish().await;
        result
    }
}

impl Pipeline for BronzeSource {
    type Key = String;
    type Error = IngestError;

    fn key(&self) -> &Self::Key {
        &self.key
    }

    async fn run(self) -> Result<(), Self::Error> {
        self.execute().await
    }
}
