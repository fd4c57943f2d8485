//! Bronze CLI: load raw landing files into bronze tables.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use bronze::{
    BronzeSource, Catalog, CliArgs, Config, SourceContext, init_metrics, init_tracing,
    spawn_shutdown_handler,
};
use medallion_core::PipelineRunner;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    let paths = args.config_paths();
    if paths.is_empty() {
        eprintln!("Error: no config files or directories specified");
        return ExitCode::FAILURE;
    }

    info!("Loading config from {} source(s)", paths.len());

    let config = match Config::from_paths(&paths) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if config.metrics.enabled
        && let Err(e) = init_metrics(&config.metrics.address)
    {
        eprintln!("Failed to start metrics server: {e}");
        return ExitCode::FAILURE;
    }

    let warehouse = &config.warehouse;
    let catalog = match Catalog::open(&warehouse.uri, warehouse.storage_options.clone()).await {
        Ok(catalog) => catalog.with_compression(warehouse.compression),
        Err(e) => {
            eprintln!("Failed to open warehouse: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Starting bronze loader with {} source(s) into {}",
        config.source_count(),
        config.warehouse.uri
    );
    for (name, source) in &config.sources {
        info!(
            "  Source: {} ({} {} -> {}, {})",
            name,
            source.format.name(),
            source.path,
            source.table,
            source.mode.as_str()
        );
    }

    let shutdown = CancellationToken::new();
    spawn_shutdown_handler(shutdown.clone());

    let context = SourceContext {
        catalog,
        error_handling: config.error_handling.clone(),
        shutdown: shutdown.clone(),
        once: args.once,
    };
    let sources = BronzeSource::from_config(&config, context);

    let summary = PipelineRunner::new(sources, shutdown, 0, "source").run().await;

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        eprintln!("Failed sources: {}", summary.failed.join(", "));
        ExitCode::FAILURE
    }
}
