//! Refinery CLI: build silver and gold tables.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use refinery::{
    Catalog, CliArgs, Config, Refinery, init_metrics, init_tracing, spawn_shutdown_handler,
};

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
        "Starting refinery ({} stage) on {}, sales write mode {}",
        args.stage.as_str(),
        warehouse.uri,
        config.silver.sales.write_mode.as_str()
    );

    let shutdown = CancellationToken::new();
    spawn_shutdown_handler(shutdown.clone());

    let refinery = match Refinery::new(catalog, config) {
        Ok(refinery) => refinery,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match refinery.run(args.stage, &shutdown).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Refinery run failed");
            eprintln!("Refinery failed: {e}");
            ExitCode::FAILURE
        }
    }
}
