//! Prometheus metrics infrastructure with singleton-based initialization.
//!
//! One recorder is installed per process and shared by every source and
//! stage running in it.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{
    AddressParseSnafu, AlreadyInitializedSnafu, MetricsError, NotInitializedSnafu,
    PrometheusInitSnafu,
};

/// Default metrics address.
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

/// Default histogram buckets for duration metrics (in seconds).
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Global metrics controller singleton.
static CONTROLLER: OnceLock<MetricsController> = OnceLock::new();

/// Controller for the shared metrics server.
pub struct MetricsController {
    handle: PrometheusHandle,
}

/// Initialize the metrics server for production use.
///
/// Starts a Prometheus HTTP endpoint on the given address with
/// `/metrics` and `/health`.
pub fn init_global(address: &str) -> Result<(), MetricsError> {
    let addr: SocketAddr = address.parse().context(AddressParseSnafu)?;

    install_recorder()?;
    tokio::spawn(run_server(addr));

    info!(%addr, "Metrics server started");
    Ok(())
}

/// Initialize the metrics subsystem for tests.
///
/// Installs the recorder without an HTTP endpoint. Safe to call from
/// multiple test threads.
pub fn init_test() {
    if install_recorder().is_err() {
        while CONTROLLER.get().is_none() {
            std::hint::spin_loop();
        }
    }
}

fn install_recorder() -> Result<(), MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .context(PrometheusInitSnafu)?
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    CONTROLLER
        .set(MetricsController { handle })
        .map_err(|_| AlreadyInitializedSnafu.build())
}

impl MetricsController {
    /// Get a reference to the global metrics controller.
    pub fn get() -> Result<&'static Self, MetricsError> {
        CONTROLLER.get().context(NotInitializedSnafu)
    }

    /// Render metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

async fn run_server(addr: SocketAddr) {
    let Ok(controller) = MetricsController::get() else {
        error!("Metrics server started before recorder was installed");
        return;
    };

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(controller.handle.clone()));

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server to {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Metrics server error: {}", e);
    }
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::counter;

    #[test]
    fn test_init_test_is_idempotent() {
        init_test();
        init_test();

        assert!(MetricsController::get().is_ok());
    }

    #[test]
    fn test_controller_render() {
        init_test();

        counter!("medallion_test_counter").increment(42);

        let output = MetricsController::get().unwrap().render();
        assert!(output.contains("medallion_test_counter"));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let err = init_global("not-an-address").unwrap_err();
        assert!(matches!(err, MetricsError::AddressParse { .. }));
    }
}
