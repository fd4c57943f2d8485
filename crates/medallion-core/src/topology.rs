//! Orchestration primitives for running several long-lived tasks.
//!
//! Each configured source becomes one task; all of them share a single
//! cancellation token wired to the process signal handler.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A self-contained unit of work that can be executed.
pub trait Pipeline: Send + 'static {
    /// The key type used to identify this pipeline.
    type Key: Clone + Display + Send + 'static;

    /// The error type returned by this pipeline.
    type Error: std::error::Error + Send + 'static;

    /// Get a reference to the pipeline's key.
    fn key(&self) -> &Self::Key;

    /// Run this pipeline to completion.
    fn run(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Summary of a [`PipelineRunner`] execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Orchestrates multiple pipeline executions with shared shutdown handling.
pub struct PipelineRunner<P: Pipeline> {
    pipelines: Vec<P>,
    shutdown: CancellationToken,
    start_jitter_secs: u64,
    typetag: &'static str,
}

impl<P: Pipeline> PipelineRunner<P> {
    pub fn new(
        pipelines: Vec<P>,
        shutdown: CancellationToken,
        start_jitter_secs: u64,
        typetag: &'static str,
    ) -> Self {
        Self {
            pipelines,
            shutdown,
            start_jitter_secs,
            typetag,
        }
    }

    /// Run all pipelines to completion.
    #[allow(clippy::type_complexity)]
    pub async fn run(self) -> RunSummary {
        let mut handles: JoinSet<(P::Key, Result<(), P::Error>)> = JoinSet::new();
        let typetag = self.typetag;

        for pipeline in self.pipelines {
            let shutdown = self.shutdown.clone();
            let key = pipeline.key().clone();
            let start_jitter = random_jitter(self.start_jitter_secs);

            handles.spawn(async move {
                // Stagger start times, but respect shutdown signal
                if !start_jitter.is_zero() {
                    info!(
                        target = %key,
                        jitter_secs = start_jitter.as_secs(),
                        "Delaying {} start for jitter", typetag
                    );
                    if shutdown
                        .run_until_cancelled(tokio::time::sleep(start_jitter))
                        .await
                        .is_none()
                    {
                        info!(target = %key, "Shutdown requested during jitter delay");
                        return (key, Ok(()));
                    }
                }

                let result = pipeline.run().await;
                (key, result)
            });
        }

        info!("Spawned {} {} tasks", handles.len(), typetag);

        let mut summary = RunSummary::default();
        while let Some(result) = handles.join_next().await {
            match result {
                Ok((key, Ok(()))) => {
                    info!(target = %key, "{} completed", typetag);
                    summary.succeeded.push(key.to_string());
                }
                Ok((key, Err(e))) => {
                    error!(target = %key, error = %e, "{} failed", typetag);
                    summary.failed.push(key.to_string());
                }
                Err(e) => {
                    error!(error = %e, "{} task panicked", typetag);
                    summary.failed.push("<panicked>".to_string());
                }
            }
        }

        info!("All {}s complete", typetag);
        summary
    }
}

/// Generate a random jitter duration up to the specified maximum seconds.
pub fn random_jitter(max_secs: u64) -> Duration {
    if max_secs > 0 {
        Duration::from_millis(rand::rng().random_range(0..max_secs * 1000))
    } else {
        Duration::ZERO
    }
}
