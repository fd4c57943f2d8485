//! Generic polling loop trait and runner.
//!
//! Continuous ingestion wakes on an interval, processes one micro-batch and
//! sleeps again. Shutdown is honoured while preparing or sleeping; a batch
//! that has started processing always runs to completion so that its
//! checkpoint is committed before the loop exits.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::emit;
use crate::metrics::events::{IterationCompleted, IterationDuration, IterationResultType};
use crate::topology::random_jitter;

/// Result of a single processing iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationResult {
    /// Items were processed successfully.
    ProcessedItems,
    /// No items were available to process.
    NoItems,
}

/// Trait for implementing a polling-based processor.
#[async_trait]
pub trait PollingProcessor {
    /// The state type prepared for each iteration.
    type State: Send;
    /// The error type for this processor.
    type Error: std::error::Error + Send;

    /// Prepare state for a processing iteration.
    ///
    /// Returns `None` if there's no work to do (e.g., no new files).
    ///
    /// # Arguments
    /// * `cold_start` - True on the first iteration (for recovery logic)
    async fn prepare(&mut self, cold_start: bool) -> Result<Option<Self::State>, Self::Error>;

    /// Process the prepared state.
    async fn process(&mut self, state: Self::State) -> Result<IterationResult, Self::Error>;
}

/// Run a polling loop with the given processor until shutdown.
///
/// 1. Call `prepare()` (with cold_start=true on first iteration), cancellable
/// 2. Call `process()` if there's work to do, never cancelled midway
/// 3. Wait for poll_interval (plus random jitter) or shutdown signal
/// 4. Repeat until shutdown
pub async fn run_polling_loop<P: PollingProcessor>(
    processor: &mut P,
    poll_interval: Duration,
    poll_jitter_secs: u64,
    shutdown: CancellationToken,
    name: &str,
    service: &'static str,
) -> Result<(), P::Error> {
    let mut first_iteration = true;

    loop {
        let iteration_start = Instant::now();

        let Some(result) = run_iteration(processor, &shutdown, first_iteration, name).await? else {
            return Ok(());
        };
        first_iteration = false;
        record_iteration(&result, iteration_start, name, service);

        debug!(
            target = name,
            "Waiting {}s before next poll",
            poll_interval.as_secs()
        );

        let sleep_duration = poll_interval + random_jitter(poll_jitter_secs);
        if shutdown
            .run_until_cancelled(tokio::time::sleep(sleep_duration))
            .await
            .is_none()
        {
            info!(target = name, "Shutdown requested during poll wait");
            break;
        }
    }

    Ok(())
}

/// Run iterations back to back until the processor reports no more work.
///
/// This is the "trigger once" mode: everything available is processed and
/// the function returns, leaving the checkpoint ready for the next run.
pub async fn run_until_idle<P: PollingProcessor>(
    processor: &mut P,
    shutdown: CancellationToken,
    name: &str,
    service: &'static str,
) -> Result<usize, P::Error> {
    let mut first_iteration = true;
    let mut batches = 0;

    loop {
        let iteration_start = Instant::now();

        let Some(result) = run_iteration(processor, &shutdown, first_iteration, name).await? else {
            return Ok(batches);
        };
        first_iteration = false;
        record_iteration(&result, iteration_start, name, service);

        match result {
            IterationResult::ProcessedItems => batches += 1,
            IterationResult::NoItems => return Ok(batches),
        }
    }
}

/// One prepare/process round. Returns `None` when shutdown was requested
/// before any processing began.
async fn run_iteration<P: PollingProcessor>(
    processor: &mut P,
    shutdown: &CancellationToken,
    cold_start: bool,
    name: &str,
) -> Result<Option<IterationResult>, P::Error> {
    let state = tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!(target = name, "Shutdown requested during preparation");
            return Ok(None);
        }

        result = processor.prepare(cold_start) => result?,
    };

    match state {
        Some(state) => processor.process(state).await.map(Some),
        None => {
            debug!(target = name, "No items to process");
            Ok(Some(IterationResult::NoItems))
        }
    }
}

fn record_iteration(result: &IterationResult, started: Instant, name: &str, service: &'static str) {
    let result = match result {
        IterationResult::ProcessedItems => IterationResultType::Processed,
        IterationResult::NoItems => IterationResultType::NoItems,
    };
    emit!(IterationCompleted {
        service,
        result,
        target: name.to_string(),
    });
    emit!(IterationDuration {
        service,
        duration: started.elapsed(),
        target: name.to_string(),
    });
}
