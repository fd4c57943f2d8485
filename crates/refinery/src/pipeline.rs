//! Running the silver and gold stages in order.

use std::future::Future;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use medallion_core::emit;
use medallion_core::metrics::events::StageCompleted;
use medallion_core::table::Catalog;

use crate::config::{Config, CountryMap, Stage};
use crate::error::RefineError;
use crate::gold::{self, GoldReport};
use crate::silver::{self, SilverReport};

/// Outcome of one refinery run. A stage that did not run has no report.
#[derive(Debug, Clone, Default)]
pub struct RefineReport {
    pub silver: Option<SilverReport>,
    pub gold: Option<GoldReport>,
}

pub struct Refinery {
    catalog: Catalog,
    config: Config,
    countries: CountryMap,
}

impl Refinery {
    pub fn new(catalog: Catalog, config: Config) -> Result<Self, RefineError> {
        let countries = config.country_map()?;
        Ok(Self {
            catalog,
            config,
            countries,
        })
    }

    /// Build the requested layers. Shutdown is honoured between stages only.
    pub async fn run(
        &self,
        stage: Stage,
        shutdown: &CancellationToken,
    ) -> Result<RefineReport, RefineError> {
        let mut report = RefineReport::default();

        if stage.includes_silver() {
            let silver = silver::refine(&self.catalog, &self.config, &self.countries);
            report.silver = Some(timed("silver", silver).await?);
        }

        if stage.includes_gold() {
            if shutdown.is_cancelled() {
                warn!("Shutdown requested, skipping gold stage");
                return Ok(report);
            }
            let gold = gold::aggregate(&self.catalog, &self.config);
            report.gold = Some(timed("gold", gold).await?);
        }

        Ok(report)
    }
}

async fn timed<T, F>(stage: &'static str, work: F) -> Result<T, RefineError>
where
    F: Future<Output = Result<T, RefineError>>,
{
    info!(stage, "Starting stage");
    let started = Instant::now();
    let result = work.await?;
    let duration = started.elapsed();

    emit!(StageCompleted { stage, duration });
    info!(stage, duration_ms = duration.as_millis() as u64, "Stage completed");
    Ok(result)
}
