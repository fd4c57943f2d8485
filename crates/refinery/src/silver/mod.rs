//! Silver layer: reference dimensions, deduplicated sales and their line items.
//!
//! Each run reads one committed version of every bronze table it uses.
//! Dimensions are always replaced. Sales and sale items are either replaced
//! or merged by `id` depending on `silver.sales.write_mode`. A merge of sale
//! items replaces every item of the sales refined in the run, so items no
//! longer present in a sale's payload are deleted.

pub mod dedup;
pub mod dimensions;
pub mod expand;

pub use dedup::{DedupOutcome, dedup_sales};
pub use dimensions::{Dimension, build_customers, build_locations, build_products};
pub use expand::{ExpandOutcome, MalformedPayload, expand_items};

use serde::Serialize;
use snafu::ensure;
use tracing::{info, warn};

use medallion_core::emit;
use medallion_core::metrics::events::{DuplicatesResolved, ItemsExpanded};
use medallion_core::rescue::RescuedDataQueue;
use medallion_core::table::{
    Catalog, CommitInfo, MergeOptions, MergeOutcome, Row, Table, TableRecord, TableSchema,
};

use crate::config::{Config, CountryMap, DimensionConfig, WriteMode};
use crate::error::{MissingColumnSnafu, RefineError};

/// Column silver rows are merged on.
pub const MERGE_KEY: &str = "id";
/// Column whose change marks a merged row as updated.
pub const MERGE_COMPARE: &str = "row_hash";
/// Column of a sale item holding its parent sale.
pub const ITEM_PARENT: &str = "sale_id";

/// How a silver table was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Replaced(CommitInfo),
    Merged(MergeOutcome),
}

impl WriteOutcome {
    /// Version written, if any.
    pub fn version(&self) -> Option<u64> {
        match self {
            WriteOutcome::Replaced(info) => Some(info.version),
            WriteOutcome::Merged(MergeOutcome::Committed { info, .. }) => Some(info.version),
            WriteOutcome::Merged(MergeOutcome::Unchanged(_)) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SilverReport {
    /// Commits of `dim_locations`, `dim_customers` and `dim_products`.
    pub dimensions: [CommitInfo; 3],
    pub sales: usize,
    pub items: usize,
    pub discarded: u64,
    pub ambiguous: u64,
    pub missing_key: u64,
    /// Sales whose items could not be expanded.
    pub malformed: Vec<MalformedPayload>,
    pub sales_write: WriteOutcome,
    pub items_write: WriteOutcome,
}

/// Build every silver table.
pub async fn refine(
    catalog: &Catalog,
    config: &Config,
    countries: &CountryMap,
) -> Result<SilverReport, RefineError> {
    let dims = &config.silver.dimensions;
    let (locations, customers, products) = futures::try_join!(
        refresh_dimension(catalog, &dims.locations, |stores| {
            build_locations(&dims.locations.source, stores, countries)
        }),
        refresh_dimension(catalog, &dims.customers, |customers| {
            build_customers(&dims.customers.source, customers)
        }),
        refresh_dimension(catalog, &dims.products, |products| {
            Ok(build_products(products))
        }),
    )?;

    let sales_config = &config.silver.sales;
    let columns = &sales_config.columns;
    let source = catalog.table(&sales_config.source)?;
    let (schema, rows) = read_latest(&source).await?;
    ensure!(
        schema.column(&columns.id).is_some(),
        MissingColumnSnafu {
            table: source.name(),
            column: columns.id.as_str(),
        }
    );

    let dedup = dedup_sales(&rows, columns);
    emit!(DuplicatesResolved {
        discarded: dedup.discarded,
        ambiguous: dedup.ambiguous,
        missing_key: dedup.missing_key,
        target: sales_config.table.clone(),
    });
    if dedup.missing_key > 0 {
        warn!(
            table = %sales_config.table,
            rows = dedup.missing_key,
            key = %columns.id,
            "Skipped raw sales without a key"
        );
    }
    if dedup.ambiguous > 0 {
        info!(
            table = %sales_config.table,
            keys = dedup.ambiguous,
            "Resolved duplicates with equal recency by ingestion order"
        );
    }

    let expanded = expand_items(&dedup.sales);
    emit!(ItemsExpanded {
        items: expanded.items.len() as u64,
        malformed: expanded.malformed.len() as u64,
        target: sales_config.items_table.clone(),
    });

    let merge = MergeOptions::new(MERGE_KEY, MERGE_COMPARE);
    let items_merge = merge.clone().with_replace_scope(
        ITEM_PARENT,
        dedup.sales.iter().map(|sale| sale.id.clone()),
    );

    let sales_table = catalog.table(&sales_config.table)?;
    let sales_write = write(&sales_table, &dedup.sales, sales_config.write_mode, &merge).await?;
    let items_table = catalog.table(&sales_config.items_table)?;
    let items_write = write(
        &items_table,
        &expanded.items,
        sales_config.write_mode,
        &items_merge,
    )
    .await?;

    if !expanded.malformed.is_empty() {
        let rescue = RescuedDataQueue::from_config(
            &config.error_handling,
            catalog.storage(),
            &sales_config.items_table,
        )
        .await?;
        for payload in &expanded.malformed {
            warn!(
                table = %sales_config.items_table,
                sale_id = %payload.sale_id,
                reason = %payload.reason,
                "Sale kept without items"
            );
            rescue
                .record(payload.clone().into_record(&columns.sale_items))
                .await;
        }
        rescue.finalize().await?;
    }

    info!(
        sales = dedup.sales.len(),
        items = expanded.items.len(),
        discarded = dedup.discarded,
        malformed = expanded.malformed.len(),
        mode = sales_config.write_mode.as_str(),
        sales_version = ?sales_write.version(),
        items_version = ?items_write.version(),
        "Refined sales"
    );

    Ok(SilverReport {
        dimensions: [locations, customers, products],
        sales: dedup.sales.len(),
        items: expanded.items.len(),
        discarded: dedup.discarded,
        ambiguous: dedup.ambiguous,
        missing_key: dedup.missing_key,
        malformed: expanded.malformed,
        sales_write,
        items_write,
    })
}

/// Schema and rows of the latest committed version.
async fn read_latest(table: &Table) -> Result<(TableSchema, Vec<Row>), RefineError> {
    let manifest = table.snapshot().await?;
    let rows = table.read_manifest(&manifest).await?;
    Ok((manifest.schema, rows))
}

async fn refresh_dimension<F>(
    catalog: &Catalog,
    config: &DimensionConfig,
    build: F,
) -> Result<CommitInfo, RefineError>
where
    F: FnOnce(Dimension) -> Result<Dimension, RefineError>,
{
    let (schema, rows) = read_latest(&catalog.table(&config.source)?).await?;
    let dimension = build(Dimension::new(schema, rows))?;

    let commit = catalog
        .table(&config.table)?
        .overwrite(&dimension.schema, &dimension.rows)
        .await?;
    info!(
        table = %config.table,
        source = %config.source,
        version = commit.version,
        rows = commit.rows_added,
        "Refreshed dimension"
    );
    Ok(commit)
}

async fn write<T>(
    table: &Table,
    records: &[T],
    mode: WriteMode,
    merge: &MergeOptions,
) -> Result<WriteOutcome, RefineError>
where
    T: TableRecord + Serialize,
{
    Ok(match mode {
        WriteMode::Overwrite => WriteOutcome::Replaced(table.overwrite_records(records).await?),
        WriteMode::Merge => WriteOutcome::Merged(table.merge_records(records, merge).await?),
    })
}
