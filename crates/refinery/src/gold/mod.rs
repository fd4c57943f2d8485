//! Gold layer: reporting tables recomputed from silver on every run.

pub mod customers;
pub mod ranking;
pub mod sales;

pub use customers::customer_spend;
pub use ranking::{competition_ranks, top_customers};
pub use sales::country_sales;

use tracing::info;

use medallion_core::table::{Catalog, CommitInfo};

use crate::config::Config;
use crate::error::RefineError;
use crate::records::{SaleItemRecord, SaleRecord};

#[derive(Debug, Clone)]
pub struct GoldReport {
    pub country_sales: CommitInfo,
    pub customer_spend: CommitInfo,
    pub top_customers: CommitInfo,
}

/// Recompute every gold table from the latest silver tables.
pub async fn aggregate(catalog: &Catalog, config: &Config) -> Result<GoldReport, RefineError> {
    let silver = &config.silver;
    let gold = &config.gold;

    let sales_table = catalog.table(&silver.sales.table)?;
    let items_table = catalog.table(&silver.sales.items_table)?;
    let locations_table = catalog.table(&silver.dimensions.locations.table)?;
    let customers_table = catalog.table(&silver.dimensions.customers.table)?;

    let (sales, items, locations, customers) = futures::try_join!(
        sales_table.read_records::<SaleRecord>(),
        items_table.read_records::<SaleItemRecord>(),
        locations_table.read_rows(),
        customers_table.read_rows(),
    )?;

    let by_country = country_sales(&sales, &items, &locations);
    let spend = customer_spend(&sales, &items, &customers);
    let top = top_customers(&spend, gold.top_n);

    let country_commit = catalog
        .table(&gold.country_sales_table)?
        .overwrite_records(&by_country)
        .await?;
    let spend_commit = catalog
        .table(&gold.customer_spend_table)?
        .overwrite_records(&spend)
        .await?;
    let top_commit = catalog
        .table(&gold.top_customers_table)?
        .overwrite_records(&top)
        .await?;

    info!(
        country_months = by_country.len(),
        customers = spend.len(),
        ranked = top.len(),
        top_n = gold.top_n,
        "Recomputed gold tables"
    );

    Ok(GoldReport {
        country_sales: country_commit,
        customer_spend: spend_commit,
        top_customers: top_commit,
    })
}
