//! Configuration for the refinery.
//!
//! Every section except `warehouse` has defaults matching the standard
//! bronze table names, so the smallest config is:
//!
//! ```yaml
//! warehouse:
//!   uri: s3://lake/warehouse
//! ```
//!
//! A fuller example:
//!
//! ```yaml
//! warehouse:
//!   uri: s3://lake/warehouse
//!
//! silver:
//!   sales:
//!     source: sales_raw
//!     write_mode: merge
//!     columns:
//!       id: SaleID
//!       recency: exported_ts
//!   dimensions:
//!     locations:
//!       source: stores
//!       table: dim_locations
//!
//! countries:
//!   AUS: [SYD01, MEL01]
//!   NZL: [AKL01]
//!
//! gold:
//!   top_n: 5
//! ```

mod countries;

use clap::{Parser, ValueEnum};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::ensure;

pub use countries::CountryMap;
pub use medallion_core::config::{
    ConfigArgs, ConfigPath, ErrorHandlingConfig, Mergeable, MetricsConfig, WarehouseConfig,
    load_from_paths, merge_components,
};
use medallion_core::error::{
    ConfigError, EmptyWarehouseSnafu, InvalidOptionSnafu, InvalidTableNameConfigSnafu,
};

/// Command-line arguments for the `refinery` binary.
#[derive(Parser, Debug)]
#[command(name = "refinery")]
#[command(about = "Build silver and gold tables from bronze tables")]
#[command(version)]
pub struct CliArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Which layer to build
    #[arg(long, value_enum, default_value_t = Stage::All)]
    pub stage: Stage,
}

impl CliArgs {
    pub fn config_paths(&self) -> Vec<ConfigPath> {
        self.config.config_paths()
    }
}

/// Layers the refinery can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    Silver,
    Gold,
    /// Silver, then gold.
    All,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Silver => "silver",
            Stage::Gold => "gold",
            Stage::All => "all",
        }
    }

    pub fn includes_silver(&self) -> bool {
        matches!(self, Stage::Silver | Stage::All)
    }

    pub fn includes_gold(&self) -> bool {
        matches!(self, Stage::Gold | Stage::All)
    }
}

/// How silver sales and sale items are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Recompute and replace the whole table.
    #[default]
    Overwrite,
    /// Upsert by `id`, rewriting only rows whose `row_hash` changed.
    Merge,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Merge => "merge",
        }
    }
}

fn text(value: &str) -> String {
    value.to_string()
}

/// Raw sales column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaleColumns {
    /// Business key.
    pub id: String,
    /// Event time in epoch seconds.
    pub ts: String,
    pub store_id: String,
    pub customer_id: String,
    pub order_source: String,
    pub order_state: String,
    /// Nested line items.
    pub sale_items: String,
    /// Orders duplicates of one key; the greatest value wins.
    pub recency: String,
}

impl Default for SaleColumns {
    fn default() -> Self {
        Self {
            id: text("SaleID"),
            ts: text("ts"),
            store_id: text("Location"),
            customer_id: text("CustomerID"),
            order_source: text("OrderSource"),
            order_state: text("STATE"),
            sale_items: text("SaleItems"),
            recency: text("exported_ts"),
        }
    }
}

/// Silver sales and sale items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SalesConfig {
    /// Bronze table holding raw sales.
    pub source: String,
    pub table: String,
    pub items_table: String,
    pub write_mode: WriteMode,
    pub columns: SaleColumns,
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self {
            source: text("sales_raw"),
            table: text("silver_sales"),
            items_table: text("silver_sale_items"),
            write_mode: WriteMode::default(),
            columns: SaleColumns::default(),
        }
    }
}

/// A reference table rebuilt from one bronze table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionConfig {
    pub source: String,
    pub table: String,
}

impl DimensionConfig {
    fn new(source: &str, table: &str) -> Self {
        Self {
            source: text(source),
            table: text(table),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DimensionsConfig {
    pub locations: DimensionConfig,
    pub customers: DimensionConfig,
    pub products: DimensionConfig,
}

impl Default for DimensionsConfig {
    fn default() -> Self {
        Self {
            locations: DimensionConfig::new("stores", "dim_locations"),
            customers: DimensionConfig::new("customers", "dim_customers"),
            products: DimensionConfig::new("products", "dim_products"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SilverConfig {
    pub sales: SalesConfig,
    pub dimensions: DimensionsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GoldConfig {
    /// Sales per country and month.
    pub country_sales_table: String,
    /// Spend per customer and store.
    pub customer_spend_table: String,
    /// Best customers of each store.
    pub top_customers_table: String,
    /// Rank cut-off for the top customers table.
    pub top_n: u64,
}

impl Default for GoldConfig {
    fn default() -> Self {
        Self {
            country_sales_table: text("gold_country_sales"),
            customer_spend_table: text("gold_top_customers"),
            top_customers_table: text("gold_store_top_customers"),
            top_n: 3,
        }
    }
}

/// Main configuration for the refinery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub silver: SilverConfig,
    #[serde(default)]
    pub gold: GoldConfig,
    /// Store codes by country code. Empty means the built-in map.
    #[serde(default)]
    pub countries: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Mergeable for Config {
    fn parse_yaml(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::YamlParse { source })
    }

    fn merge(&mut self, other: Self) -> Result<(), ConfigError> {
        merge_components(&mut self.countries, other.countries)?;
        if !other.warehouse.uri.is_empty() {
            self.warehouse = other.warehouse;
        }
        if other.silver != SilverConfig::default() {
            self.silver = other.silver;
        }
        if other.gold != GoldConfig::default() {
            self.gold = other.gold;
        }
        self.error_handling.merge_from(other.error_handling);
        self.metrics.merge_from(other.metrics);
        Ok(())
    }
}

impl Config {
    /// Load configuration from multiple paths (files or directories).
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config: Self = load_from_paths(paths)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_yaml(&medallion_core::config::interpolate(contents)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.warehouse.uri.is_empty(), EmptyWarehouseSnafu);

        for name in self.table_names() {
            ensure!(valid_table_name(name), InvalidTableNameConfigSnafu { name });
        }
        ensure!(
            self.gold.top_n > 0,
            InvalidOptionSnafu {
                option: "gold.top_n",
                reason: "must be at least 1",
            }
        );

        self.country_map()?;
        Ok(())
    }

    /// The store to country lookup used for `dim_locations`.
    pub fn country_map(&self) -> Result<CountryMap, ConfigError> {
        if self.countries.is_empty() {
            Ok(CountryMap::builtin())
        } else {
            CountryMap::from_config(&self.countries)
        }
    }

    fn table_names(&self) -> [&str; 12] {
        let sales = &self.silver.sales;
        let dims = &self.silver.dimensions;
        [
            &sales.source,
            &sales.table,
            &sales.items_table,
            &dims.locations.source,
            &dims.locations.table,
            &dims.customers.source,
            &dims.customers.table,
            &dims.products.source,
            &dims.products.table,
            &self.gold.country_sales_table,
            &self.gold.customer_spend_table,
            &self.gold.top_customers_table,
        ]
        .map(String::as_str)
    }
}

fn valid_table_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse("warehouse:\n  uri: /tmp/warehouse\n").unwrap();

        assert_eq!(config.silver.sales.source, "sales_raw");
        assert_eq!(config.silver.sales.columns.id, "SaleID");
        assert_eq!(config.silver.sales.columns.recency, "exported_ts");
        assert_eq!(config.silver.sales.write_mode, WriteMode::Overwrite);
        assert_eq!(config.silver.dimensions.locations.table, "dim_locations");
        assert_eq!(config.gold.top_n, 3);
        assert_eq!(
            config.country_map().unwrap().country_of("SYD01"),
            Some("AUS")
        );
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
warehouse:
  uri: /tmp/warehouse
silver:
  sales:
    write_mode: merge
    columns:
      id: sale_id
gold:
  top_n: 5
"#,
        )
        .unwrap();

        assert_eq!(config.silver.sales.write_mode, WriteMode::Merge);
        assert_eq!(config.silver.sales.columns.id, "sale_id");
        assert_eq!(config.silver.sales.columns.store_id, "Location");
        assert_eq!(config.gold.top_n, 5);
        assert_eq!(config.gold.country_sales_table, "gold_country_sales");
    }

    #[test]
    fn test_zero_top_n_rejected() {
        let err = Config::parse("warehouse:\n  uri: /w\ngold:\n  top_n: 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOption {
                option: "gold.top_n",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_table_name_rejected() {
        let err = Config::parse("warehouse:\n  uri: /w\nsilver:\n  sales:\n    table: silver-sales\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTableNameConfig { .. }));
    }

    #[test]
    fn test_unknown_section_field_rejected() {
        assert!(Config::parse("warehouse:\n  uri: /w\ngold:\n  top: 3\n").is_err());
    }

    #[test]
    fn test_merge_combines_countries_and_overrides_sections() {
        let mut base = Config::parse_yaml("warehouse:\n  uri: /w\ncountries:\n  AUS: [SYD01]\n")
            .unwrap();
        base.merge(
            Config::parse_yaml("countries:\n  NZL: [AKL01]\ngold:\n  top_n: 10\n").unwrap(),
        )
        .unwrap();

        assert_eq!(base.warehouse.uri, "/w");
        assert_eq!(base.countries.len(), 2);
        assert_eq!(base.gold.top_n, 10);

        let duplicate = Config::parse_yaml("countries:\n  AUS: [MEL01]\n").unwrap();
        assert!(base.merge(duplicate).is_err());
    }

    #[test]
    fn test_stage_selection() {
        assert!(Stage::All.includes_silver() && Stage::All.includes_gold());
        assert!(!Stage::Gold.includes_silver());
        assert!(!Stage::Silver.includes_gold());
    }
}
