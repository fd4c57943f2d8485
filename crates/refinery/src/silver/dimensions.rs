//! Reference tables rebuilt from their bronze exports on every run.

use serde_json::Value;
use snafu::ensure;

use medallion_core::table::{ColumnType, Row, TableSchema};

use crate::config::CountryMap;
use crate::error::{MissingColumnSnafu, RefineError};
use crate::values::{composite_key, text};

/// Store code column of the locations export.
pub const LOCATION_ID: &str = "id";
pub const COUNTRY_CODE: &str = "country_code";

/// Customer number column, unique only within a store.
pub const CUSTOMER_ID: &str = "id";
pub const CUSTOMER_STORE: &str = "store_id";
/// Customer key unique across stores.
pub const CUSTOMER_UNIQUE_ID: &str = "unique_id";

/// Rows of a dimension together with their schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimension {
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

impl Dimension {
    pub fn new(schema: TableSchema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    fn require(&self, table: &str, column: &str) -> Result<(), RefineError> {
        ensure!(
            self.schema.column(column).is_some(),
            MissingColumnSnafu { table, column }
        );
        Ok(())
    }

    fn with_column<F>(mut self, name: &str, mut derive: F) -> Self
    where
        F: FnMut(&Row) -> Option<String>,
    {
        for row in &mut self.rows {
            let value = derive(row).map_or(Value::Null, Value::String);
            row.insert(name.to_string(), value);
        }
        match self.schema.column_mut(name) {
            Some(column) => column.column_type = ColumnType::String,
            None => self.schema.ensure(name, ColumnType::String),
        }
        self
    }
}

/// Locations with the country of each store. Unknown stores get a null country.
pub fn build_locations(
    source: &str,
    stores: Dimension,
    countries: &CountryMap,
) -> Result<Dimension, RefineError> {
    stores.require(source, LOCATION_ID)?;
    Ok(stores.with_column(COUNTRY_CODE, |row| {
        text(row, LOCATION_ID)
            .and_then(|store| countries.country_of(&store).map(str::to_string))
    }))
}

/// Customers keyed by `store_id-id`.
pub fn build_customers(source: &str, customers: Dimension) -> Result<Dimension, RefineError> {
    customers.require(source, CUSTOMER_ID)?;
    customers.require(source, CUSTOMER_STORE)?;
    Ok(customers.with_column(CUSTOMER_UNIQUE_ID, |row| {
        composite_key(
            text(row, CUSTOMER_STORE).as_deref(),
            text(row, CUSTOMER_ID).as_deref(),
        )
    }))
}

/// Products are copied as exported.
pub fn build_products(products: Dimension) -> Dimension {
    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dimension(columns: &[(&str, ColumnType)], rows: Vec<Value>) -> Dimension {
        Dimension::new(
            TableSchema::of(columns),
            rows.into_iter()
                .map(|v| v.as_object().cloned().unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_locations_get_country_code() {
        let stores = dimension(
            &[("id", ColumnType::String), ("name", ColumnType::String)],
            vec![
                json!({"id": "SYD01", "name": "Sydney"}),
                json!({"id": "AKL02", "name": "Auckland"}),
                json!({"id": "LON01", "name": "London"}),
            ],
        );
        let dim = build_locations("stores", stores, &CountryMap::builtin()).unwrap();

        let countries: Vec<&Value> = dim.rows.iter().map(|r| &r["country_code"]).collect();
        assert_eq!(countries, vec![&json!("AUS"), &json!("NZL"), &Value::Null]);
        assert_eq!(
            dim.schema.column("country_code").unwrap().column_type,
            ColumnType::String
        );
        assert_eq!(dim.schema.len(), 3);
    }

    #[test]
    fn test_customers_get_unique_id_from_inferred_numbers() {
        let customers = dimension(
            &[
                ("id", ColumnType::Long),
                ("store_id", ColumnType::String),
                ("name", ColumnType::String),
            ],
            vec![
                json!({"id": 7, "store_id": "SYD01", "name": "Ada"}),
                json!({"id": 8, "store_id": null, "name": "Bob"}),
            ],
        );
        let dim = build_customers("customers", customers).unwrap();

        assert_eq!(dim.rows[0]["unique_id"], json!("SYD01-7"));
        assert_eq!(dim.rows[1]["unique_id"], Value::Null);
        assert_eq!(dim.rows[0]["id"], json!(7));
    }

    #[test]
    fn test_missing_key_column_is_an_error() {
        let customers = dimension(&[("name", ColumnType::String)], vec![json!({"name": "Ada"})]);
        let err = build_customers("customers", customers).unwrap_err();
        assert!(matches!(err, RefineError::MissingColumn { ref column, .. } if column == "id"));
    }

    #[test]
    fn test_existing_derived_column_is_replaced() {
        let stores = dimension(
            &[("id", ColumnType::String), ("country_code", ColumnType::Long)],
            vec![json!({"id": "PER01", "country_code": 61})],
        );
        let dim = build_locations("stores", stores, &CountryMap::builtin()).unwrap();
        assert_eq!(dim.rows[0]["country_code"], json!("AUS"));
        assert_eq!(
            dim.schema.column("country_code").unwrap().column_type,
            ColumnType::String
        );
    }
}
