//! Typed rows of the silver and gold tables.

use serde::{Deserialize, Serialize};

use medallion_core::table::{ColumnType, TableRecord, TableSchema};

/// The latest version of one sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: String,
    /// Event time, `yyyy-MM-dd HH:mm:ss` UTC.
    pub ts: Option<String>,
    pub store_id: Option<String>,
    pub customer_id: Option<String>,
    /// `store_id-customer_id`, matching `dim_customers.unique_id`.
    pub unique_customer_id: Option<String>,
    pub order_source: Option<String>,
    pub order_state: Option<String>,
    /// Line items as JSON text.
    pub sale_items: Option<String>,
    pub row_hash: String,
}

impl TableRecord for SaleRecord {
    fn schema() -> TableSchema {
        TableSchema::of(&[
            ("id", ColumnType::String),
            ("ts", ColumnType::String),
            ("store_id", ColumnType::String),
            ("customer_id", ColumnType::String),
            ("unique_customer_id", ColumnType::String),
            ("order_source", ColumnType::String),
            ("order_state", ColumnType::String),
            ("sale_items", ColumnType::String),
            ("row_hash", ColumnType::String),
        ])
    }
}

/// One line item of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItemRecord {
    /// `sale_id-item_number`.
    pub id: String,
    pub sale_id: String,
    pub store_id: Option<String>,
    /// Zero-based position in the sale.
    pub item_number: u64,
    pub product_id: Option<String>,
    pub product_size: Option<String>,
    pub product_notes: Option<String>,
    pub product_cost: Option<f64>,
    pub product_ingredients: Option<Vec<String>>,
    pub row_hash: String,
}

impl TableRecord for SaleItemRecord {
    fn schema() -> TableSchema {
        TableSchema::of(&[
            ("id", ColumnType::String),
            ("sale_id", ColumnType::String),
            ("store_id", ColumnType::String),
            ("item_number", ColumnType::Long),
            ("product_id", ColumnType::String),
            ("product_size", ColumnType::String),
            ("product_notes", ColumnType::String),
            ("product_cost", ColumnType::Double),
            ("product_ingredients", ColumnType::StringList),
            ("row_hash", ColumnType::String),
        ])
    }
}

/// Sales of one country in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountrySales {
    pub country_code: Option<String>,
    /// `yyyy-MM`.
    pub sales_month: Option<String>,
    pub total_sales: Option<f64>,
    pub number_of_sales: u64,
}

impl TableRecord for CountrySales {
    fn schema() -> TableSchema {
        TableSchema::of(&[
            ("country_code", ColumnType::String),
            ("sales_month", ColumnType::String),
            ("total_sales", ColumnType::Double),
            ("number_of_sales", ColumnType::Long),
        ])
    }
}

/// Total spend of one customer at one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSpend {
    pub store_id: Option<String>,
    pub unique_customer_id: String,
    pub name: Option<String>,
    pub total_spend: Option<f64>,
}

impl TableRecord for CustomerSpend {
    fn schema() -> TableSchema {
        TableSchema::of(&[
            ("store_id", ColumnType::String),
            ("unique_customer_id", ColumnType::String),
            ("name", ColumnType::String),
            ("total_spend", ColumnType::Double),
        ])
    }
}

/// A customer ranked within their store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCustomer {
    pub store_id: Option<String>,
    pub unique_customer_id: String,
    pub customer_name: Option<String>,
    pub customer_spend: Option<f64>,
    /// Competition rank: ties share a rank and leave a gap after them.
    pub customer_rank: u64,
}

impl TableRecord for TopCustomer {
    fn schema() -> TableSchema {
        TableSchema::of(&[
            ("store_id", ColumnType::String),
            ("unique_customer_id", ColumnType::String),
            ("customer_name", ColumnType::String),
            ("customer_spend", ColumnType::Double),
            ("customer_rank", ColumnType::Long),
        ])
    }
}
