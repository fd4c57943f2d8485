//! Exploding a sale's line items into one row per item.

use serde_json::{Map, Value};

use medallion_core::metrics::events::FailureStage;
use medallion_core::rescue::RescuedRecord;

use crate::hash::row_hash;
use crate::records::{SaleItemRecord, SaleRecord};
use crate::values::{number_of, text_of};

/// A `sale_items` payload that could not be read as a list of items.
///
/// The sale itself is kept; it simply has no item rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedPayload {
    pub sale_id: String,
    pub reason: String,
    pub raw_payload: String,
}

impl MalformedPayload {
    pub fn into_record(self, field: &str) -> RescuedRecord {
        RescuedRecord::new(
            FailureStage::Expand,
            format!("sale '{}': {}", self.sale_id, self.reason),
            self.raw_payload,
        )
        .with_field(field)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandOutcome {
    pub items: Vec<SaleItemRecord>,
    pub malformed: Vec<MalformedPayload>,
}

/// One [`SaleItemRecord`] per element of every sale's items, numbered from zero.
pub fn expand_items(sales: &[SaleRecord]) -> ExpandOutcome {
    let mut outcome = ExpandOutcome::default();

    for sale in sales {
        let Some(payload) = &sale.sale_items else {
            continue;
        };
        match parse_items(payload) {
            Ok(elements) => outcome.items.extend(
                elements
                    .iter()
                    .enumerate()
                    .map(|(position, item)| item_record(sale, position as u64, item)),
            ),
            Err(reason) => outcome.malformed.push(MalformedPayload {
                sale_id: sale.id.clone(),
                reason,
                raw_payload: payload.clone(),
            }),
        }
    }
    outcome
}

fn parse_items(payload: &str) -> Result<Vec<Map<String, Value>>, String> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| format!("invalid JSON: {e}"))?;

    let elements = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(elements) => elements,
        other => return Err(format!("expected an array of items, found {}", kind(&other))),
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(position, element)| match element {
            Value::Object(item) => Ok(item),
            other => Err(format!("item {position} is {}, not an object", kind(&other))),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn item_record(sale: &SaleRecord, item_number: u64, item: &Map<String, Value>) -> SaleItemRecord {
    let ingredients = match item.get("ingredients") {
        Some(Value::Array(values)) => Some(
            values
                .iter()
                .filter_map(|value| text_of(Some(value)))
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };

    let mut record = SaleItemRecord {
        id: format!("{}-{}", sale.id, item_number),
        sale_id: sale.id.clone(),
        store_id: sale.store_id.clone(),
        item_number,
        product_id: text_of(item.get("id")),
        product_size: text_of(item.get("size")),
        product_notes: text_of(item.get("notes")),
        product_cost: number_of(item.get("cost")),
        product_ingredients: ingredients,
        row_hash: String::new(),
    };
    record.row_hash = item_hash(&record);
    record
}

fn item_hash(item: &SaleItemRecord) -> String {
    let item_number = item.item_number.to_string();
    let cost = item.product_cost.map(|cost| cost.to_string());
    let ingredients = item.product_ingredients.as_ref().map(|list| list.join(","));
    row_hash(&[
        Some(item.id.as_str()),
        Some(item.sale_id.as_str()),
        item.store_id.as_deref(),
        Some(item_number.as_str()),
        item.product_id.as_deref(),
        item.product_size.as_deref(),
        item.product_notes.as_deref(),
        cost.as_deref(),
        ingredients.as_deref(),
    ])
}
