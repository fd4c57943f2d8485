//! Spend per customer and store.

use std::collections::{BTreeMap, HashMap};

use medallion_core::table::Row;

use crate::records::{CustomerSpend, SaleItemRecord, SaleRecord};
use crate::silver::dimensions::CUSTOMER_UNIQUE_ID;
use crate::values::text;

/// Customer name column of `dim_customers`.
pub const CUSTOMER_NAME: &str = "name";

/// `sale_items ⋈ sales ⋈ customers`, grouped by store and customer.
///
/// Sales without a customer, or whose customer is not in the dimension, are
/// left out.
pub fn customer_spend(
    sales: &[SaleRecord],
    items: &[SaleItemRecord],
    customers: &[Row],
) -> Vec<CustomerSpend> {
    let buyers: HashMap<&str, &str> = sales
        .iter()
        .filter_map(|sale| Some((sale.id.as_str(), sale.unique_customer_id.as_deref()?)))
        .collect();

    let mut names: HashMap<String, Vec<Option<String>>> = HashMap::new();
    for customer in customers {
        if let Some(unique_id) = text(customer, CUSTOMER_UNIQUE_ID) {
            names
                .entry(unique_id)
                .or_default()
                .push(text(customer, CUSTOMER_NAME));
        }
    }

    let mut groups: BTreeMap<(Option<String>, String, Option<String>), Option<f64>> =
        BTreeMap::new();
    for item in items {
        let Some(buyer) = buyers.get(item.sale_id.as_str()) else {
            continue;
        };
        let Some(matches) = names.get(*buyer) else {
            continue;
        };

        for name in matches {
            let total = groups
                .entry((item.store_id.clone(), buyer.to_string(), name.clone()))
                .or_default();
            if let Some(cost) = item.product_cost {
                *total.get_or_insert(0.0) += cost;
            }
        }
    }

    groups
        .into_iter()
        .map(|((store_id, unique_customer_id, name), total_spend)| CustomerSpend {
            store_id,
            unique_customer_id,
            name,
            total_spend,
        })
        .collect()
}
