//! Sales per country and calendar month.

use std::collections::{BTreeMap, HashMap, HashSet};

use medallion_core::table::Row;

use crate::records::{CountrySales, SaleItemRecord, SaleRecord};
use crate::silver::dimensions::{COUNTRY_CODE, LOCATION_ID};
use crate::values::text;

#[derive(Default)]
struct Totals<'a> {
    total: Option<f64>,
    sales: HashSet<&'a str>,
}

/// `sale_items ⋈ sales ⋈ locations`, grouped by country and `yyyy-MM` of the sale.
///
/// Items whose sale or store is unknown drop out of the join. Null costs are
/// ignored by the sum; a group with only null costs has a null total.
pub fn country_sales(
    sales: &[SaleRecord],
    items: &[SaleItemRecord],
    locations: &[Row],
) -> Vec<CountrySales> {
    let months: HashMap<&str, Option<&str>> = sales
        .iter()
        .map(|sale| (sale.id.as_str(), sale.ts.as_deref().and_then(|ts| ts.get(..7))))
        .collect();

    let mut countries: HashMap<String, Vec<Option<String>>> = HashMap::new();
    for location in locations {
        if let Some(store) = text(location, LOCATION_ID) {
            countries
                .entry(store)
                .or_default()
                .push(text(location, COUNTRY_CODE));
        }
    }

    let mut groups: BTreeMap<(Option<String>, Option<String>), Totals<'_>> = BTreeMap::new();
    for item in items {
        let Some(month) = months.get(item.sale_id.as_str()) else {
            continue;
        };
        let Some(store_countries) = item.store_id.as_ref().and_then(|s| countries.get(s)) else {
            continue;
        };

        for country in store_countries {
            let totals = groups
                .entry((country.clone(), month.map(str::to_string)))
                .or_default();
            if let Some(cost) = item.product_cost {
                *totals.total.get_or_insert(0.0) += cost;
            }
            totals.sales.insert(item.sale_id.as_str());
        }
    }

    groups
        .into_iter()
        .map(|((country_code, sales_month), totals)| CountrySales {
            country_code,
            sales_month,
            total_sales: totals.total,
            number_of_sales: totals.sales.len() as u64,
        })
        .collect()
}
