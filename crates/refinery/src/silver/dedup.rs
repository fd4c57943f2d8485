//! Latest version of each sale.
//!
//! Raw rows are grouped by business key. Within a key the row with the
//! greatest recency value wins, a missing recency ranking lowest. Among rows
//! with equal recency the one read later wins, so a re-export replaces the
//! earlier copy.

use indexmap::IndexMap;

use medallion_core::table::Row;

use crate::config::SaleColumns;
use crate::hash::row_hash;
use crate::records::SaleRecord;
use crate::values::{composite_key, epoch_to_timestamp, number_of, text, text_of};

/// Result of deduplicating a raw sales table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    /// One record per key, ordered by key.
    pub sales: Vec<SaleRecord>,
    /// Rows that lost to a more recent row with the same key.
    pub discarded: u64,
    /// Keys whose winner shared its recency with another row.
    pub ambiguous: u64,
    /// Rows without a key.
    pub missing_key: u64,
}

struct Candidate {
    index: usize,
    recency: Option<f64>,
    tied: bool,
}

/// Select the latest raw row per key and project it to a [`SaleRecord`].
///
/// `rows` must be in ingestion order.
pub fn dedup_sales(rows: &[Row], columns: &SaleColumns) -> DedupOutcome {
    let mut outcome = DedupOutcome::default();
    let mut winners: IndexMap<String, Candidate> = IndexMap::new();

    for (index, row) in rows.iter().enumerate() {
        let Some(key) = text(row, &columns.id) else {
            outcome.missing_key += 1;
            continue;
        };
        let recency = number_of(row.get(&columns.recency));

        match winners.get_mut(&key) {
            None => {
                winners.insert(
                    key,
                    Candidate {
                        index,
                        recency,
                        tied: false,
                    },
                );
            }
            Some(best) => {
                outcome.discarded += 1;
                match recency.partial_cmp(&best.recency) {
                    Some(std::cmp::Ordering::Greater) => {
                        *best = Candidate {
                            index,
                            recency,
                            tied: false,
                        };
                    }
                    Some(std::cmp::Ordering::Equal) => {
                        best.index = index;
                        best.tied = true;
                    }
                    _ => {}
                }
            }
        }
    }

    winners.sort_keys();
    outcome.ambiguous = winners.values().filter(|c| c.tied).count() as u64;
    outcome.sales = winners
        .into_iter()
        .map(|(key, candidate)| normalize(key, &rows[candidate.index], columns))
        .collect();
    outcome
}

/// Rename and cast one raw row into the silver schema.
fn normalize(id: String, row: &Row, columns: &SaleColumns) -> SaleRecord {
    let store_id = text(row, &columns.store_id);
    let customer_id = text(row, &columns.customer_id);
    let unique_customer_id = composite_key(store_id.as_deref(), customer_id.as_deref());

    let mut sale = SaleRecord {
        id,
        ts: epoch_to_timestamp(row.get(&columns.ts)),
        store_id,
        customer_id,
        unique_customer_id,
        order_source: text(row, &columns.order_source),
        order_state: text(row, &columns.order_state),
        sale_items: text_of(row.get(&columns.sale_items)),
        row_hash: String::new(),
    };
    sale.row_hash = sale_hash(&sale);
    sale
}

fn sale_hash(sale: &SaleRecord) -> String {
    row_hash(&[
        Some(sale.id.as_str()),
        sale.ts.as_deref(),
        sale.store_id.as_deref(),
        sale.customer_id.as_deref(),
        sale.unique_customer_id.as_deref(),
        sale.order_source.as_deref(),
        sale.order_state.as_deref(),
        sale.sale_items.as_deref(),
    ])
}
