//! Best customers of each store.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::records::{CustomerSpend, TopCustomer};

/// Competition ranks of values already sorted best first: `[50, 40, 40, 30]`
/// ranks as `[1, 2, 2, 4]`.
pub fn competition_ranks<T: PartialEq>(sorted: &[T]) -> Vec<u64> {
    let mut ranks: Vec<u64> = Vec::with_capacity(sorted.len());
    for (position, value) in sorted.iter().enumerate() {
        let rank = match ranks.last() {
            Some(previous) if sorted[position - 1] == *value => *previous,
            _ => position as u64 + 1,
        };
        ranks.push(rank);
    }
    ranks
}

/// Highest spend first, null spend last.
fn by_spend_desc(a: &CustomerSpend, b: &CustomerSpend) -> Ordering {
    match (a.total_spend, b.total_spend) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Rank customers within each store by spend and keep ranks up to `top_n`.
///
/// Tied customers share a rank, so a store can return more than `top_n` rows.
pub fn top_customers(spend: &[CustomerSpend], top_n: u64) -> Vec<TopCustomer> {
    let mut stores: BTreeMap<Option<&str>, Vec<&CustomerSpend>> = BTreeMap::new();
    for customer in spend {
        stores
            .entry(customer.store_id.as_deref())
            .or_default()
            .push(customer);
    }

    let mut ranked = Vec::new();
    for (_, mut customers) in stores {
        customers.sort_by(|a, b| {
            by_spend_desc(a, b).then_with(|| a.unique_customer_id.cmp(&b.unique_customer_id))
        });
        let spends: Vec<Option<f64>> = customers.iter().map(|c| c.total_spend).collect();

        ranked.extend(
            customers
                .into_iter()
                .zip(competition_ranks(&spends))
                .take_while(|(_, rank)| *rank <= top_n)
                .map(|(customer, rank)| TopCustomer {
                    store_id: customer.store_id.clone(),
                    unique_customer_id: customer.unique_customer_id.clone(),
                    customer_name: customer.name.clone(),
                    customer_spend: customer.total_spend,
                    customer_rank: rank,
                }),
        );
    }
    ranked
}
