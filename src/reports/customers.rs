//! Per-customer receivable movement for one day within a division: balance carried in from
//! the ledger, the day's sales and collections, and the resulting balance.

use super::ReportEngine;
use crate::aggregator::Aggregator;
use crate::classifier::Classifier;
use crate::error::Result;
use crate::normalizer::{storage_date_prefix, to_storage_date};
use crate::records::{DepositLine, LedgerEntry, SaleLine};
use crate::scope::DivisionScope;
use crate::source::{DateFilter, QueryExecutor};
use futures::try_join;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerBalanceRow {
    pub customer: String,
    pub prev_balance: f64,
    pub sales_amount: f64,
    pub collection_amount: f64,
    pub current_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetailReport {
    pub data: Vec<CustomerBalanceRow>,
    pub date: String,
    pub division: String,
}

/// Customer code, or the name when the row carries no code.
fn customer_key(code: &str, name: &str) -> String {
    if code.is_empty() {
        name.to_string()
    } else {
        code.to_string()
    }
}

/// The customer set comes from in-scope sales and deposits dated on or before `date`. The
/// day's amounts and the carried balance are then looked up per customer across all
/// divisions. `ledger` entries dated on or after `date` are ignored.
pub fn build_customer_detail(
    classifier: &Classifier<'_>,
    date: &str,
    scope: &DivisionScope,
    sales: &[SaleLine],
    deposits: &[DepositLine],
    ledger: &[LedgerEntry],
) -> CustomerDetailReport {
    let mut customers: BTreeMap<String, String> = BTreeMap::new();
    let scoped_sales = sales
        .iter()
        .filter(|s| s.date.as_str() <= date && scope.matches_sale(classifier, s))
        .map(|s| (customer_key(&s.customer_code, &s.customer), &s.customer));
    let scoped_deposits = deposits
        .iter()
        .filter(|d| d.date.as_str() <= date && scope.matches_text(classifier, &d.department))
        .map(|d| (customer_key(&d.customer_code, &d.customer), &d.customer));
    for (key, name) in scoped_sales.chain(scoped_deposits) {
        let slot = customers.entry(key).or_default();
        if slot.is_empty() {
            slot.clone_from(name);
        }
    }

    let day_sales: Aggregator<String, f64> = sales
        .iter()
        .filter(|s| s.date == date)
        .map(|s| (customer_key(&s.customer_code, &s.customer), s.total))
        .collect();
    let day_collections: Aggregator<String, f64> = deposits
        .iter()
        .filter(|d| d.date == date)
        .map(|d| (customer_key(&d.customer_code, &d.customer), d.amount))
        .collect();

    let cutoff = to_storage_date(date);
    let carried: Aggregator<String, f64> = ledger
        .iter()
        .filter(|e| !e.customer_code.is_empty() && storage_date_prefix(&e.date) < cutoff.as_str())
        .map(|e| (e.customer_code.clone(), e.debit - e.credit))
        .collect();

    debug!(
        "Customer detail: {} customers in scope, {} with ledger history",
        customers.len(),
        carried.len()
    );

    let mut data: Vec<CustomerBalanceRow> = customers
        .into_iter()
        .map(|(key, customer)| {
            let prev_balance = carried.get(&key).copied().unwrap_or_default();
            let sales_amount = day_sales.get(&key).copied().unwrap_or_default();
            let collection_amount = day_collections.get(&key).copied().unwrap_or_default();
            CustomerBalanceRow {
                customer,
                prev_balance,
                sales_amount,
                collection_amount,
                current_balance: prev_balance + sales_amount - collection_amount,
            }
        })
        .filter(|r| r.prev_balance != 0.0 || r.sales_amount != 0.0 || r.collection_amount != 0.0)
        .collect();

    data.sort_by(|a, b| {
        b.sales_amount
            .total_cmp(&a.sales_amount)
            .then_with(|| b.collection_amount.total_cmp(&a.collection_amount))
            .then_with(|| a.customer.cmp(&b.customer))
    });

    CustomerDetailReport {
        data,
        date: date.to_string(),
        division: scope.label().to_string(),
    }
}

impl<E: QueryExecutor> ReportEngine<E> {
    pub async fn customer_detail(&self, date: &str, division: &str) -> Result<CustomerDetailReport> {
        info!("Building customer detail for {} ({})", date, division);
        let (sales, deposits, ledger) = try_join!(
            self.fetch::<SaleLine>(DateFilter::OnOrBefore(date.to_string())),
            self.fetch::<DepositLine>(DateFilter::OnOrBefore(date.to_string())),
            self.fetch::<LedgerEntry>(DateFilter::Before(date.to_string())),
        )?;

        let classifier = self.classifier();
        let scope = DivisionScope::resolve(&classifier, division);
        Ok(build_customer_detail(
            &classifier,
            date,
            &scope,
            &sales,
            &deposits,
            &ledger,
        ))
    }
}
