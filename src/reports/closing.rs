//! Daily closing sheet for one division: cumulative sales by closing category, collections
//! by method, stock movement in drums and the day's flagship volume.

use super::ReportEngine;
use crate::aggregator::Aggregator;
use crate::classifier::{Classifier, ClosingParty, ClosingSide, CollectionMethod};
use crate::error::Result;
use crate::impl_measures;
use crate::normalizer::to_drums;
use crate::records::{DepositLine, NoteLine, PurchaseLine, SaleLine};
use crate::scope::DivisionScope;
use crate::source::{DateFilter, QueryExecutor};
use futures::try_join;
use log::info;
use serde::Serialize;
use std::cmp::Ordering;

/// Where a row's date falls relative to the report day. Rows after the day are dropped.
fn position(row_date: &str, date: &str) -> Option<Ordering> {
    let row_date = row_date.trim();
    if row_date.is_empty() {
        return None;
    }
    match row_date.cmp(date) {
        Ordering::Greater => None,
        ordering => Some(ordering),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Running {
    prev: f64,
    today: f64,
    total: f64,
    weight_today: f64,
}

impl_measures!(Running {
    prev,
    today,
    total,
    weight_today
});

impl Running {
    fn at(ordering: Ordering, amount: f64, weight: f64) -> Self {
        let today = ordering == Ordering::Equal;
        Running {
            prev: if today { 0.0 } else { amount },
            today: if today { amount } else { 0.0 },
            total: amount,
            weight_today: if today { weight } else { 0.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StockFlow {
    prev: f64,
    inflow: f64,
    outflow: f64,
    stock: f64,
}

impl_measures!(StockFlow {
    prev,
    inflow,
    outflow,
    stock
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesClosingRow {
    pub category: String,
    pub prev_total: f64,
    pub today: f64,
    pub total: f64,
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionClosingRow {
    pub method: String,
    pub prev_total: f64,
    pub today: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryClosingRow {
    pub category: String,
    pub unit: String,
    pub prev_stock: f64,
    #[serde(rename = "in")]
    pub inflow: f64,
    #[serde(rename = "out")]
    pub outflow: f64,
    pub stock: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagshipVolume {
    pub sales_vol: f64,
    pub purchase_vol: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyClosingReport {
    pub sales_data: Vec<SalesClosingRow>,
    pub collection_data: Vec<CollectionClosingRow>,
    pub inventory_data: Vec<InventoryClosingRow>,
    pub flagship: FlagshipVolume,
    pub date: String,
    pub division: String,
}

fn remarks(today: f64, weight_dm: f64) -> String {
    if today > 0.0 || weight_dm > 0.0 {
        format!("{:.2} D/M", weight_dm)
    } else {
        "-".to_string()
    }
}

/// Rows may span any dates; anything after `date` is ignored.
pub fn build_daily_closing(
    classifier: &Classifier<'_>,
    date: &str,
    scope: &DivisionScope,
    sales: &[SaleLine],
    purchases: &[PurchaseLine],
    deposits: &[DepositLine],
    notes: &[NoteLine],
) -> DailyClosingReport {
    let rules = classifier.rules();
    let kg_per_drum = rules.kg_per_drum;
    let sales: Vec<&SaleLine> = sales
        .iter()
        .filter(|s| scope.matches_sale(classifier, s))
        .collect();
    let purchases: Vec<&PurchaseLine> = purchases
        .iter()
        .filter(|p| scope.matches_purchase(classifier, p))
        .collect();

    let mut sales_by_category: Aggregator<&str, Running> = Aggregator::new();
    let mut stock_by_category: Aggregator<&str, StockFlow> = Aggregator::new();
    let mut flagship = FlagshipVolume::default();

    for sale in &sales {
        let Some(ordering) = position(&sale.date, date) else {
            continue;
        };
        let sales_match =
            classifier.closing_category(
                ClosingSide::Sales,
                ClosingParty::Customer(&sale.customer),
                &sale.group1,
                &sale.warehouse,
            );
        let amount = if sales_match.zero_amount { 0.0 } else { sale.total };
        sales_by_category.add(sales_match.label, Running::at(ordering, amount, sale.weight));

        let stock_match = classifier.closing_category(
            ClosingSide::Inventory,
            ClosingParty::Customer(&sale.customer),
            &sale.group1,
            &sale.warehouse,
        );
        let drums = to_drums(sale.weight, kg_per_drum);
        stock_by_category.add(
            stock_match.label,
            StockFlow {
                prev: if ordering == Ordering::Less { -drums } else { 0.0 },
                inflow: 0.0,
                outflow: if ordering == Ordering::Equal { drums } else { 0.0 },
                stock: -drums,
            },
        );

        if ordering == Ordering::Equal && classifier.is_flagship(&sale.group3) {
            flagship.sales_vol += sale.weight;
        }
    }

    for purchase in &purchases {
        let Some(ordering) = position(&purchase.date, date) else {
            continue;
        };
        let stock_match = classifier.closing_category(
            ClosingSide::Inventory,
            ClosingParty::Supplier(&purchase.supplier),
            &purchase.group1,
            &purchase.warehouse,
        );
        let drums = to_drums(purchase.weight, kg_per_drum);
        stock_by_category.add(
            stock_match.label,
            StockFlow {
                prev: if ordering == Ordering::Less { drums } else { 0.0 },
                inflow: if ordering == Ordering::Equal { drums } else { 0.0 },
                outflow: 0.0,
                stock: drums,
            },
        );

        if ordering == Ordering::Equal && classifier.is_flagship(&purchase.group3) {
            flagship.purchase_vol += purchase.weight;
        }
    }

    let collection = &rules.collection;
    let mut by_method: Aggregator<&str, Running> = Aggregator::new();
    for deposit in deposits {
        if !classifier.is_receivable(&deposit.account)
            || !scope.matches_text(classifier, &deposit.department)
        {
            continue;
        }
        let Some(ordering) = position(&deposit.date, date) else {
            continue;
        };
        let method = match classifier.collection_method(&deposit.account_label) {
            CollectionMethod::Cash => collection.cash_label.as_str(),
            CollectionMethod::Card => collection.card_label.as_str(),
        };
        by_method.add(method, Running::at(ordering, deposit.amount, 0.0));
    }
    for note in notes {
        if !classifier.is_note_increase(&note.direction)
            || !scope.matches_text(classifier, &note.department)
        {
            continue;
        }
        if let Some(ordering) = position(&note.date, date) {
            by_method.add(
                collection.note_label.as_str(),
                Running::at(ordering, note.increase, 0.0),
            );
        }
    }

    let sales_data = classifier
        .closing_labels(ClosingSide::Sales)
        .into_iter()
        .map(|label| {
            let r = sales_by_category.get(&label).copied().unwrap_or_default();
            SalesClosingRow {
                category: label.to_string(),
                prev_total: r.prev,
                today: r.today,
                total: r.total,
                remarks: remarks(r.today, to_drums(r.weight_today, kg_per_drum)),
            }
        })
        .collect();

    let collection_data = [
        collection.cash_label.as_str(),
        collection.note_label.as_str(),
        collection.card_label.as_str(),
    ]
    .into_iter()
    .map(|method| {
        let r = by_method.get(&method).copied().unwrap_or_default();
        CollectionClosingRow {
            method: method.to_string(),
            prev_total: r.prev,
            today: r.today,
            total: r.total,
        }
    })
    .collect();

    let inventory_data = classifier
        .closing_labels(ClosingSide::Inventory)
        .into_iter()
        .map(|label| {
            let r = stock_by_category.get(&label).copied().unwrap_or_default();
            InventoryClosingRow {
                category: label.to_string(),
                unit: "D/M".to_string(),
                prev_stock: r.prev,
                inflow: r.inflow,
                outflow: r.outflow,
                stock: r.stock,
            }
        })
        .collect();

    DailyClosingReport {
        sales_data,
        collection_data,
        inventory_data,
        flagship,
        date: date.to_string(),
        division: scope.label().to_string(),
    }
}

impl<E: QueryExecutor> ReportEngine<E> {
    pub async fn daily_closing(&self, date: &str, division: &str) -> Result<DailyClosingReport> {
        info!("Building daily closing for {} ({})", date, division);
        let up_to = || DateFilter::OnOrBefore(date.to_string());

        let (sales, purchases, deposits, notes) = try_join!(
            self.fetch::<SaleLine>(up_to()),
            self.fetch::<PurchaseLine>(up_to()),
            self.fetch::<DepositLine>(up_to()),
            self.fetch::<NoteLine>(up_to()),
        )?;

        let classifier = self.classifier();
        let scope = DivisionScope::resolve(&classifier, division);
        Ok(build_daily_closing(
            &classifier,
            date,
            &scope,
            &sales,
            &purchases,
            &deposits,
            &notes,
        ))
    }
}
