//! Stock overview: item sales by division, stock on hand by warehouse, open sales and
//! purchase orders, and the filter choices (warehouses, divisions, months).

use super::ReportEngine;
use crate::aggregator::Aggregator;
use crate::classifier::Classifier;
use crate::error::Result;
use crate::impl_measures;
use crate::normalizer::month_of;
use crate::records::{PendingPurchase, PendingSale, SaleLine, StockLine};
use crate::scope::DivisionScope;
use crate::source::{DateFilter, QueryExecutor};
use futures::try_join;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeSet;

const MONTH_CHOICES: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSalesRow {
    pub item_code: String,
    pub item_name: String,
    pub division: String,
    pub sold_qty: f64,
    pub sold_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItemRow {
    pub item_code: String,
    pub item_name: String,
    pub warehouse: String,
    pub stock_qty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSaleRow {
    pub item_code: String,
    pub item_name: String,
    pub customer: String,
    pub remaining_qty: f64,
    pub supply_amount: f64,
    pub due_date: String,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPurchaseRow {
    pub item_code: String,
    pub item_name: String,
    pub supplier: String,
    pub remaining_qty: f64,
    pub outstanding_total: f64,
    pub due_date: String,
    pub warehouse: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockOverviewReport {
    pub sales_by_item: Vec<ItemSalesRow>,
    pub inventory_by_item: Vec<StockItemRow>,
    pub pending_sales: Vec<PendingSaleRow>,
    pub pending_purchases: Vec<PendingPurchaseRow>,
    pub warehouses: Vec<String>,
    pub divisions: Vec<String>,
    pub months: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ItemSales {
    qty: f64,
    amount: f64,
}

impl_measures!(ItemSales { qty, amount });

/// Sales by item and division. The whole-company scope keeps every row, including rows the
/// branch-inclusion filter would drop; any other scope keeps rows whose classified branch
/// equals the scope label.
pub fn item_sales(
    classifier: &Classifier<'_>,
    scope: &DivisionScope,
    month: Option<&str>,
    sales: &[SaleLine],
) -> Vec<ItemSalesRow> {
    let grouped: Aggregator<(String, String, String), ItemSales> = sales
        .iter()
        .filter(|s| month.map_or(true, |m| month_of(&s.date) == m))
        .filter_map(|s| {
            let division = classifier.classify_branch(&s.branch_text);
            let keep = match scope {
                DivisionScope::WholeCompany => true,
                _ => division == scope.label(),
            };
            keep.then(|| {
                (
                    (s.item_code.clone(), s.item_name.clone(), division),
                    ItemSales {
                        qty: s.quantity,
                        amount: s.total,
                    },
                )
            })
        })
        .collect();

    let mut rows: Vec<ItemSalesRow> = grouped
        .into_map()
        .into_iter()
        .map(|((item_code, item_name, division), m)| ItemSalesRow {
            item_code,
            item_name,
            division,
            sold_qty: m.qty,
            sold_amount: m.amount,
        })
        .collect();
    // The map already orders equal quantities by (code, name, division); the sort is stable.
    rows.sort_by(|a, b| b.sold_qty.total_cmp(&a.sold_qty));
    rows
}

/// Stock on hand per item and warehouse, positive quantities only.
pub fn stock_on_hand(stock: &[StockLine]) -> Vec<StockItemRow> {
    let mut rows: Vec<StockItemRow> = stock
        .iter()
        .filter(|s| s.quantity > 0.0)
        .map(|s| StockItemRow {
            item_code: s.item_code.clone(),
            item_name: s.item_name.clone(),
            warehouse: s.warehouse.clone(),
            stock_qty: s.quantity,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.item_code
            .cmp(&b.item_code)
            .then_with(|| a.warehouse.cmp(&b.warehouse))
    });
    rows
}

/// Distinct non-empty sales months, newest first, capped at two years of choices.
pub fn sales_months(sales: &[SaleLine]) -> Vec<String> {
    let months: BTreeSet<&str> = sales
        .iter()
        .map(|s| month_of(&s.date))
        .filter(|m| !m.is_empty())
        .collect();
    months
        .into_iter()
        .rev()
        .take(MONTH_CHOICES)
        .map(str::to_string)
        .collect()
}

pub fn build_stock_overview(
    classifier: &Classifier<'_>,
    scope: &DivisionScope,
    month: Option<&str>,
    sales: &[SaleLine],
    stock: &[StockLine],
    pending_sales: &[PendingSale],
    pending_purchases: &[PendingPurchase],
) -> StockOverviewReport {
    let mut pending_sales: Vec<PendingSaleRow> = pending_sales
        .iter()
        .map(|PendingSale(line)| PendingSaleRow {
            item_code: line.item_code.clone(),
            item_name: line.item_name.clone(),
            customer: line.party.clone(),
            remaining_qty: line.remaining,
            supply_amount: line.amount,
            due_date: line.due_date.clone(),
            memo: line.memo.clone(),
        })
        .collect();
    pending_sales.sort_by(|a, b| a.item_code.cmp(&b.item_code));

    let mut pending_purchases: Vec<PendingPurchaseRow> = pending_purchases
        .iter()
        .map(|PendingPurchase(line)| PendingPurchaseRow {
            item_code: line.item_code.clone(),
            item_name: line.item_name.clone(),
            supplier: line.party.clone(),
            remaining_qty: line.remaining,
            outstanding_total: line.amount,
            due_date: line.due_date.clone(),
            warehouse: line.warehouse.clone(),
        })
        .collect();
    pending_purchases.sort_by(|a, b| a.item_code.cmp(&b.item_code));

    let warehouses: BTreeSet<String> = stock
        .iter()
        .filter(|s| !s.warehouse.is_empty())
        .map(|s| s.warehouse.clone())
        .collect();
    let divisions: BTreeSet<String> = sales
        .iter()
        .filter(|s| !s.branch_text.is_empty())
        .map(|s| classifier.classify_branch(&s.branch_text))
        .filter(|d| !d.is_empty())
        .collect();

    let report = StockOverviewReport {
        sales_by_item: item_sales(classifier, scope, month, sales),
        inventory_by_item: stock_on_hand(stock),
        pending_sales,
        pending_purchases,
        warehouses: warehouses.into_iter().collect(),
        divisions: divisions.into_iter().collect(),
        months: sales_months(sales),
    };
    debug!(
        "Stock overview: {} item/division rows, {} stock rows",
        report.sales_by_item.len(),
        report.inventory_by_item.len()
    );
    report
}

impl<E: QueryExecutor> ReportEngine<E> {
    pub async fn stock_overview(
        &self,
        division: &str,
        month: Option<&str>,
    ) -> Result<StockOverviewReport> {
        info!(
            "Building stock overview for {} ({})",
            division,
            month.unwrap_or("all months")
        );
        let (sales, stock, pending_sales, pending_purchases) = try_join!(
            self.fetch::<SaleLine>(DateFilter::Any),
            self.fetch::<StockLine>(DateFilter::Any),
            self.fetch::<PendingSale>(DateFilter::Any),
            self.fetch::<PendingPurchase>(DateFilter::Any),
        )?;

        let classifier = self.classifier();
        let scope = DivisionScope::resolve(&classifier, division);
        Ok(build_stock_overview(
            &classifier,
            &scope,
            month,
            &sales,
            &stock,
            &pending_sales,
            &pending_purchases,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PendingLine;
    use crate::schema::RuleTables;

    fn sale(date: &str, branch: &str, code: &str, qty: f64) -> SaleLine {
        SaleLine {
            date: date.to_string(),
            branch_text: branch.to_string(),
            customer_code: String::new(),
            customer: String::new(),
            warehouse: String::new(),
            item_code: code.to_string(),
            item_name: format!("{} 20L", code),
            quantity: qty,
            weight: 0.0,
            supply_amount: 0.0,
            total: qty * 100.0,
            group1: String::new(),
            group3: String::new(),
        }
    }

    fn stock(warehouse: &str, code: &str, qty: f64) -> StockLine {
        StockLine {
            warehouse: warehouse.to_string(),
            item_code: code.to_string(),
            item_name: String::new(),
            quantity: qty,
        }
    }

    fn pending(code: &str, party: &str) -> PendingLine {
        PendingLine {
            item_code: code.to_string(),
            item_name: String::new(),
            party: party.to_string(),
            remaining: 3.0,
            amount: 30.0,
            due_date: "2026-02-10".to_string(),
            warehouse: "창원".to_string(),
            memo: String::new(),
        }
    }

    #[test]
    fn test_item_sales_by_division_and_month() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let sales = vec![
            sale("2026-02-01", "창원지사", "A", 2.0),
            sale("2026-02-02", "창원지사", "A", 3.0),
            sale("2026-02-02", "화성지사", "A", 9.0),
            sale("2026-01-30", "창원지사", "B", 7.0),
        ];

        let changwon = DivisionScope::resolve(&c, "창원");
        let rows = item_sales(&c, &changwon, Some("2026-02"), &sales);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].division, "창원");
        assert_eq!(rows[0].sold_qty, 5.0);
        assert_eq!(rows[0].sold_amount, 500.0);

        let all = DivisionScope::resolve(&c, "all");
        let rows = item_sales(&c, &all, None, &sales);
        let keys: Vec<_> = rows
            .iter()
            .map(|r| (r.item_code.as_str(), r.division.as_str()))
            .collect();
        assert_eq!(keys, vec![("A", "화성"), ("B", "창원"), ("A", "창원")]);
    }

    #[test]
    fn test_overview_lists_and_filters() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let sales = vec![
            sale("2026-02-01", "창원지사", "A", 1.0),
            sale("2025-12-01", "본사", "A", 1.0),
            sale("", "", "A", 1.0),
        ];
        let stock = vec![stock("화성", "B", 4.0), stock("창원", "B", 0.0), stock("창원", "A", 2.0)];
        let report = build_stock_overview(
            &c,
            &DivisionScope::WholeCompany,
            None,
            &sales,
            &stock,
            &[PendingSale(pending("Z", "고객")), PendingSale(pending("A", "고객"))],
            &[PendingPurchase(pending("C", "모빌"))],
        );

        assert_eq!(report.inventory_by_item.len(), 2);
        assert_eq!(report.inventory_by_item[0].item_code, "A");
        assert_eq!(report.warehouses, vec!["창원".to_string(), "화성".to_string()]);
        assert_eq!(report.divisions, vec!["창원".to_string()]);
        assert_eq!(report.months, vec!["2026-02".to_string(), "2025-12".to_string()]);
        assert_eq!(report.pending_sales[0].item_code, "A");
        assert_eq!(report.pending_purchases[0].supplier, "모빌");
        assert_eq!(report.pending_purchases[0].outstanding_total, 30.0);
    }

    #[test]
    fn test_months_are_capped() {
        let sales: Vec<SaleLine> = (1..=30)
            .map(|i| sale(&format!("{}-01-01", 2000 + i), "창원지사", "A", 1.0))
            .collect();
        let months = sales_months(&sales);
        assert_eq!(months.len(), 24);
        assert_eq!(months[0], "2030-01");
    }
}
