//! Sales status by branch (daily) and by month and branch (yearly), with the footnote for
//! Mobil-named items that fall outside the Mobil product groups.

use super::ReportEngine;
use crate::aggregator::{outer_merge, rank_by_total, Aggregator};
use crate::classifier::Classifier;
use crate::error::Result;
use crate::impl_measures;
use crate::normalizer::month_of;
use crate::records::{PurchaseLine, SaleLine};
use crate::source::{DateFilter, QueryExecutor};
use futures::try_join;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
struct SalesMeasures {
    total_sales: f64,
    mobil_sales_amount: f64,
    mobil_sales_weight: f64,
    flagship_sales_weight: f64,
}

impl_measures!(SalesMeasures {
    total_sales,
    mobil_sales_amount,
    mobil_sales_weight,
    flagship_sales_weight
});

#[derive(Debug, Clone, Copy, Default)]
struct PurchaseMeasures {
    mobil_purchase_weight: f64,
    flagship_purchase_weight: f64,
}

impl_measures!(PurchaseMeasures {
    mobil_purchase_weight,
    flagship_purchase_weight
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesStatusRow {
    pub branch: String,
    pub total_sales: f64,
    pub mobil_sales_amount: f64,
    pub mobil_sales_weight: f64,
    pub flagship_sales_weight: f64,
    pub mobil_purchase_weight: f64,
    pub flagship_purchase_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySalesRow {
    pub month: String,
    #[serde(flatten)]
    pub row: SalesStatusRow,
}

/// Count, supply amount and weight of sales excluded from the Mobil measures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiscFootnote {
    pub count: usize,
    pub amount: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySalesReport {
    pub data: Vec<SalesStatusRow>,
    pub misc_mobil: MiscFootnote,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySalesReport {
    pub data: Vec<MonthlySalesRow>,
    pub misc_mobil: MiscFootnote,
    pub year: String,
}

fn sales_status_by<K: Ord>(
    classifier: &Classifier<'_>,
    sales: &[SaleLine],
    purchases: &[PurchaseLine],
    key: impl Fn(&str, String) -> K,
) -> BTreeMap<K, SalesStatusRow> {
    let mut by_sale: Aggregator<K, SalesMeasures> = Aggregator::new();
    for sale in sales {
        let Some(branch) = classifier.branch_of(&sale.branch_text) else {
            continue;
        };
        let mobil = classifier.is_mobil_group(&sale.group1);
        let flagship = classifier.is_flagship(&sale.group3);
        by_sale.add(
            key(&sale.date, branch),
            SalesMeasures {
                total_sales: sale.total,
                mobil_sales_amount: if mobil { sale.supply_amount } else { 0.0 },
                mobil_sales_weight: if mobil { sale.weight } else { 0.0 },
                flagship_sales_weight: if flagship { sale.weight } else { 0.0 },
            },
        );
    }

    let mut by_purchase: Aggregator<K, PurchaseMeasures> = Aggregator::new();
    for purchase in purchases {
        let Some(branch) = classifier.branch_of(&purchase.branch_text) else {
            continue;
        };
        let mobil = classifier.is_mobil_group(&purchase.group1);
        let flagship = classifier.is_flagship(&purchase.group3);
        by_purchase.add(
            key(&purchase.date, branch),
            PurchaseMeasures {
                mobil_purchase_weight: if mobil { purchase.weight } else { 0.0 },
                flagship_purchase_weight: if flagship { purchase.weight } else { 0.0 },
            },
        );
    }

    debug!(
        "Sales status: {} sales keys, {} purchase keys",
        by_sale.len(),
        by_purchase.len()
    );

    outer_merge(by_sale.into_map(), by_purchase.into_map())
        .into_iter()
        .map(|(k, (s, p))| {
            let row = SalesStatusRow {
                branch: String::new(),
                total_sales: s.total_sales,
                mobil_sales_amount: s.mobil_sales_amount,
                mobil_sales_weight: s.mobil_sales_weight,
                flagship_sales_weight: s.flagship_sales_weight,
                mobil_purchase_weight: p.mobil_purchase_weight,
                flagship_purchase_weight: p.flagship_purchase_weight,
            };
            (k, row)
        })
        .collect()
}

/// Mobil-named sales whose group code is outside the Mobil table. Counted over every sales
/// row given, regardless of branch.
pub fn misc_footnote(classifier: &Classifier<'_>, sales: &[SaleLine]) -> MiscFootnote {
    sales
        .iter()
        .filter(|s| classifier.is_unclassified_mobil(&s.item_name, &s.group1))
        .fold(MiscFootnote::default(), |acc, s| MiscFootnote {
            count: acc.count + 1,
            amount: acc.amount + s.supply_amount,
            weight: acc.weight + s.weight,
        })
}

/// `sales` and `purchases` must already be restricted to the report day.
pub fn build_daily_sales(
    classifier: &Classifier<'_>,
    date: &str,
    sales: &[SaleLine],
    purchases: &[PurchaseLine],
) -> DailySalesReport {
    let mut data: Vec<SalesStatusRow> = sales_status_by(classifier, sales, purchases, |_, b| b)
        .into_iter()
        .map(|(branch, row)| SalesStatusRow { branch, ..row })
        .collect();
    rank_by_total(&mut data, |r| r.total_sales, |r| r.branch.as_str());

    DailySalesReport {
        data,
        misc_mobil: misc_footnote(classifier, sales),
        date: date.to_string(),
    }
}

/// `sales` and `purchases` must already be restricted to the report year.
pub fn build_monthly_sales(
    classifier: &Classifier<'_>,
    year: &str,
    sales: &[SaleLine],
    purchases: &[PurchaseLine],
) -> MonthlySalesReport {
    let mut data: Vec<MonthlySalesRow> = sales_status_by(classifier, sales, purchases, |date, b| {
        (month_of(date).to_string(), b)
    })
    .into_iter()
    .map(|((month, branch), row)| MonthlySalesRow {
        month,
        row: SalesStatusRow { branch, ..row },
    })
    .collect();

    data.sort_by(|a, b| {
        a.month
            .cmp(&b.month)
            .then_with(|| b.row.total_sales.total_cmp(&a.row.total_sales))
            .then_with(|| a.row.branch.cmp(&b.row.branch))
    });

    MonthlySalesReport {
        data,
        misc_mobil: misc_footnote(classifier, sales),
        year: year.to_string(),
    }
}

impl<E: QueryExecutor> ReportEngine<E> {
    pub async fn daily_sales(&self, date: &str) -> Result<DailySalesReport> {
        info!("Building daily sales status for {}", date);
        let (sales, purchases) = try_join!(
            self.fetch::<SaleLine>(DateFilter::On(date.to_string())),
            self.fetch::<PurchaseLine>(DateFilter::On(date.to_string())),
        )?;
        Ok(build_daily_sales(&self.classifier(), date, &sales, &purchases))
    }

    pub async fn monthly_sales(&self, year: &str) -> Result<MonthlySalesReport> {
        info!("Building monthly sales status for {}", year);
        let (sales, purchases) = try_join!(
            self.fetch::<SaleLine>(DateFilter::Year(year.to_string())),
            self.fetch::<PurchaseLine>(DateFilter::Year(year.to_string())),
        )?;
        Ok(build_monthly_sales(&self.classifier(), year, &sales, &purchases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RuleTables;

    fn sale(date: &str, branch: &str, name: &str, group1: &str, group3: &str, total: f64) -> SaleLine {
        SaleLine {
            date: date.to_string(),
            branch_text: branch.to_string(),
            customer_code: String::new(),
            customer: String::new(),
            warehouse: String::new(),
            item_code: String::new(),
            item_name: name.to_string(),
            quantity: 1.0,
            weight: 200.0,
            supply_amount: total * 0.9,
            total,
            group1: group1.to_string(),
            group3: group3.to_string(),
        }
    }

    fn purchase(date: &str, branch: &str, group1: &str, weight: f64) -> PurchaseLine {
        PurchaseLine {
            date: date.to_string(),
            branch_text: branch.to_string(),
            supplier: String::new(),
            warehouse: String::new(),
            item_code: String::new(),
            item_name: String::new(),
            quantity: 1.0,
            weight,
            supply_amount: 0.0,
            total: 0.0,
            group1: group1.to_string(),
            group3: String::new(),
        }
    }

    #[test]
    fn test_daily_rows_merge_sales_and_purchases() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let sales = vec![
            sale("2026-02-03", "화성지사", "MOBIL DELVAC", "CVL", "FLA", 1_000.0),
            sale("2026-02-03", "화성지사", "SHELL HELIX", "AA", "", 300.0),
            sale("2026-02-03", "본사", "MOBIL 1", "PVL", "", 5_000.0),
        ];
        let purchases = vec![purchase("2026-02-03", "제주지사", "IL", 800.0)];

        let report = build_daily_sales(&c, "2026-02-03", &sales, &purchases);
        assert_eq!(report.data.len(), 2);

        let hwaseong = &report.data[0];
        assert_eq!(hwaseong.branch, "화성");
        assert_eq!(hwaseong.total_sales, 1_300.0);
        assert_eq!(hwaseong.mobil_sales_amount, 900.0);
        assert_eq!(hwaseong.mobil_sales_weight, 200.0);
        assert_eq!(hwaseong.flagship_sales_weight, 200.0);
        assert_eq!(hwaseong.mobil_purchase_weight, 0.0);

        let jeju = &report.data[1];
        assert_eq!(jeju.branch, "제주");
        assert_eq!(jeju.total_sales, 0.0);
        assert_eq!(jeju.mobil_purchase_weight, 800.0);
    }

    #[test]
    fn test_unclassified_mobil_goes_to_footnote() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let sales = vec![
            sale("2026-02-03", "중부사업소", "MOBIL DTE 25", "AA", "", 100.0),
            sale("2026-02-03", "중부사업소", "Mobil SHC 630", "", "", 50.0),
            sale("2026-02-03", "중부사업소", "MOBIL 1 5W-30", "PVL", "", 70.0),
            sale("2026-02-03", "중부사업소", "Total Quartz", "AA", "", 20.0),
        ];
        let report = build_daily_sales(&c, "2026-02-03", &sales, &[]);

        assert_eq!(report.misc_mobil.count, 2);
        assert_eq!(report.misc_mobil.amount, 135.0);
        assert_eq!(report.misc_mobil.weight, 400.0);

        let row = &report.data[0];
        assert_eq!(row.mobil_sales_amount, 63.0);
        assert_eq!(row.mobil_sales_weight, 200.0);
        assert_eq!(row.total_sales, 240.0);
    }

    #[test]
    fn test_monthly_groups_by_month() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let sales = vec![
            sale("2026-01-05", "부산지사", "X", "IL", "", 10.0),
            sale("2026-01-20", "부산지사", "X", "IL", "", 15.0),
            sale("2026-02-01", "부산지사", "X", "IL", "", 7.0),
            sale("2026-01-09", "남부지사", "X", "IL", "", 40.0),
        ];
        let report = build_monthly_sales(&c, "2026", &sales, &[]);
        let keys: Vec<_> = report
            .data
            .iter()
            .map(|r| (r.month.as_str(), r.row.branch.as_str(), r.row.total_sales))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2026-01", "남부", 40.0),
                ("2026-01", "부산", 25.0),
                ("2026-02", "부산", 7.0)
            ]
        );
    }
}
