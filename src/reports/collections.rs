//! Receivable collections by branch: cash and card deposits merged with promissory notes.

use super::ReportEngine;
use crate::aggregator::{outer_merge, rank_by_total, Aggregator};
use crate::classifier::{Classifier, CollectionMethod};
use crate::error::Result;
use crate::impl_measures;
use crate::normalizer::month_of;
use crate::records::{DepositLine, NoteLine};
use crate::source::{DateFilter, QueryExecutor};
use futures::try_join;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct DepositTotals {
    cash: f64,
    card: f64,
}

impl_measures!(DepositTotals { cash, card });

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRow {
    pub branch: String,
    pub total_collection: f64,
    pub cash: f64,
    pub notes: f64,
    pub card: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCollectionRow {
    pub month: String,
    #[serde(flatten)]
    pub row: CollectionRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCollectionsReport {
    pub data: Vec<CollectionRow>,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCollectionsReport {
    pub data: Vec<MonthlyCollectionRow>,
    pub year: String,
}

/// Partial sums per key for both sources, full-outer-merged. `key` receives the row date and
/// the canonical branch.
fn collect_by<K: Ord>(
    classifier: &Classifier<'_>,
    deposits: &[DepositLine],
    notes: &[NoteLine],
    key: impl Fn(&str, String) -> K,
) -> BTreeMap<K, CollectionRow> {
    let mut by_deposit: Aggregator<K, DepositTotals> = Aggregator::new();
    for line in deposits.iter().filter(|d| classifier.is_receivable(&d.account)) {
        let Some(branch) = classifier.branch_of(&line.department) else {
            continue;
        };
        let totals = match classifier.collection_method(&line.account_label) {
            CollectionMethod::Cash => DepositTotals {
                cash: line.amount,
                card: 0.0,
            },
            CollectionMethod::Card => DepositTotals {
                cash: 0.0,
                card: line.amount,
            },
        };
        by_deposit.add(key(&line.date, branch), totals);
    }

    let mut by_note: Aggregator<K, f64> = Aggregator::new();
    for line in notes.iter().filter(|n| classifier.is_note_increase(&n.direction)) {
        if let Some(branch) = classifier.branch_of(&line.department) {
            by_note.add(key(&line.date, branch), line.increase);
        }
    }

    debug!(
        "Collections: {} deposit keys, {} note keys",
        by_deposit.len(),
        by_note.len()
    );

    outer_merge(by_deposit.into_map(), by_note.into_map())
        .into_iter()
        .map(|(k, (deposit, notes))| {
            let row = CollectionRow {
                branch: String::new(),
                total_collection: deposit.cash + deposit.card + notes,
                cash: deposit.cash,
                notes,
                card: deposit.card,
            };
            (k, row)
        })
        .collect()
}

/// `deposits` and `notes` must already be restricted to the report day.
pub fn build_daily_collections(
    classifier: &Classifier<'_>,
    date: &str,
    deposits: &[DepositLine],
    notes: &[NoteLine],
) -> DailyCollectionsReport {
    let mut data: Vec<CollectionRow> = collect_by(classifier, deposits, notes, |_, branch| branch)
        .into_iter()
        .map(|(branch, row)| CollectionRow { branch, ..row })
        .collect();
    rank_by_total(&mut data, |r| r.total_collection, |r| r.branch.as_str());

    DailyCollectionsReport {
        data,
        date: date.to_string(),
    }
}

/// `deposits` and `notes` must already be restricted to the report year.
pub fn build_monthly_collections(
    classifier: &Classifier<'_>,
    year: &str,
    deposits: &[DepositLine],
    notes: &[NoteLine],
) -> MonthlyCollectionsReport {
    let mut data: Vec<MonthlyCollectionRow> = collect_by(classifier, deposits, notes, |date, branch| {
        (month_of(date).to_string(), branch)
    })
    .into_iter()
    .map(|((month, branch), row)| MonthlyCollectionRow {
        month,
        row: CollectionRow { branch, ..row },
    })
    .collect();

    data.sort_by(|a, b| {
        a.month
            .cmp(&b.month)
            .then_with(|| b.row.total_collection.total_cmp(&a.row.total_collection))
            .then_with(|| a.row.branch.cmp(&b.row.branch))
    });

    MonthlyCollectionsReport {
        data,
        year: year.to_string(),
    }
}

impl<E: QueryExecutor> ReportEngine<E> {
    pub async fn daily_collections(&self, date: &str) -> Result<DailyCollectionsReport> {
        info!("Building daily collections for {}", date);
        let (deposits, notes) = try_join!(
            self.fetch::<DepositLine>(DateFilter::On(date.to_string())),
            self.fetch::<NoteLine>(DateFilter::On(date.to_string())),
        )?;
        Ok(build_daily_collections(
            &self.classifier(),
            date,
            &deposits,
            &notes,
        ))
    }

    pub async fn monthly_collections(&self, year: &str) -> Result<MonthlyCollectionsReport> {
        info!("Building monthly collections for {}", year);
        let (deposits, notes) = try_join!(
            self.fetch::<DepositLine>(DateFilter::Year(year.to_string())),
            self.fetch::<NoteLine>(DateFilter::Year(year.to_string())),
        )?;
        Ok(build_monthly_collections(
            &self.classifier(),
            year,
            &deposits,
            &notes,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RuleTables;

    fn deposit(date: &str, department: &str, label: &str, account: &str, amount: f64) -> DepositLine {
        DepositLine {
            date: date.to_string(),
            account_label: label.to_string(),
            account: account.to_string(),
            department: department.to_string(),
            customer_code: String::new(),
            customer: String::new(),
            amount,
        }
    }

    fn note(date: &str, department: &str, direction: &str, increase: f64) -> NoteLine {
        NoteLine {
            date: date.to_string(),
            direction: direction.to_string(),
            department: department.to_string(),
            increase,
            decrease: 0.0,
            balance: 0.0,
        }
    }

    #[test]
    fn test_cash_card_and_notes_merge_per_branch() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let deposits = vec![
            deposit("2026-02-03", "창원지사", "우리-창원", "외상매출금", 1_000.0),
            deposit("2026-02-03", "창원지사", "신한카드", "외상매출금", 500.0),
            deposit("2026-02-03", "창원지사", "신한카드", "미수금", 7_000.0),
        ];
        let notes = vec![note("2026-02-03", "창원지사", "증가", 300.0)];

        let report = build_daily_collections(&c, "2026-02-03", &deposits, &notes);
        assert_eq!(report.data.len(), 1);
        let row = &report.data[0];
        assert_eq!(row.branch, "창원");
        assert_eq!(row.cash, 1_000.0);
        assert_eq!(row.card, 500.0);
        assert_eq!(row.notes, 300.0);
        assert_eq!(row.total_collection, 1_800.0);
    }

    #[test]
    fn test_branch_present_in_one_source_is_zero_filled() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let deposits = vec![deposit("2026-02-03", "화성지사", "기업-화성", "외상매출금", 10.0)];
        let notes = vec![
            note("2026-02-03", "부산지사", "증가", 40.0),
            note("2026-02-03", "부산지사", "감소", 99.0),
            note("2026-02-03", "본사", "증가", 99.0),
        ];

        let report = build_daily_collections(&c, "2026-02-03", &deposits, &notes);
        let branches: Vec<_> = report.data.iter().map(|r| r.branch.as_str()).collect();
        assert_eq!(branches, vec!["부산", "화성"]);
        assert_eq!(report.data[0].cash, 0.0);
        assert_eq!(report.data[0].notes, 40.0);
        assert_eq!(report.data[1].notes, 0.0);
    }

    #[test]
    fn test_monthly_orders_by_month_then_total() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let deposits = vec![
            deposit("2026-02-03", "화성지사", "우리-화성", "외상매출금", 10.0),
            deposit("2026-01-15", "중부사업소", "우리-중부", "외상매출금", 5.0),
            deposit("2026-01-20", "MB", "KG이니시스", "외상매출금", 8.0),
        ];
        let report = build_monthly_collections(&c, "2026", &deposits, &[]);
        let keys: Vec<_> = report
            .data
            .iter()
            .map(|r| (r.month.as_str(), r.row.branch.as_str()))
            .collect();
        assert_eq!(keys, vec![("2026-01", "MB"), ("2026-01", "중부"), ("2026-02", "화성")]);
        assert_eq!(report.data[0].row.card, 8.0);
    }
}
