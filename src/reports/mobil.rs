//! Mobil purchase-order payments for one day, summed per warehouse and industry group.

use super::ReportEngine;
use crate::classifier::Classifier;
use crate::error::Result;
use crate::records::{FromSourceRow, PurchaseOrderLine};
use crate::source::{columns as col, DateFilter, PartyFilter, QueryExecutor, SourceQuery};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobilPaymentRow {
    pub branch: String,
    /// Group with the largest amount; earlier groups win ties.
    pub industry_group: String,
    /// Lowercased group label -> amount, e.g. `{"il": .., "auto": .., "mbk": ..}`.
    #[serde(flatten)]
    pub amounts: BTreeMap<String, f64>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobilPaymentsReport {
    pub data: Vec<MobilPaymentRow>,
    pub date: String,
}

/// `orders` must already be restricted to the report day and to Mobil suppliers. Orders
/// whose product group belongs to no industry group still register their warehouse.
pub fn build_mobil_payments(
    classifier: &Classifier<'_>,
    date: &str,
    orders: &[PurchaseOrderLine],
) -> MobilPaymentsReport {
    let rules = &classifier.rules().mobil;
    let labels: Vec<&str> = rules.industry_groups.iter().map(|g| g.label.as_str()).collect();

    let mut by_branch: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for order in orders {
        let branch = if order.warehouse.is_empty() {
            rules.unknown_branch.clone()
        } else {
            order.warehouse.clone()
        };
        let sums = by_branch
            .entry(branch)
            .or_insert_with(|| vec![0.0; labels.len()]);
        if let Some(group) = classifier.industry_group(&order.group1) {
            if let Some(idx) = labels.iter().position(|l| *l == group) {
                sums[idx] += order.total;
            }
        }
    }

    debug!("Mobil payments span {} warehouses", by_branch.len());

    let mut data: Vec<MobilPaymentRow> = by_branch
        .into_iter()
        .map(|(branch, sums)| {
            let mut dominant: Option<(usize, f64)> = None;
            for (idx, amount) in sums.iter().enumerate() {
                if dominant.map_or(true, |(_, best)| *amount > best) {
                    dominant = Some((idx, *amount));
                }
            }
            MobilPaymentRow {
                branch,
                industry_group: dominant
                    .map(|(idx, _)| labels[idx].to_string())
                    .unwrap_or_default(),
                total: sums.iter().sum(),
                amounts: labels
                    .iter()
                    .zip(&sums)
                    .map(|(label, amount)| (label.to_lowercase(), *amount))
                    .collect(),
            }
        })
        .collect();

    data.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.branch.cmp(&b.branch)));

    MobilPaymentsReport {
        data,
        date: date.to_string(),
    }
}

impl<E: QueryExecutor> ReportEngine<E> {
    pub async fn mobil_payments(&self, date: &str) -> Result<MobilPaymentsReport> {
        info!("Building Mobil payments for {}", date);
        let query = SourceQuery::new(PurchaseOrderLine::RELATION)
            .with_date(DateFilter::DayOfYear(date.to_string()))
            .with_party(PartyFilter::Contains {
                column: col::PARTY,
                needle: self.rules().mobil.supplier_marker.clone(),
            });
        let orders: Vec<PurchaseOrderLine> = self
            .fetch_rows(query)
            .await?
            .iter()
            .map(PurchaseOrderLine::from_row)
            .collect();
        Ok(build_mobil_payments(&self.classifier(), date, &orders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RuleTables;

    fn order(warehouse: &str, group1: &str, total: f64) -> PurchaseOrderLine {
        PurchaseOrderLine {
            day: "2026-02-03".to_string(),
            item_name: String::new(),
            group1: group1.to_string(),
            total,
            supplier: "모빌코리아윤활유(주)".to_string(),
            warehouse: warehouse.to_string(),
        }
    }

    #[test]
    fn test_groups_and_dominant_label() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let orders = vec![
            order("창원", "IL", 100.0),
            order("창원", "PVL", 150.0),
            order("창원", "CVL", 20.0),
            order("화성", "MB", 900.0),
            order("화성", "AVI", 100.0),
        ];
        let report = build_mobil_payments(&c, "2026-02-03", &orders);

        assert_eq!(report.data.len(), 2);
        let first = &report.data[0];
        assert_eq!(first.branch, "화성");
        assert_eq!(first.industry_group, "MBK");
        assert_eq!(first.amounts["mbk"], 1_000.0);
        assert_eq!(first.total, 1_000.0);

        let second = &report.data[1];
        assert_eq!(second.industry_group, "AUTO");
        assert_eq!(second.amounts["auto"], 170.0);
        assert_eq!(second.amounts["il"], 100.0);
        assert_eq!(second.total, 270.0);
    }

    #[test]
    fn test_ties_prefer_earlier_group_and_blank_warehouse() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let orders = vec![order("", "IL", 50.0), order("", "PVL", 50.0), order("제주", "MAR", 9.0)];
        let report = build_mobil_payments(&c, "2026-02-03", &orders);

        let other = report.data.iter().find(|r| r.branch == "기타").unwrap();
        assert_eq!(other.industry_group, "IL");
        assert_eq!(other.total, 100.0);

        let jeju = report.data.iter().find(|r| r.branch == "제주").unwrap();
        assert_eq!(jeju.total, 0.0);
        assert_eq!(jeju.industry_group, "IL");
    }

    #[test]
    fn test_amounts_flatten_into_row() {
        let rules = RuleTables::default();
        let c = Classifier::new(&rules);
        let report = build_mobil_payments(&c, "2026-02-03", &[order("창원", "IL", 10.0)]);
        let json = serde_json::to_value(&report.data[0]).unwrap();
        assert_eq!(json["il"], 10.0);
        assert_eq!(json["auto"], 0.0);
        assert_eq!(json["industryGroup"], "IL");
    }
}
