//! Daily inventory sheet: per branch and category/tier, the day's purchases, sales and net
//! transfers against the ending stock, with the beginning stock derived from them.

use super::ReportEngine;
use crate::aggregator::{beginning_inventory, Aggregator};
use crate::classifier::Classifier;
use crate::error::Result;
use crate::impl_measures;
use crate::records::{PurchaseLine, SaleLine, StockLine, TransferLine};
use crate::source::{DateFilter, QueryExecutor};
use futures::try_join;
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InventoryStat {
    pub beginning: f64,
    pub purchase: f64,
    pub sales: f64,
    pub transfer: f64,
    pub inventory: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Movement {
    inventory: f64,
    purchase: f64,
    sales: f64,
    transfer: f64,
}

impl_measures!(Movement {
    inventory,
    purchase,
    sales,
    transfer
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyInventoryReport {
    pub branches: Vec<String>,
    /// branch -> `{Category}_{Tier}` -> measures
    pub stats: BTreeMap<String, BTreeMap<String, InventoryStat>>,
    pub date: String,
}

/// Product code to (group 1, group 3) codes, taken from sales first and then purchases.
/// The first occurrence of a code wins.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    groups: HashMap<String, (String, String)>,
}

impl ProductCatalog {
    pub fn build(sales: &[SaleLine], purchases: &[PurchaseLine]) -> Self {
        let mut groups = HashMap::new();
        let entries = sales
            .iter()
            .map(|s| (&s.item_code, &s.group1, &s.group3))
            .chain(purchases.iter().map(|p| (&p.item_code, &p.group1, &p.group3)));
        for (code, group1, group3) in entries {
            if code.is_empty() {
                continue;
            }
            groups
                .entry(code.clone())
                .or_insert_with(|| (group1.clone(), group3.clone()));
        }
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// `{Category}_{Tier}` of a product; unknown products land in `Others_Others`.
    pub fn category_key(&self, classifier: &Classifier<'_>, item_code: &str) -> String {
        match self.groups.get(item_code) {
            Some((group1, group3)) => classifier.category_tier_key(group1, group3),
            None => classifier.category_tier_key("", ""),
        }
    }
}

/// `sales`, `purchases` and `transfers` must already be restricted to the report day;
/// `stock` is the current ending stock.
pub fn build_daily_inventory(
    classifier: &Classifier<'_>,
    date: &str,
    catalog: &ProductCatalog,
    stock: &[StockLine],
    sales: &[SaleLine],
    purchases: &[PurchaseLine],
    transfers: &[TransferLine],
) -> DailyInventoryReport {
    let mut movements: Aggregator<(String, String), Movement> = Aggregator::new();
    let key = |branch_text: &str, item_code: &str| {
        classifier
            .branch_of(branch_text)
            .filter(|branch| !branch.is_empty())
            .map(|branch| (branch, catalog.category_key(classifier, item_code)))
    };

    for line in stock {
        if let Some(k) = key(&line.warehouse, &line.item_code) {
            movements.add(
                k,
                Movement {
                    inventory: line.quantity,
                    ..Movement::default()
                },
            );
        }
    }
    for line in sales {
        if let Some(k) = key(&line.branch_text, &line.item_code) {
            movements.add(
                k,
                Movement {
                    sales: line.quantity,
                    ..Movement::default()
                },
            );
        }
    }
    for line in purchases {
        if let Some(k) = key(&line.branch_text, &line.item_code) {
            movements.add(
                k,
                Movement {
                    purchase: line.quantity,
                    ..Movement::default()
                },
            );
        }
    }
    for line in transfers {
        for (direction, warehouse) in line.legs() {
            if let Some(k) = key(warehouse, &line.item_code) {
                movements.add(
                    k,
                    Movement {
                        transfer: direction.sign() * line.quantity,
                        ..Movement::default()
                    },
                );
            }
        }
    }

    debug!("Daily inventory merged {} branch/category keys", movements.len());

    let mut branches = BTreeSet::new();
    let mut stats: BTreeMap<String, BTreeMap<String, InventoryStat>> = BTreeMap::new();
    for ((branch, category), m) in movements.into_map() {
        branches.insert(branch.clone());
        stats.entry(branch).or_default().insert(
            category,
            InventoryStat {
                beginning: beginning_inventory(m.inventory, m.purchase, m.sales, m.transfer),
                purchase: m.purchase,
                sales: m.sales,
                transfer: m.transfer,
                inventory: m.inventory,
            },
        );
    }

    DailyInventoryReport {
        branches: branches.into_iter().collect(),
        stats,
        date: date.to_string(),
    }
}

impl<E: QueryExecutor> ReportEngine<E> {
    pub async fn daily_inventory(&self, date: &str) -> Result<DailyInventoryReport> {
        info!("Building daily inventory for {}", date);

        let (stock, sales, purchases, transfers) = try_join!(
            self.fetch::<StockLine>(DateFilter::Any),
            self.fetch::<SaleLine>(DateFilter::Any),
            self.fetch::<PurchaseLine>(DateFilter::Any),
            self.fetch::<TransferLine>(DateFilter::DayOfYear(date.to_string())),
        )?;

        let catalog = ProductCatalog::build(&sales, &purchases);
        debug!("Product catalog holds {} codes", catalog.len());

        let day_sales: Vec<SaleLine> = sales.into_iter().filter(|s| s.date == date).collect();
        let day_purchases: Vec<PurchaseLine> =
            purchases.into_iter().filter(|p| p.date == date).collect();

        Ok(build_daily_inventory(
            &self.classifier(),
            date,
            &catalog,
            &stock,
            &day_sales,
            &day_purchases,
            &transfers,
        ))
    }
}
