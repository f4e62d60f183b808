//! Report assembly.
//!
//! Each report lives in its own module as a pure `build_*` function over typed rows plus an
//! async method on [`ReportEngine`] that fans out the reads the report needs and joins them
//! in memory. A failed read fails the whole report.

pub mod closing;
pub mod collections;
pub mod customers;
pub mod funds;
pub mod inventory;
pub mod mobil;
pub mod sales;
pub mod stock;

use crate::classifier::Classifier;
use crate::error::{ReportError, Result};
use crate::normalizer::parse_iso_date;
use crate::records::FromSourceRow;
use crate::schema::RuleTables;
use crate::source::{DateFilter, QueryExecutor, SourceQuery, SourceRow};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

pub use closing::{
    CollectionClosingRow, DailyClosingReport, FlagshipVolume, InventoryClosingRow,
    SalesClosingRow,
};
pub use collections::{
    CollectionRow, DailyCollectionsReport, MonthlyCollectionRow, MonthlyCollectionsReport,
};
pub use customers::{CustomerBalanceRow, CustomerDetailReport};
pub use funds::{FundLine, FundsReport};
pub use inventory::{DailyInventoryReport, InventoryStat, ProductCatalog};
pub use mobil::{MobilPaymentRow, MobilPaymentsReport};
pub use sales::{
    DailySalesReport, MiscFootnote, MonthlySalesReport, MonthlySalesRow, SalesStatusRow,
};
pub use stock::{
    ItemSalesRow, PendingPurchaseRow, PendingSaleRow, StockItemRow, StockOverviewReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    DailyInventory,
    DailyClosing,
    DailyCollections,
    MonthlyCollections,
    DailySales,
    MonthlySales,
    MobilPayments,
    Funds,
    CustomerDetail,
    StockOverview,
}

impl ReportKind {
    pub const ALL: [ReportKind; 10] = [
        ReportKind::DailyInventory,
        ReportKind::DailyClosing,
        ReportKind::DailyCollections,
        ReportKind::MonthlyCollections,
        ReportKind::DailySales,
        ReportKind::MonthlySales,
        ReportKind::MobilPayments,
        ReportKind::Funds,
        ReportKind::CustomerDetail,
        ReportKind::StockOverview,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::DailyInventory => "daily-inventory",
            ReportKind::DailyClosing => "daily-closing",
            ReportKind::DailyCollections => "daily-collections",
            ReportKind::MonthlyCollections => "monthly-collections",
            ReportKind::DailySales => "daily-sales",
            ReportKind::MonthlySales => "monthly-sales",
            ReportKind::MobilPayments => "mobil-payments",
            ReportKind::Funds => "funds",
            ReportKind::CustomerDetail => "customer-detail",
            ReportKind::StockOverview => "stock-overview",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name.trim())
            .ok_or_else(|| ReportError::InvalidParameter(format!("unknown report '{}'", name)))
    }
}

/// Caller-supplied parameters; every field is optional and defaulted by [`resolve`].
///
/// [`resolve`]: ReportParams::resolve
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportParams {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParams {
    pub date: String,
    pub division: String,
    pub year: String,
    pub month: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ReportParams {
    pub fn on(date: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            ..Self::default()
        }
    }

    pub fn with_division(mut self, division: &str) -> Self {
        self.division = Some(division.to_string());
        self
    }

    pub fn for_year(year: &str) -> Self {
        Self {
            year: Some(year.to_string()),
            ..Self::default()
        }
    }

    pub fn with_month(mut self, month: &str) -> Self {
        self.month = Some(month.to_string());
        self
    }

    /// Applies the configured defaults. Dates and division names stay permissive: an
    /// unparseable date is passed through to the row filters as-is. Year and month are used
    /// as prefixes and must be well formed.
    pub fn resolve(&self, rules: &RuleTables) -> Result<ResolvedParams> {
        let date = non_blank(&self.date)
            .unwrap_or(rules.default_date.as_str())
            .to_string();
        if parse_iso_date(&date).is_none() {
            warn!("Report date '{}' is not YYYY-MM-DD, filtering on it verbatim", date);
        }

        let division = non_blank(&self.division)
            .or_else(|| rules.branch.whole_company.first().map(String::as_str))
            .unwrap_or_default()
            .to_string();

        let year = non_blank(&self.year)
            .unwrap_or(rules.default_year.as_str())
            .to_string();
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(ReportError::InvalidParameter(format!(
                "year must be four digits, got '{}'",
                year
            )));
        }

        let month = non_blank(&self.month).map(str::to_string);
        if let Some(month) = &month {
            if parse_iso_date(&format!("{}-01", month)).is_none() {
                return Err(ReportError::InvalidParameter(format!(
                    "month must be YYYY-MM, got '{}'",
                    month
                )));
            }
        }

        Ok(ResolvedParams {
            date,
            division,
            year,
            month,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub kind: ReportKind,
    #[serde(default)]
    pub params: ReportParams,
}

impl ReportRequest {
    pub fn new(kind: ReportKind, params: ReportParams) -> Self {
        Self { kind, params }
    }
}

/// The assembled payload of one report; serializes to that report's row shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportPayload {
    DailyInventory(DailyInventoryReport),
    DailyClosing(DailyClosingReport),
    DailyCollections(DailyCollectionsReport),
    MonthlyCollections(MonthlyCollectionsReport),
    DailySales(DailySalesReport),
    MonthlySales(MonthlySalesReport),
    MobilPayments(MobilPaymentsReport),
    Funds(FundsReport),
    CustomerDetail(CustomerDetailReport),
    StockOverview(StockOverviewReport),
}

/// `{"success": true, ...payload}` or `{"success": false, "error": "..."}`. There is no
/// partial-success shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<ReportPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    status: u16,
}

impl ReportResponse {
    pub fn ok(payload: ReportPayload) -> Self {
        Self {
            success: true,
            data: Some(payload),
            error: None,
            status: 200,
        }
    }

    pub fn failure(err: &ReportError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            status: err.status_code(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Runs reports against a query executor with one shared rule set.
pub struct ReportEngine<E> {
    executor: E,
    rules: RuleTables,
}

impl<E: QueryExecutor> ReportEngine<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            rules: RuleTables::default(),
        }
    }

    pub fn with_rules(executor: E, rules: RuleTables) -> Result<Self> {
        rules.validate()?;
        Ok(Self { executor, rules })
    }

    pub fn rules(&self) -> &RuleTables {
        &self.rules
    }

    pub fn classifier(&self) -> Classifier<'_> {
        Classifier::new(&self.rules)
    }

    /// Reads one relation and re-applies the query predicate to whatever the executor
    /// returned, so pushdown is only ever an optimization.
    pub async fn fetch_rows(&self, query: SourceQuery) -> Result<Vec<SourceRow>> {
        let rows = self.executor.execute(&query).await?;
        let returned = rows.len();
        let kept: Vec<SourceRow> = rows.into_iter().filter(|row| query.matches(row)).collect();
        debug!(
            "Read {} rows from {} ({} after filtering)",
            returned,
            query.relation.table_name(),
            kept.len()
        );
        Ok(kept)
    }

    pub async fn fetch<T: FromSourceRow>(&self, date: DateFilter) -> Result<Vec<T>> {
        let rows = self
            .fetch_rows(SourceQuery::new(T::RELATION).with_date(date))
            .await?;
        Ok(rows.iter().map(T::from_row).collect())
    }

    pub async fn assemble(&self, request: &ReportRequest) -> Result<ReportPayload> {
        let params = request.params.resolve(&self.rules)?;
        info!(
            "Assembling {} report (date {}, division {}, year {}, rules v{})",
            request.kind.name(),
            params.date,
            params.division,
            params.year,
            self.rules.version
        );

        let payload = match request.kind {
            ReportKind::DailyInventory => {
                ReportPayload::DailyInventory(self.daily_inventory(&params.date).await?)
            }
            ReportKind::DailyClosing => ReportPayload::DailyClosing(
                self.daily_closing(&params.date, &params.division).await?,
            ),
            ReportKind::DailyCollections => {
                ReportPayload::DailyCollections(self.daily_collections(&params.date).await?)
            }
            ReportKind::MonthlyCollections => {
                ReportPayload::MonthlyCollections(self.monthly_collections(&params.year).await?)
            }
            ReportKind::DailySales => {
                ReportPayload::DailySales(self.daily_sales(&params.date).await?)
            }
            ReportKind::MonthlySales => {
                ReportPayload::MonthlySales(self.monthly_sales(&params.year).await?)
            }
            ReportKind::MobilPayments => {
                ReportPayload::MobilPayments(self.mobil_payments(&params.date).await?)
            }
            ReportKind::Funds => {
                let report = self.funds(&params.date).await?;
                if let Err(mismatch) = report.verify(0.5) {
                    warn!("Funds cross-check failed: {}", mismatch);
                }
                ReportPayload::Funds(report)
            }
            ReportKind::CustomerDetail => ReportPayload::CustomerDetail(
                self.customer_detail(&params.date, &params.division).await?,
            ),
            ReportKind::StockOverview => ReportPayload::StockOverview(
                self.stock_overview(&params.division, params.month.as_deref())
                    .await?,
            ),
        };

        Ok(payload)
    }

    pub async fn respond(&self, request: &ReportRequest) -> ReportResponse {
        match self.assemble(request).await {
            Ok(payload) => ReportResponse::ok(payload),
            Err(err) => {
                error!("{} report failed: {}", request.kind.name(), err);
                ReportResponse::failure(&err)
            }
        }
    }
}
