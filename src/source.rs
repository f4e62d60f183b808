//! The "table of rows" boundary: relation schemas, untyped rows, query descriptions and the
//! executor trait the engine reads through.

use crate::error::{ReportError, Result};
use crate::normalizer::{
    month_day_variants, parse_amount, parse_id, storage_date_prefix, text_of, to_storage_date,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Column names as they appear in the source relations.
pub mod columns {
    pub const ID: &str = "id";
    pub const DATE: &str = "일자";
    pub const LEDGER_DATE: &str = "일자_no_";
    pub const MONTH_DAY: &str = "월_일";
    pub const VOUCHER_DATE: &str = "전표번호";
    pub const SALES_BRANCH: &str = "거래처그룹1코드명";
    pub const PURCHASE_BRANCH: &str = "거래처그룹1명";
    pub const DEPARTMENT: &str = "부서명";
    pub const WAREHOUSE: &str = "창고명";
    pub const OUTBOUND_WAREHOUSE: &str = "출고창고";
    pub const INBOUND_WAREHOUSE: &str = "입고창고";
    pub const CUSTOMER_CODE: &str = "거래처코드";
    pub const CUSTOMER: &str = "판매처명";
    pub const SUPPLIER: &str = "구매처명";
    pub const PARTY: &str = "거래처명";
    pub const ITEM_CODE: &str = "품목코드";
    pub const SALES_ITEM_NAME: &str = "품목명_규격_";
    pub const PURCHASE_ITEM_NAME: &str = "품목명";
    pub const ORDER_ITEM_NAME: &str = "품명_및_규격";
    pub const GROUP1: &str = "품목그룹1코드";
    pub const GROUP3: &str = "품목그룹3코드";
    pub const QUANTITY: &str = "수량";
    pub const STOCK_QUANTITY: &str = "재고수량";
    pub const REMAINING: &str = "잔량";
    pub const WEIGHT: &str = "중량";
    pub const SUPPLY_AMOUNT: &str = "공급가액";
    pub const GROSS_TOTAL: &str = "합_계";
    pub const ORDER_TOTAL: &str = "합계";
    pub const AMOUNT: &str = "금액";
    pub const ACCOUNT_LABEL: &str = "계좌";
    pub const ACCOUNT: &str = "계정명";
    pub const DIRECTION: &str = "증감구분";
    pub const INCREASE: &str = "증가금액";
    pub const DECREASE: &str = "감소금액";
    pub const BALANCE: &str = "잔액";
    pub const DEBIT: &str = "차변금액";
    pub const CREDIT: &str = "대변금액";
    pub const DUE_DATE: &str = "납기일자";
    pub const MEMO: &str = "적요";
    pub const INTERNAL_USE_AMOUNT: &str = "금액_수량_입고단가";
}

use columns as col;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Purchases,
    Sales,
    Inventory,
    InventoryTransfers,
    InternalUses,
    PurchaseOrders,
    Deposits,
    PromissoryNotes,
    Ledger,
    Expenses,
    PendingSales,
    PendingPurchases,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Id,
    Amount,
    Date,
    Text,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn column(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { name, kind }
}

use ColumnKind::{Amount, Code, Date, Id, Text};

const PURCHASES: &[ColumnSpec] = &[
    column(col::ID, Id),
    column(col::DATE, Date),
    column(col::CUSTOMER_CODE, Code),
    column(col::PURCHASE_BRANCH, Text),
    column(col::SUPPLIER, Text),
    column(col::WAREHOUSE, Text),
    column(col::ITEM_CODE, Code),
    column(col::PURCHASE_ITEM_NAME, Text),
    column(col::QUANTITY, Amount),
    column(col::WEIGHT, Amount),
    column(col::SUPPLY_AMOUNT, Amount),
    column(col::GROSS_TOTAL, Amount),
    column(col::GROUP1, Code),
    column(col::GROUP3, Code),
];

const SALES: &[ColumnSpec] = &[
    column(col::ID, Id),
    column(col::DATE, Date),
    column(col::SALES_BRANCH, Text),
    column(col::CUSTOMER_CODE, Code),
    column(col::CUSTOMER, Text),
    column(col::ITEM_CODE, Code),
    column(col::SALES_ITEM_NAME, Text),
    column(col::QUANTITY, Amount),
    column(col::WEIGHT, Amount),
    column(col::SUPPLY_AMOUNT, Amount),
    column(col::GROSS_TOTAL, Amount),
    column(col::GROUP1, Code),
    column(col::GROUP3, Code),
    column(col::WAREHOUSE, Text),
];

const INVENTORY: &[ColumnSpec] = &[
    column(col::WAREHOUSE, Text),
    column(col::ITEM_CODE, Code),
    column(col::SALES_ITEM_NAME, Text),
    column(col::STOCK_QUANTITY, Amount),
];

const INVENTORY_TRANSFERS: &[ColumnSpec] = &[
    column(col::ID, Id),
    column(col::MONTH_DAY, Date),
    column(col::OUTBOUND_WAREHOUSE, Text),
    column(col::INBOUND_WAREHOUSE, Text),
    column(col::ITEM_CODE, Code),
    column(col::ORDER_ITEM_NAME, Text),
    column(col::QUANTITY, Amount),
    column(col::WEIGHT, Amount),
    column(col::GROUP3, Code),
];

const INTERNAL_USES: &[ColumnSpec] = &[
    column(col::ID, Id),
    column(col::DATE, Date),
    column(col::PARTY, Text),
    column(col::WAREHOUSE, Text),
    column(col::QUANTITY, Amount),
    column(col::INTERNAL_USE_AMOUNT, Amount),
    column(col::GROUP1, Code),
];

const PURCHASE_ORDERS: &[ColumnSpec] = &[
    column(col::ID, Id),
    column(col::MONTH_DAY, Date),
    column(col::ORDER_ITEM_NAME, Text),
    column(col::GROUP1, Code),
    column(col::QUANTITY, Amount),
    column(col::SUPPLY_AMOUNT, Amount),
    column(col::ORDER_TOTAL, Amount),
    column(col::PARTY, Text),
    column(col::WAREHOUSE, Text),
];

const DEPOSITS: &[ColumnSpec] = &[
    column(col::ID, Id),
    column(col::VOUCHER_DATE, Date),
    column(col::ACCOUNT_LABEL, Text),
    column(col::ACCOUNT, Text),
    column(col::DEPARTMENT, Text),
    column(col::CUSTOMER_CODE, Code),
    column(col::PARTY, Text),
    column(col::AMOUNT, Amount),
];

const PROMISSORY_NOTES: &[ColumnSpec] = &[
    column(col::ID, Id),
    column(col::DATE, Date),
    column(col::DIRECTION, Code),
    column(col::PARTY, Text),
    column(col::ACCOUNT, Text),
    column(col::DEPARTMENT, Text),
    column(col::INCREASE, Amount),
    column(col::DECREASE, Amount),
    column(col::BALANCE, Amount),
];

const LEDGER: &[ColumnSpec] = &[
    column(col::ID, Id),
    column(col::LEDGER_DATE, Date),
    column(col::ACCOUNT, Text),
    column(col::CUSTOMER_CODE, Code),
    column(col::PARTY, Text),
    column(col::DEBIT, Amount),
    column(col::CREDIT, Amount),
    column(col::BALANCE, Amount),
];

const EXPENSES: &[ColumnSpec] = &[
    column(col::ID, Id),
    column(col::DATE, Date),
    column(col::ACCOUNT, Text),
    column(col::DEPARTMENT, Text),
    column(col::ACCOUNT_LABEL, Text),
    column(col::PARTY, Text),
    column(col::AMOUNT, Amount),
];

const PENDING_SALES: &[ColumnSpec] = &[
    column(col::ITEM_CODE, Code),
    column(col::ORDER_ITEM_NAME, Text),
    column(col::PARTY, Text),
    column(col::REMAINING, Amount),
    column(col::SUPPLY_AMOUNT, Amount),
    column(col::DUE_DATE, Text),
    column(col::MEMO, Text),
];

const PENDING_PURCHASES: &[ColumnSpec] = &[
    column(col::ITEM_CODE, Code),
    column(col::ORDER_ITEM_NAME, Text),
    column(col::PARTY, Text),
    column(col::REMAINING, Amount),
    column(col::ORDER_TOTAL, Amount),
    column(col::DUE_DATE, Text),
    column(col::WAREHOUSE, Text),
];

impl Relation {
    pub const ALL: [Relation; 12] = [
        Relation::Purchases,
        Relation::Sales,
        Relation::Inventory,
        Relation::InventoryTransfers,
        Relation::InternalUses,
        Relation::PurchaseOrders,
        Relation::Deposits,
        Relation::PromissoryNotes,
        Relation::Ledger,
        Relation::Expenses,
        Relation::PendingSales,
        Relation::PendingPurchases,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Relation::Purchases => "purchases",
            Relation::Sales => "sales",
            Relation::Inventory => "inventory",
            Relation::InventoryTransfers => "inventory_transfers",
            Relation::InternalUses => "internal_uses",
            Relation::PurchaseOrders => "purchase_orders",
            Relation::Deposits => "deposits",
            Relation::PromissoryNotes => "promissory_notes",
            Relation::Ledger => "ledger",
            Relation::Expenses => "expenses",
            Relation::PendingSales => "pending_sales",
            Relation::PendingPurchases => "pending_purchases",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Relation> {
        Self::ALL.into_iter().find(|r| r.table_name() == name)
    }

    pub fn schema(&self) -> &'static [ColumnSpec] {
        match self {
            Relation::Purchases => PURCHASES,
            Relation::Sales => SALES,
            Relation::Inventory => INVENTORY,
            Relation::InventoryTransfers => INVENTORY_TRANSFERS,
            Relation::InternalUses => INTERNAL_USES,
            Relation::PurchaseOrders => PURCHASE_ORDERS,
            Relation::Deposits => DEPOSITS,
            Relation::PromissoryNotes => PROMISSORY_NOTES,
            Relation::Ledger => LEDGER,
            Relation::Expenses => EXPENSES,
            Relation::PendingSales => PENDING_SALES,
            Relation::PendingPurchases => PENDING_PURCHASES,
        }
    }

    /// The column date predicates apply to; `None` for snapshot relations.
    pub fn date_column(&self) -> Option<&'static str> {
        self.schema()
            .iter()
            .find(|c| c.kind == ColumnKind::Date)
            .map(|c| c.name)
    }

    /// Ledger dates are stored as `YYYY/MM/DD`; every other relation uses ISO dates.
    pub fn uses_storage_dates(&self) -> bool {
        matches!(self, Relation::Ledger)
    }
}

/// An untyped source row. Field access goes through the value normalizer, so absent or
/// malformed cells read as zero or empty text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRow(Map<String, Value>);

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.0.insert(column.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<Value>) {
        self.0.insert(column.to_string(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn text(&self, column: &str) -> String {
        text_of(self.0.get(column))
    }

    pub fn amount(&self, column: &str) -> f64 {
        parse_amount(self.0.get(column))
    }

    pub fn id(&self) -> i64 {
        parse_id(self.0.get(col::ID))
    }
}

impl From<Map<String, Value>> for SourceRow {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Date predicate against a relation's date column. Dates are compared as strings, so the
/// filter works on whatever the caller passed, parseable or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateFilter {
    Any,
    On(String),
    Before(String),
    OnOrBefore(String),
    /// `YYYY-MM`
    Month(String),
    /// `YYYY`
    Year(String),
    /// Full date, `MM-DD` or `MM/DD`; used by relations keyed by `월_일`.
    DayOfYear(String),
}

impl DateFilter {
    pub fn matches(&self, relation: Relation, raw: &str) -> bool {
        if matches!(self, DateFilter::Any) {
            return true;
        }
        let storage = relation.uses_storage_dates();
        let value = if storage {
            storage_date_prefix(raw)
        } else {
            raw.trim()
        };
        if value.is_empty() {
            return false;
        }
        let target = |iso: &str| {
            if storage {
                to_storage_date(iso)
            } else {
                iso.trim().to_string()
            }
        };

        match self {
            DateFilter::Any => true,
            DateFilter::On(date) => value == target(date),
            DateFilter::Before(date) => value < target(date).as_str(),
            DateFilter::OnOrBefore(date) => value <= target(date).as_str(),
            DateFilter::Month(month) => {
                let prefix = if storage {
                    month.trim().replace('-', "/")
                } else {
                    month.trim().to_string()
                };
                value.starts_with(&prefix)
            }
            DateFilter::Year(year) => {
                let separator = if storage { '/' } else { '-' };
                value.starts_with(&format!("{}{}", year.trim(), separator))
            }
            DateFilter::DayOfYear(date) => month_day_variants(date).iter().any(|v| value == v),
        }
    }
}

/// Free-text narrowing on a party/branch column. Stores may push it down; the engine
/// re-applies it to whatever comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyFilter {
    Any,
    Equals { column: &'static str, value: String },
    Contains { column: &'static str, needle: String },
}

impl PartyFilter {
    pub fn matches(&self, row: &SourceRow) -> bool {
        match self {
            PartyFilter::Any => true,
            PartyFilter::Equals { column, value } => row.text(column) == *value,
            PartyFilter::Contains { column, needle } => row.text(column).contains(needle.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub relation: Relation,
    pub date: DateFilter,
    pub party: PartyFilter,
}

impl SourceQuery {
    pub fn new(relation: Relation) -> Self {
        Self {
            relation,
            date: DateFilter::Any,
            party: PartyFilter::Any,
        }
    }

    pub fn with_date(mut self, date: DateFilter) -> Self {
        self.date = date;
        self
    }

    pub fn with_party(mut self, party: PartyFilter) -> Self {
        self.party = party;
        self
    }

    pub fn matches(&self, row: &SourceRow) -> bool {
        let date_ok = match self.relation.date_column() {
            Some(column) => self.date.matches(self.relation, &row.text(column)),
            None => true,
        };
        date_ok && self.party.matches(row)
    }
}

/// The external relation store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &SourceQuery) -> Result<Vec<SourceRow>>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    async fn execute(&self, query: &SourceQuery) -> Result<Vec<SourceRow>> {
        (**self).execute(query).await
    }
}

/// Rows held in memory, one vector per relation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: HashMap<Relation, Vec<SourceRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, relation: Relation, rows: Vec<SourceRow>) -> Self {
        self.tables.entry(relation).or_default().extend(rows);
        self
    }

    pub fn insert(&mut self, relation: Relation, row: SourceRow) {
        self.tables.entry(relation).or_default().push(row);
    }

    /// Loads a JSON array of objects into a relation.
    pub fn load_json(&mut self, relation: Relation, json: &str) -> Result<usize> {
        let rows: Vec<SourceRow> = serde_json::from_str(json)?;
        let count = rows.len();
        self.tables.entry(relation).or_default().extend(rows);
        Ok(count)
    }

    pub fn len(&self, relation: Relation) -> usize {
        self.tables.get(&relation).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(Vec::is_empty)
    }
}

#[async_trait]
impl QueryExecutor for InMemoryStore {
    async fn execute(&self, query: &SourceQuery) -> Result<Vec<SourceRow>> {
        Ok(self
            .tables
            .get(&query.relation)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}

/// Executor that fails every read of the listed relations; used to exercise the
/// whole-report failure path.
#[derive(Debug, Clone)]
pub struct FailingStore<E> {
    inner: E,
    failing: Vec<Relation>,
}

impl<E> FailingStore<E> {
    pub fn new(inner: E, failing: Vec<Relation>) -> Self {
        Self { inner, failing }
    }
}

#[async_trait]
impl<E: QueryExecutor> QueryExecutor for FailingStore<E> {
    async fn execute(&self, query: &SourceQuery) -> Result<Vec<SourceRow>> {
        if self.failing.contains(&query.relation) {
            return Err(ReportError::source_read(
                query.relation.table_name(),
                "relation store unavailable",
            ));
        }
        self.inner.execute(query).await
    }
}
