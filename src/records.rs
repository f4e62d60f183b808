//! Typed views over source rows, one per relation the reports read.

use crate::source::{columns as col, Relation, SourceRow};

pub trait FromSourceRow: Sized {
    const RELATION: Relation;

    fn from_row(row: &SourceRow) -> Self;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaleLine {
    pub date: String,
    pub branch_text: String,
    pub customer_code: String,
    pub customer: String,
    pub warehouse: String,
    pub item_code: String,
    pub item_name: String,
    pub quantity: f64,
    pub weight: f64,
    pub supply_amount: f64,
    pub total: f64,
    pub group1: String,
    pub group3: String,
}

impl FromSourceRow for SaleLine {
    const RELATION: Relation = Relation::Sales;

    fn from_row(row: &SourceRow) -> Self {
        Self {
            date: row.text(col::DATE),
            branch_text: row.text(col::SALES_BRANCH),
            customer_code: row.text(col::CUSTOMER_CODE),
            customer: row.text(col::CUSTOMER),
            warehouse: row.text(col::WAREHOUSE),
            item_code: row.text(col::ITEM_CODE),
            item_name: row.text(col::SALES_ITEM_NAME),
            quantity: row.amount(col::QUANTITY),
            weight: row.amount(col::WEIGHT),
            supply_amount: row.amount(col::SUPPLY_AMOUNT),
            total: row.amount(col::GROSS_TOTAL),
            group1: row.text(col::GROUP1),
            group3: row.text(col::GROUP3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseLine {
    pub date: String,
    pub branch_text: String,
    pub supplier: String,
    pub warehouse: String,
    pub item_code: String,
    pub item_name: String,
    pub quantity: f64,
    pub weight: f64,
    pub supply_amount: f64,
    pub total: f64,
    pub group1: String,
    pub group3: String,
}

impl FromSourceRow for PurchaseLine {
    const RELATION: Relation = Relation::Purchases;

    fn from_row(row: &SourceRow) -> Self {
        Self {
            date: row.text(col::DATE),
            branch_text: row.text(col::PURCHASE_BRANCH),
            supplier: row.text(col::SUPPLIER),
            warehouse: row.text(col::WAREHOUSE),
            item_code: row.text(col::ITEM_CODE),
            item_name: row.text(col::PURCHASE_ITEM_NAME),
            quantity: row.amount(col::QUANTITY),
            weight: row.amount(col::WEIGHT),
            supply_amount: row.amount(col::SUPPLY_AMOUNT),
            total: row.amount(col::GROSS_TOTAL),
            group1: row.text(col::GROUP1),
            group3: row.text(col::GROUP3),
        }
    }
}

/// Current (ending) stock per item and warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct StockLine {
    pub warehouse: String,
    pub item_code: String,
    pub item_name: String,
    pub quantity: f64,
}

impl FromSourceRow for StockLine {
    const RELATION: Relation = Relation::Inventory;

    fn from_row(row: &SourceRow) -> Self {
        Self {
            warehouse: row.text(col::WAREHOUSE),
            item_code: row.text(col::ITEM_CODE),
            item_name: row.text(col::SALES_ITEM_NAME),
            quantity: row.amount(col::STOCK_QUANTITY),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Inbound => 1.0,
            Direction::Outbound => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferLine {
    pub day: String,
    pub from_warehouse: String,
    pub to_warehouse: String,
    pub item_code: String,
    pub quantity: f64,
    pub weight: f64,
    pub group3: String,
}

impl TransferLine {
    /// A transfer moves stock out of one warehouse and into another; each leg is reported
    /// against its own warehouse with the sign of its direction.
    pub fn legs(&self) -> [(Direction, &str); 2] {
        [
            (Direction::Outbound, self.from_warehouse.as_str()),
            (Direction::Inbound, self.to_warehouse.as_str()),
        ]
    }
}

impl FromSourceRow for TransferLine {
    const RELATION: Relation = Relation::InventoryTransfers;

    fn from_row(row: &SourceRow) -> Self {
        Self {
            day: row.text(col::MONTH_DAY),
            from_warehouse: row.text(col::OUTBOUND_WAREHOUSE),
            to_warehouse: row.text(col::INBOUND_WAREHOUSE),
            item_code: row.text(col::ITEM_CODE),
            quantity: row.amount(col::QUANTITY),
            weight: row.amount(col::WEIGHT),
            group3: row.text(col::GROUP3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOrderLine {
    pub day: String,
    pub item_name: String,
    pub group1: String,
    pub total: f64,
    pub supplier: String,
    pub warehouse: String,
}

impl FromSourceRow for PurchaseOrderLine {
    const RELATION: Relation = Relation::PurchaseOrders;

    fn from_row(row: &SourceRow) -> Self {
        Self {
            day: row.text(col::MONTH_DAY),
            item_name: row.text(col::ORDER_ITEM_NAME),
            group1: row.text(col::GROUP1),
            total: row.amount(col::ORDER_TOTAL),
            supplier: row.text(col::PARTY),
            warehouse: row.text(col::WAREHOUSE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepositLine {
    pub date: String,
    /// Receiving account label, e.g. `우리-창원` or `신한카드`.
    pub account_label: String,
    pub account: String,
    pub department: String,
    pub customer_code: String,
    pub customer: String,
    pub amount: f64,
}

impl FromSourceRow for DepositLine {
    const RELATION: Relation = Relation::Deposits;

    fn from_row(row: &SourceRow) -> Self {
        Self {
            date: row.text(col::VOUCHER_DATE),
            account_label: row.text(col::ACCOUNT_LABEL),
            account: row.text(col::ACCOUNT),
            department: row.text(col::DEPARTMENT),
            customer_code: row.text(col::CUSTOMER_CODE),
            customer: row.text(col::PARTY),
            amount: row.amount(col::AMOUNT),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteLine {
    pub date: String,
    pub direction: String,
    pub department: String,
    pub increase: f64,
    pub decrease: f64,
    pub balance: f64,
}

impl FromSourceRow for NoteLine {
    const RELATION: Relation = Relation::PromissoryNotes;

    fn from_row(row: &SourceRow) -> Self {
        Self {
            date: row.text(col::DATE),
            direction: row.text(col::DIRECTION),
            department: row.text(col::DEPARTMENT),
            increase: row.amount(col::INCREASE),
            decrease: row.amount(col::DECREASE),
            balance: row.amount(col::BALANCE),
        }
    }
}

/// A general-ledger posting with its persisted running balance.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: i64,
    /// Storage format, `YYYY/MM/DD` with an optional voucher suffix.
    pub date: String,
    pub account: String,
    pub customer_code: String,
    pub counterparty: String,
    pub debit: f64,
    pub credit: f64,
    pub balance: f64,
}

impl FromSourceRow for LedgerEntry {
    const RELATION: Relation = Relation::Ledger;

    fn from_row(row: &SourceRow) -> Self {
        Self {
            id: row.id(),
            date: row.text(col::LEDGER_DATE),
            account: row.text(col::ACCOUNT),
            customer_code: row.text(col::CUSTOMER_CODE),
            counterparty: row.text(col::PARTY),
            debit: row.amount(col::DEBIT),
            credit: row.amount(col::CREDIT),
            balance: row.amount(col::BALANCE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseLine {
    pub date: String,
    pub account: String,
    pub department: String,
    pub amount: f64,
}

impl FromSourceRow for ExpenseLine {
    const RELATION: Relation = Relation::Expenses;

    fn from_row(row: &SourceRow) -> Self {
        Self {
            date: row.text(col::DATE),
            account: row.text(col::ACCOUNT),
            department: row.text(col::DEPARTMENT),
            amount: row.amount(col::AMOUNT),
        }
    }
}

/// Open order quantity not yet sold (pending sales) or not yet received (pending purchases).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLine {
    pub item_code: String,
    pub item_name: String,
    pub party: String,
    pub remaining: f64,
    pub amount: f64,
    pub due_date: String,
    pub warehouse: String,
    pub memo: String,
}

impl PendingLine {
    fn from_row_with_amount(row: &SourceRow, amount_column: &str) -> Self {
        Self {
            item_code: row.text(col::ITEM_CODE),
            item_name: row.text(col::ORDER_ITEM_NAME),
            party: row.text(col::PARTY),
            remaining: row.amount(col::REMAINING),
            amount: row.amount(amount_column),
            due_date: row.text(col::DUE_DATE),
            warehouse: row.text(col::WAREHOUSE),
            memo: row.text(col::MEMO),
        }
    }
}

/// Pending-sales rows carry their supply amount.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSale(pub PendingLine);

impl FromSourceRow for PendingSale {
    const RELATION: Relation = Relation::PendingSales;

    fn from_row(row: &SourceRow) -> Self {
        Self(PendingLine::from_row_with_amount(row, col::SUPPLY_AMOUNT))
    }
}

/// Pending-purchase rows carry their outstanding order total.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPurchase(pub PendingLine);

impl FromSourceRow for PendingPurchase {
    const RELATION: Relation = Relation::PendingPurchases;

    fn from_row(row: &SourceRow) -> Self {
        Self(PendingLine::from_row_with_amount(row, col::ORDER_TOTAL))
    }
}
