//! # Branch Report Engine
//!
//! A library for rolling loosely-typed ledger rows (sales, purchases, stock, transfers,
//! deposits, promissory notes, general ledger, expenses) into daily and monthly branch
//! reports with consistent classification across every source.
//!
//! ## Core Concepts
//!
//! - **Source rows**: untyped column maps read through a [`QueryExecutor`]; every cell is
//!   coerced by the value normalizer, so dirty data degrades to zero or empty text
//! - **Rule tables**: one versioned [`RuleTables`] bundle of ordered keyword lists and
//!   priority tables, shared by every report so branch totals reconcile across reports
//! - **Partial aggregates**: each relation is reduced on its own and the partial maps are
//!   outer-merged, zero-filling keys one side lacks
//! - **Balance vs. flow**: as-of balances take the latest posting on or before a cutoff;
//!   flows sum the debit and credit columns on exactly one day
//!
//! ## Example
//!
//! ```rust,ignore
//! use branch_report_engine::*;
//!
//! let mut store = InMemoryStore::new();
//! store.load_json(Relation::Deposits, deposits_json)?;
//! store.load_json(Relation::PromissoryNotes, notes_json)?;
//!
//! let engine = ReportEngine::new(store);
//! let request = ReportRequest::new(ReportKind::DailyCollections, ReportParams::on("2026-02-03"));
//! let response = engine.respond(&request).await;
//! println!("{}", response.to_json()?);
//! ```

pub mod aggregator;
pub mod balance;
pub mod classifier;
pub mod error;
pub mod normalizer;
pub mod records;
pub mod reports;
pub mod schema;
pub mod scope;
pub mod source;

pub use aggregator::{aggregate, beginning_inventory, outer_merge, rank_by_total, Aggregator};
pub use balance::{daily_flow, derived_beginning, latest_balance, prefer_primary, DailyFlow};
pub use classifier::{Classifier, ClosingMatch, ClosingParty, ClosingSide, CollectionMethod};
pub use error::{ReportError, Result};
pub use normalizer::*;
pub use records::*;
pub use reports::*;
pub use schema::*;
pub use scope::DivisionScope;
pub use source::{
    columns, ColumnKind, ColumnSpec, DateFilter, FailingStore, InMemoryStore, PartyFilter,
    QueryExecutor, Relation, SourceQuery, SourceRow,
};

use log::info;

/// Runs one report with a custom rule set. Invalid rules and failed reads both come back as
/// a failure response rather than an error.
pub async fn run_report<E: QueryExecutor>(
    executor: E,
    rules: RuleTables,
    request: &ReportRequest,
) -> ReportResponse {
    info!(
        "Running {} report with rules v{}",
        request.kind.name(),
        rules.version
    );
    match ReportEngine::with_rules(executor, rules) {
        Ok(engine) => engine.respond(request).await,
        Err(err) => ReportResponse::failure(&err),
    }
}

/// Runs one report with the built-in rule set.
pub async fn run_default_report<E: QueryExecutor>(
    executor: E,
    request: &ReportRequest,
) -> ReportResponse {
    run_report(executor, RuleTables::default(), request).await
}
