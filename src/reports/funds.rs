//! Funds status: ledger-backed balances for KRW, foreign-currency and loan accounts, each
//! with the previous day's balance, the day's increase and decrease, and the current
//! balance.

use super::ReportEngine;
use crate::balance::{daily_flow, derived_beginning, latest_balance, DailyFlow};
use crate::classifier::Classifier;
use crate::error::{ReportError, Result};
use crate::normalizer::previous_day;
use crate::records::{DepositLine, ExpenseLine, LedgerEntry, NoteLine};
use crate::schema::{FlowFallback, FundsGroup, FundsLineRule, NormalBalance};
use crate::source::{DateFilter, QueryExecutor};
use futures::try_join;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundLine {
    pub category: String,
    pub prev: f64,
    pub inc: f64,
    pub dec: f64,
    pub current: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundsReport {
    pub krw: Vec<FundLine>,
    pub foreign: Vec<FundLine>,
    pub loans: Vec<FundLine>,
    pub date: String,
}

impl FundsReport {
    pub fn lines(&self) -> impl Iterator<Item = &FundLine> {
        self.krw.iter().chain(&self.foreign).chain(&self.loans)
    }

    /// Checks that each line's beginning balance derived from the day's flow matches the
    /// balance read for the previous day. Lines whose flow came from a fallback source can
    /// legitimately fail this.
    pub fn verify(&self, tolerance: f64) -> Result<()> {
        for line in self.lines() {
            let derived = derived_beginning(line.current, DailyFlow::new(line.inc, line.dec));
            if (derived - line.prev).abs() > tolerance {
                return Err(ReportError::BalanceMismatch {
                    account: line.category.clone(),
                    date: self.date.clone(),
                    derived,
                    independent: line.prev,
                });
            }
        }
        Ok(())
    }
}

/// Same-day inputs for the flow fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackFlows {
    pub deposits_less_expenses: DailyFlow,
    pub promissory_notes: DailyFlow,
}

impl FallbackFlows {
    pub fn build(
        classifier: &Classifier<'_>,
        deposits: &[DepositLine],
        expenses: &[ExpenseLine],
        notes: &[NoteLine],
    ) -> Self {
        let received: f64 = deposits
            .iter()
            .filter(|d| classifier.is_receivable(&d.account))
            .map(|d| d.amount)
            .sum();
        let spent: f64 = expenses.iter().map(|e| e.amount).sum();
        let notes_flow = notes.iter().fold(DailyFlow::default(), |acc, n| {
            DailyFlow::new(acc.increase + n.increase, acc.decrease + n.decrease)
        });
        Self {
            deposits_less_expenses: DailyFlow::new(received, spent),
            promissory_notes: notes_flow,
        }
    }

    fn for_rule(&self, fallback: Option<FlowFallback>) -> DailyFlow {
        match fallback {
            Some(FlowFallback::DepositsLessExpenses) => self.deposits_less_expenses,
            Some(FlowFallback::PromissoryNotes) => self.promissory_notes,
            None => DailyFlow::default(),
        }
    }
}

fn fund_line(
    rule: &FundsLineRule,
    category: String,
    currency: Option<String>,
    entries: &[LedgerEntry],
    date: &str,
    fallback: DailyFlow,
) -> FundLine {
    let current = latest_balance(entries, &rule.matcher, date);
    let ledger_flow = daily_flow(entries, &rule.matcher, date);
    let ledger_flow = match rule.normal_balance {
        NormalBalance::Debit => ledger_flow,
        NormalBalance::Credit => ledger_flow.swapped(),
    };
    let flow = ledger_flow.or_fallback(fallback);

    let prev = match previous_day(date) {
        Some(day) => latest_balance(entries, &rule.matcher, &day),
        None => {
            warn!(
                "Cannot step back from '{}', deriving {} beginning from the day's flow",
                date, category
            );
            derived_beginning(current, flow)
        }
    };

    FundLine {
        category,
        prev,
        inc: flow.increase,
        dec: flow.decrease,
        current,
        currency,
    }
}

/// Per-currency lines for one foreign account family. Tracked currencies always appear;
/// any other detected currency is added after them.
fn foreign_lines(
    classifier: &Classifier<'_>,
    rule: &FundsLineRule,
    ledger: &[LedgerEntry],
    date: &str,
) -> Vec<FundLine> {
    let rules = &classifier.rules().funds;
    let currency_of = |entry: &LedgerEntry| {
        classifier
            .find_currency(&entry.account)
            .unwrap_or_else(|| classifier.detect_currency(&entry.counterparty))
    };

    let detected: BTreeSet<String> = ledger
        .iter()
        .filter(|e| rule.matcher.matches(&e.account))
        .map(currency_of)
        .collect();
    let mut currencies = rules.tracked_currencies.clone();
    currencies.extend(detected.into_iter().filter(|c| !rules.tracked_currencies.contains(c)));

    currencies
        .into_iter()
        .map(|currency| {
            let entries: Vec<LedgerEntry> = ledger
                .iter()
                .filter(|e| rule.matcher.matches(&e.account) && currency_of(e) == currency)
                .cloned()
                .collect();
            fund_line(
                rule,
                format!("{} ({})", rule.label, currency),
                Some(currency),
                &entries,
                date,
                DailyFlow::default(),
            )
        })
        .collect()
}

/// `ledger` must hold every posting on or before the report date; `fallbacks` is built from
/// the report day's deposits, expenses and notes.
pub fn build_funds(
    classifier: &Classifier<'_>,
    date: &str,
    ledger: &[LedgerEntry],
    fallbacks: &FallbackFlows,
) -> FundsReport {
    let mut report = FundsReport {
        krw: Vec::new(),
        foreign: Vec::new(),
        loans: Vec::new(),
        date: date.to_string(),
    };

    for rule in &classifier.rules().funds.lines {
        match rule.group {
            FundsGroup::Krw => report.krw.push(fund_line(
                rule,
                rule.label.clone(),
                None,
                ledger,
                date,
                fallbacks.for_rule(rule.fallback),
            )),
            FundsGroup::Loan => report.loans.push(fund_line(
                rule,
                rule.label.clone(),
                None,
                ledger,
                date,
                fallbacks.for_rule(rule.fallback),
            )),
            FundsGroup::Foreign => report
                .foreign
                .extend(foreign_lines(classifier, rule, ledger, date)),
        }
    }

    debug!(
        "Funds: {} KRW, {} foreign, {} loan lines",
        report.krw.len(),
        report.foreign.len(),
        report.loans.len()
    );
    report
}

impl<E: QueryExecutor> ReportEngine<E> {
    pub async fn funds(&self, date: &str) -> Result<FundsReport> {
        info!("Building funds status for {}", date);
        let day = || DateFilter::On(date.to_string());
        let (ledger, deposits, expenses, notes) = try_join!(
            self.fetch::<LedgerEntry>(DateFilter::OnOrBefore(date.to_string())),
            self.fetch::<DepositLine>(day()),
            self.fetch::<ExpenseLine>(day()),
            self.fetch::<NoteLine>(day()),
        )?;

        let classifier = self.classifier();
        let fallbacks = FallbackFlows::build(&classifier, &deposits, &expenses, &notes);
        Ok(build_funds(&classifier, date, &ledger, &fallbacks))
    }
}
