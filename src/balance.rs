//! As-of balances and same-day flows over the general ledger.
//!
//! Both read the same relation with different date predicates: a balance is the persisted
//! running balance of the latest posting on or before the cutoff, a flow is the sum of the
//! debit and credit columns on exactly one day.

use crate::normalizer::{storage_date_prefix, to_storage_date};
use crate::records::LedgerEntry;
use crate::schema::AccountMatcher;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyFlow {
    /// Sum of the debit column.
    pub increase: f64,
    /// Sum of the credit column.
    pub decrease: f64,
}

impl DailyFlow {
    pub fn new(increase: f64, decrease: f64) -> Self {
        Self { increase, decrease }
    }

    pub fn net(&self) -> f64 {
        self.increase - self.decrease
    }

    pub fn is_zero(&self) -> bool {
        self.increase == 0.0 && self.decrease == 0.0
    }

    /// Per-field `primary || fallback`: each side falls back independently, and only when
    /// the primary side is exactly zero. Never additive.
    pub fn or_fallback(self, fallback: DailyFlow) -> DailyFlow {
        DailyFlow {
            increase: prefer_primary(self.increase, fallback.increase),
            decrease: prefer_primary(self.decrease, fallback.decrease),
        }
    }

    /// Credit-normal accounts grow on the credit side.
    pub fn swapped(self) -> DailyFlow {
        DailyFlow {
            increase: self.decrease,
            decrease: self.increase,
        }
    }
}

/// Running balance as of `as_of` (ISO date, inclusive).
///
/// For each distinct account name accepted by the matcher, the posting with the maximum id
/// among those dated on or before the cutoff supplies the balance; the per-account balances
/// are summed. Accounts with no qualifying posting contribute zero.
pub fn latest_balance(entries: &[LedgerEntry], matcher: &AccountMatcher, as_of: &str) -> f64 {
    latest_balances(entries, matcher, as_of)
        .values()
        .map(|entry| entry.balance)
        .sum()
}

/// The latest posting per matching account name, as of the cutoff.
pub fn latest_balances<'a>(
    entries: &'a [LedgerEntry],
    matcher: &AccountMatcher,
    as_of: &str,
) -> BTreeMap<&'a str, &'a LedgerEntry> {
    let cutoff = to_storage_date(as_of);
    let mut latest: BTreeMap<&str, &LedgerEntry> = BTreeMap::new();

    for entry in entries {
        let date = storage_date_prefix(&entry.date);
        if date.is_empty() || date > cutoff.as_str() || !matcher.matches(&entry.account) {
            continue;
        }
        let slot = latest.entry(entry.account.trim()).or_insert(entry);
        if entry.id > slot.id {
            *slot = entry;
        }
    }

    latest
}

/// Debit and credit totals for matching accounts on exactly `day` (ISO date).
pub fn daily_flow(entries: &[LedgerEntry], matcher: &AccountMatcher, day: &str) -> DailyFlow {
    let target = to_storage_date(day);
    entries
        .iter()
        .filter(|e| storage_date_prefix(&e.date) == target && matcher.matches(&e.account))
        .fold(DailyFlow::default(), |acc, e| DailyFlow {
            increase: acc.increase + e.debit,
            decrease: acc.decrease + e.credit,
        })
}

/// `primary || fallback`: the fallback is used only when the primary value is exactly zero.
pub fn prefer_primary(primary: f64, fallback: f64) -> f64 {
    if primary != 0.0 {
        primary
    } else {
        fallback
    }
}

/// Algebraic beginning balance, `ending - (increase - decrease)`.
pub fn derived_beginning(ending: f64, flow: DailyFlow) -> f64 {
    ending - flow.net()
}
