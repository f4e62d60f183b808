//! Maps free-text branch, account and product-group values onto reporting dimensions.
//!
//! Every function here is total: a value that matches no rule still lands in a fallback
//! bucket, never in an error.

use crate::schema::{ClosingCategory, FundsLineRule, RuleTables};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([A-Z]{3})\)").expect("invalid currency regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollectionMethod {
    Cash,
    Card,
}

/// Which side of a trade a closing category is computed for. Sales and inventory use
/// different labels for the unmatched bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosingSide {
    Sales,
    Inventory,
}

/// Counterparty of a closing-sheet row. Customer-only rules never match a supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosingParty<'s> {
    Customer(&'s str),
    Supplier(&'s str),
}

impl<'s> ClosingParty<'s> {
    pub fn name(self) -> &'s str {
        match self {
            ClosingParty::Customer(name) | ClosingParty::Supplier(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    rules: &'a RuleTables,
}

impl<'a> Classifier<'a> {
    pub fn new(rules: &'a RuleTables) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'a RuleTables {
        self.rules
    }

    /// Canonical branch for raw branch/department/warehouse text.
    ///
    /// Exact codes win first, then the first keyword contained in the text (list order),
    /// otherwise the text with branch suffixes and all whitespace removed.
    pub fn classify_branch(&self, raw: &str) -> String {
        let text = raw.trim();
        let rules = &self.rules.branch;

        if let Some(code) = rules.exact_codes.iter().find(|c| c.as_str() == text) {
            return code.clone();
        }
        if let Some(keyword) = rules.keywords.iter().find(|k| text.contains(k.as_str())) {
            return keyword.clone();
        }

        let mut stripped = text.to_string();
        for suffix in &rules.strip_suffixes {
            stripped = stripped.replace(suffix.as_str(), "");
        }
        stripped.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Branch-inclusion filter: does this text name a real branch (as opposed to head
    /// office or an unclassified department)?
    pub fn is_branch(&self, raw: &str) -> bool {
        let text = raw.trim();
        if text.is_empty() {
            return false;
        }
        let rules = &self.rules.branch;
        rules.exact_codes.iter().any(|c| c == text)
            || rules
                .inclusion_markers
                .iter()
                .any(|m| text.contains(m.as_str()))
            || rules.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// Whole-company division test: the text names a branch office (사업소 / 지사). Unlike
    /// [`Classifier::is_branch`], exact codes and bare keywords do not count.
    pub fn is_division_office(&self, raw: &str) -> bool {
        let text = raw.trim();
        !text.is_empty()
            && self
                .rules
                .branch
                .inclusion_markers
                .iter()
                .any(|m| text.contains(m.as_str()))
    }

    /// Canonical branch when the text passes the inclusion filter.
    pub fn branch_of(&self, raw: &str) -> Option<String> {
        if self.is_branch(raw) {
            Some(self.classify_branch(raw))
        } else {
            None
        }
    }

    /// True when `name` is one of the configured canonical branches.
    pub fn is_canonical_branch(&self, name: &str) -> bool {
        let rules = &self.rules.branch;
        rules.exact_codes.iter().any(|c| c == name) || rules.keywords.iter().any(|k| k == name)
    }

    pub fn classify_category(&self, group1: &str) -> &'a str {
        let code = group1.trim();
        let rules = &self.rules.category;
        rules
            .groups
            .iter()
            .find(|g| g.codes.iter().any(|c| c == code))
            .map(|g| g.label.as_str())
            .unwrap_or(rules.fallback.as_str())
    }

    pub fn classify_tier(&self, group3: &str) -> &'a str {
        let rules = &self.rules.category;
        if group3.trim() == rules.flagship_code {
            rules.flagship_label.as_str()
        } else {
            rules.tier_fallback.as_str()
        }
    }

    pub fn is_flagship(&self, group3: &str) -> bool {
        group3.trim() == self.rules.category.flagship_code
    }

    /// Composite `{Category}_{Tier}` key used by the inventory rollups.
    pub fn category_tier_key(&self, group1: &str, group3: &str) -> String {
        format!(
            "{}_{}",
            self.classify_category(group1),
            self.classify_tier(group3)
        )
    }

    pub fn is_mobil_group(&self, group1: &str) -> bool {
        let code = group1.trim();
        self.rules.mobil.product_groups.iter().any(|g| g == code)
    }

    pub fn has_mobil_name(&self, item_name: &str) -> bool {
        let name = item_name.trim();
        self.rules
            .mobil
            .name_prefixes
            .iter()
            .any(|p| name.starts_with(p.as_str()))
    }

    /// Mobil-named items whose group code is outside the Mobil group table; they are kept out
    /// of the category measures and reported in a footnote instead.
    pub fn is_unclassified_mobil(&self, item_name: &str, group1: &str) -> bool {
        self.has_mobil_name(item_name) && !self.is_mobil_group(group1)
    }

    /// Industry group label for a purchase-order product group, if any.
    pub fn industry_group(&self, group1: &str) -> Option<&'a str> {
        let code = group1.trim();
        self.rules
            .mobil
            .industry_groups
            .iter()
            .find(|g| g.codes.iter().any(|c| c == code))
            .map(|g| g.label.as_str())
    }

    /// Each payment row gets exactly one method. Bank-branch accounts are cash even when the
    /// label mentions a card; only pure card/PG settlement accounts count as card.
    pub fn collection_method(&self, account_label: &str) -> CollectionMethod {
        let rules = &self.rules.collection;
        let card_like = rules
            .card_markers
            .iter()
            .any(|m| account_label.contains(m.as_str()));
        let bank = rules
            .bank_prefixes
            .iter()
            .any(|p| account_label.contains(p.as_str()));
        if card_like && !bank {
            CollectionMethod::Card
        } else {
            CollectionMethod::Cash
        }
    }

    pub fn is_receivable(&self, account: &str) -> bool {
        account.trim() == self.rules.collection.receivable_account
    }

    pub fn is_note_increase(&self, direction: &str) -> bool {
        direction.trim() == self.rules.collection.note_increase
    }

    /// Funds line an account belongs to. Accounts matching no line are left out of the
    /// funds report entirely.
    pub fn classify_funds_account(&self, account: &str) -> Option<&'a FundsLineRule> {
        self.rules
            .funds
            .lines
            .iter()
            .find(|line| line.matcher.matches(account))
    }

    /// Parenthesized three-letter currency code in free text, e.g. `외화예금(EUR)`.
    pub fn find_currency(&self, text: &str) -> Option<String> {
        currency_re()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    pub fn detect_currency(&self, text: &str) -> String {
        self.find_currency(text)
            .unwrap_or_else(|| self.rules.funds.default_currency.clone())
    }

    /// Closing-sheet category of a sales or purchase row: first matching category in
    /// priority order, else the side's fallback bucket.
    pub fn closing_category(
        &self,
        side: ClosingSide,
        party: ClosingParty<'_>,
        group1: &str,
        warehouse: &str,
    ) -> ClosingMatch<'a> {
        let rules = &self.rules.closing;
        let (code, warehouse) = (group1.trim(), warehouse.trim());

        if let Some(category) = rules
            .categories
            .iter()
            .find(|c| closing_rule_matches(c, party, code, warehouse))
        {
            return ClosingMatch {
                label: category.label.as_str(),
                zero_amount: category.zero_amount,
            };
        }

        let label = match side {
            ClosingSide::Sales => rules.sales_fallback.as_str(),
            ClosingSide::Inventory => rules.inventory_fallback.as_str(),
        };
        ClosingMatch {
            label,
            zero_amount: false,
        }
    }

    /// Labels in sheet order for one side, fallback last.
    pub fn closing_labels(&self, side: ClosingSide) -> Vec<&'a str> {
        let rules = &self.rules.closing;
        let mut labels: Vec<&str> = rules.sheet_order.iter().map(String::as_str).collect();
        labels.push(match side {
            ClosingSide::Sales => rules.sales_fallback.as_str(),
            ClosingSide::Inventory => rules.inventory_fallback.as_str(),
        });
        labels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosingMatch<'a> {
    pub label: &'a str,
    /// Sales amounts in this category are reported as zero (weights still count).
    pub zero_amount: bool,
}

fn closing_rule_matches(
    category: &ClosingCategory,
    party: ClosingParty<'_>,
    code: &str,
    warehouse: &str,
) -> bool {
    let customer = matches!(party, ClosingParty::Customer(_));
    let party = party.name().trim();
    let by_party = !party.is_empty()
        && (category
            .party_prefixes
            .iter()
            .any(|p| party.starts_with(p.as_str()))
            || category.party_names.iter().any(|n| n == party));
    let by_code = !code.is_empty() && category.group_codes.iter().any(|g| g == code);
    let ungrouped = code.is_empty()
        && ((!warehouse.is_empty() && category.ungrouped_warehouses.iter().any(|w| w == warehouse))
            || (customer && !party.is_empty() && category.ungrouped_parties.iter().any(|p| p == party)));
    by_party || by_code || ungrouped
}
