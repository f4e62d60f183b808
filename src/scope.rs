//! Division filters for the division-scoped reports (closing sheet, customer detail, stock
//! overview).

use crate::classifier::Classifier;
use crate::records::{PurchaseLine, SaleLine};
use crate::schema::DivisionOverride;
use log::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DivisionScope {
    /// `전체` / `all`: every row whose branch text names a branch office.
    WholeCompany,
    /// A canonical branch; rows are matched through the shared branch classifier.
    Branch(String),
    /// Anything else; matched by substring on the raw branch text.
    Named(String),
}

impl DivisionScope {
    pub fn resolve(classifier: &Classifier<'_>, division: &str) -> Self {
        let division = division.trim();
        let rules = &classifier.rules().branch;
        if division.is_empty() || rules.whole_company.iter().any(|w| w == division) {
            return DivisionScope::WholeCompany;
        }
        if classifier.is_canonical_branch(division) {
            return DivisionScope::Branch(division.to_string());
        }
        warn!(
            "Division '{}' is not a known branch, falling back to substring matching",
            division
        );
        DivisionScope::Named(division.to_string())
    }

    pub fn label(&self) -> &str {
        match self {
            DivisionScope::WholeCompany => "전체",
            DivisionScope::Branch(name) | DivisionScope::Named(name) => name,
        }
    }

    /// Branch/department text test shared by every relation.
    pub fn matches_text(&self, classifier: &Classifier<'_>, text: &str) -> bool {
        match self {
            DivisionScope::WholeCompany => classifier.is_division_office(text),
            DivisionScope::Branch(branch) => {
                let text = text.trim();
                if classifier.rules().branch.exact_codes.contains(branch) {
                    return text == branch;
                }
                !text.is_empty() && classifier.classify_branch(text) == *branch
            }
            DivisionScope::Named(needle) => text.contains(needle.as_str()),
        }
    }

    fn sales_override<'a>(&self, classifier: &Classifier<'a>) -> Option<&'a DivisionOverride> {
        let division = match self {
            DivisionScope::WholeCompany => return None,
            DivisionScope::Branch(name) | DivisionScope::Named(name) => name,
        };
        classifier
            .rules()
            .branch
            .sales_overrides
            .iter()
            .find(|o| o.division == *division)
    }

    pub fn matches_sale(&self, classifier: &Classifier<'_>, sale: &SaleLine) -> bool {
        if let Some(rule) = self.sales_override(classifier) {
            return rule.warehouses.iter().any(|w| *w == sale.warehouse)
                || rule.customers.iter().any(|c| *c == sale.customer);
        }
        self.matches_text(classifier, &sale.branch_text)
            || (*self != DivisionScope::WholeCompany
                && self.matches_text(classifier, &sale.warehouse))
    }

    pub fn matches_purchase(&self, classifier: &Classifier<'_>, purchase: &PurchaseLine) -> bool {
        self.matches_text(classifier, &purchase.branch_text)
            || (*self != DivisionScope::WholeCompany
                && self.matches_text(classifier, &purchase.warehouse))
    }
}
