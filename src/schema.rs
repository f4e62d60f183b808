use crate::error::{ReportError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Current revision of the built-in rule tables. Bump when any ordered list or priority
/// table changes so reports produced under different rules can be told apart.
pub const RULES_VERSION: u32 = 3;

/// Every keyword list and priority table the reports consume.
///
/// One instance is shared by all reports of an engine, so branch and category
/// classification can never drift between relations that are merged together.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RuleTables {
    #[schemars(description = "Revision of this rule set")]
    pub version: u32,

    #[schemars(description = "Branch normalization and branch-inclusion rules")]
    pub branch: BranchRules,

    #[schemars(description = "Product-group code to category and tier mapping")]
    pub category: CategoryRules,

    #[schemars(description = "Categories used by the daily closing sheet")]
    pub closing: ClosingRules,

    #[schemars(description = "Collection-method rules for receivable deposits")]
    pub collection: CollectionRules,

    #[schemars(description = "Ledger accounts that make up the funds report")]
    pub funds: FundsRules,

    #[schemars(description = "Mobil product groups, name prefixes and industry groups")]
    pub mobil: MobilRules,

    #[schemars(description = "Kilograms per drum (D/M). Weight columns are divided by this.")]
    pub kg_per_drum: f64,

    #[schemars(description = "Report date used when the caller supplies none (YYYY-MM-DD)")]
    pub default_date: String,

    #[schemars(description = "Report year used when the caller supplies none (YYYY)")]
    pub default_year: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BranchRules {
    #[schemars(description = "Codes that win on exact equality before any keyword test (e.g. MB)")]
    pub exact_codes: Vec<String>,

    #[schemars(description = "Ordered branch keywords; the first one contained in the text wins")]
    pub keywords: Vec<String>,

    #[schemars(description = "Suffixes stripped from unmatched text (e.g. 사업소, 지사, 본사)")]
    pub strip_suffixes: Vec<String>,

    #[schemars(description = "Markers that identify a real branch in free text (e.g. 사업소, 지사)")]
    pub inclusion_markers: Vec<String>,

    #[schemars(description = "Division parameter values meaning 'no filter' (e.g. 전체, all)")]
    pub whole_company: Vec<String>,

    #[schemars(description = "Division-specific sales filters that replace the generic rule")]
    pub sales_overrides: Vec<DivisionOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DivisionOverride {
    pub division: String,
    #[schemars(description = "Warehouse names (exact) that belong to the division")]
    pub warehouses: Vec<String>,
    #[schemars(description = "Customer names (exact) that belong to the division")]
    pub customers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryRules {
    #[schemars(description = "Priority-ordered category groups keyed by product group 1 code")]
    pub groups: Vec<CodeGroup>,
    pub fallback: String,
    #[schemars(description = "Product group 3 code marking the flagship tier")]
    pub flagship_code: String,
    pub flagship_label: String,
    pub tier_fallback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CodeGroup {
    pub label: String,
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClosingRules {
    #[schemars(description = "Priority-ordered closing categories")]
    pub categories: Vec<ClosingCategory>,
    #[schemars(description = "Order of the category rows on the closing sheet; fallback row goes last")]
    pub sheet_order: Vec<String>,
    #[schemars(description = "Label for sales rows matching no category")]
    pub sales_fallback: String,
    #[schemars(description = "Label for inventory rows matching no category")]
    pub inventory_fallback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClosingCategory {
    pub label: String,
    #[serde(default)]
    pub party_prefixes: Vec<String>,
    #[serde(default)]
    pub party_names: Vec<String>,
    #[serde(default)]
    pub group_codes: Vec<String>,
    #[schemars(description = "Rows without a product group fall here when the warehouse matches")]
    #[serde(default)]
    pub ungrouped_warehouses: Vec<String>,
    #[schemars(description = "Sales rows without a product group fall here when the customer matches")]
    #[serde(default)]
    pub ungrouped_parties: Vec<String>,
    #[schemars(description = "Sales amounts of this category are reported as zero")]
    #[serde(default)]
    pub zero_amount: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CollectionRules {
    #[schemars(description = "Only deposits booked to this account count as collections")]
    pub receivable_account: String,
    #[schemars(description = "Account-label fragments marking a card or PG settlement")]
    pub card_markers: Vec<String>,
    #[schemars(description = "Bank-branch account prefixes; these always count as cash")]
    pub bank_prefixes: Vec<String>,
    pub note_increase: String,
    pub cash_label: String,
    pub note_label: String,
    pub card_label: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FundsGroup {
    Krw,
    Foreign,
    Loan,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NormalBalance {
    #[schemars(description = "Debits increase the balance (assets)")]
    Debit,
    #[schemars(description = "Credits increase the balance (loans, liabilities)")]
    Credit,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "match", content = "value", rename_all = "snake_case")]
pub enum AccountMatcher {
    Prefix(String),
    Exact(Vec<String>),
}

impl AccountMatcher {
    pub fn matches(&self, account: &str) -> bool {
        let account = account.trim();
        match self {
            AccountMatcher::Prefix(prefix) => account.starts_with(prefix.as_str()),
            AccountMatcher::Exact(names) => names.iter().any(|n| n == account),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowFallback {
    #[schemars(description = "Receivable deposits as increase, expenses as decrease")]
    DepositsLessExpenses,
    #[schemars(description = "Promissory note increases and decreases")]
    PromissoryNotes,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FundsLineRule {
    pub label: String,
    pub group: FundsGroup,
    pub matcher: AccountMatcher,
    pub normal_balance: NormalBalance,
    #[serde(default)]
    pub fallback: Option<FlowFallback>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FundsRules {
    pub lines: Vec<FundsLineRule>,
    #[schemars(description = "Currencies always present in the foreign section, zero-filled")]
    pub tracked_currencies: Vec<String>,
    pub default_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MobilRules {
    #[schemars(description = "Product group 1 codes counted as Mobil products")]
    pub product_groups: Vec<String>,
    #[schemars(description = "Product-name prefixes identifying Mobil items outside the group table")]
    pub name_prefixes: Vec<String>,
    #[schemars(description = "Supplier-name fragment identifying Mobil purchase orders")]
    pub supplier_marker: String,
    #[schemars(description = "Tie-break ordered industry groups for Mobil payments")]
    pub industry_groups: Vec<CodeGroup>,
    pub unknown_branch: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn code_group(label: &str, codes: &[&str]) -> CodeGroup {
    CodeGroup {
        label: label.to_string(),
        codes: strings(codes),
    }
}

fn funds_line(
    label: &str,
    group: FundsGroup,
    matcher: AccountMatcher,
    normal_balance: NormalBalance,
    fallback: Option<FlowFallback>,
) -> FundsLineRule {
    FundsLineRule {
        label: label.to_string(),
        group,
        matcher,
        normal_balance,
        fallback,
    }
}

fn exact(names: &[&str]) -> AccountMatcher {
    AccountMatcher::Exact(strings(names))
}

impl Default for RuleTables {
    fn default() -> Self {
        use FundsGroup::*;
        use NormalBalance::*;

        Self {
            version: RULES_VERSION,
            branch: BranchRules {
                exact_codes: strings(&["MB"]),
                keywords: strings(&["화성", "창원", "남부", "중부", "서부", "동부", "제주", "부산"]),
                strip_suffixes: strings(&["사업소", "지사", "본사"]),
                inclusion_markers: strings(&["사업소", "지사"]),
                whole_company: strings(&["전체", "all"]),
                sales_overrides: vec![DivisionOverride {
                    division: "창원".to_string(),
                    warehouses: strings(&["창원"]),
                    customers: strings(&["테크젠 주식회사"]),
                }],
            },
            category: CategoryRules {
                groups: vec![
                    code_group("Auto", &["PVL", "CVL"]),
                    code_group("IL", &["IL"]),
                    code_group("MB", &["MB", "AVI"]),
                ],
                fallback: "Others".to_string(),
                flagship_code: "FLA".to_string(),
                flagship_label: "Flagship".to_string(),
                tier_fallback: "Others".to_string(),
            },
            closing: ClosingRules {
                categories: vec![
                    ClosingCategory {
                        label: "Mobil-MB".to_string(),
                        party_prefixes: strings(&["메르세데스벤츠"]),
                        party_names: Vec::new(),
                        group_codes: strings(&["MB"]),
                        ungrouped_warehouses: Vec::new(),
                        ungrouped_parties: Vec::new(),
                        zero_amount: true,
                    },
                    ClosingCategory {
                        label: "훅스".to_string(),
                        party_prefixes: Vec::new(),
                        party_names: strings(&["셰플러코리아 유한책임회사", "한백윤활유"]),
                        group_codes: strings(&["FU"]),
                        ungrouped_warehouses: Vec::new(),
                        ungrouped_parties: Vec::new(),
                        zero_amount: false,
                    },
                    ClosingCategory {
                        label: "블라자".to_string(),
                        party_prefixes: Vec::new(),
                        party_names: Vec::new(),
                        group_codes: strings(&["BL"]),
                        ungrouped_warehouses: Vec::new(),
                        ungrouped_parties: Vec::new(),
                        zero_amount: false,
                    },
                    ClosingCategory {
                        label: "Mobil".to_string(),
                        party_prefixes: Vec::new(),
                        party_names: Vec::new(),
                        group_codes: strings(&["IL", "PVL", "CVL", "AVI"]),
                        ungrouped_warehouses: strings(&["창원"]),
                        ungrouped_parties: strings(&["테크젠 주식회사"]),
                        zero_amount: false,
                    },
                ],
                sheet_order: strings(&["Mobil", "Mobil-MB", "블라자", "훅스"]),
                sales_fallback: "기타(셸 외 타사제품)".to_string(),
                inventory_fallback: "기타".to_string(),
            },
            collection: CollectionRules {
                receivable_account: "외상매출금".to_string(),
                card_markers: strings(&["카드", "이니시스"]),
                bank_prefixes: strings(&["우리-", "기업-", "국민-", "신한-", "농협-", "하나-"]),
                note_increase: "증가".to_string(),
                cash_label: "Cash".to_string(),
                note_label: "어음".to_string(),
                card_label: "카드".to_string(),
            },
            funds: FundsRules {
                lines: vec![
                    funds_line(
                        "보통예금",
                        Krw,
                        exact(&["보통예금"]),
                        Debit,
                        Some(FlowFallback::DepositsLessExpenses),
                    ),
                    funds_line(
                        "받을어음",
                        Krw,
                        exact(&["받을어음"]),
                        Debit,
                        Some(FlowFallback::PromissoryNotes),
                    ),
                    funds_line(
                        "현금 시재금",
                        Krw,
                        AccountMatcher::Prefix("현금 시재금".to_string()),
                        Debit,
                        None,
                    ),
                    funds_line("적금", Krw, exact(&["적금"]), Debit, None),
                    funds_line("보험", Krw, exact(&["보험", "보험예치금"]), Debit, None),
                    funds_line(
                        "기타단기금융상품",
                        Krw,
                        exact(&["기타단기금융상품"]),
                        Debit,
                        None,
                    ),
                    funds_line("퇴직연금", Krw, exact(&["퇴직연금", "퇴직연금운용자산"]), Debit, None),
                    funds_line(
                        "외화예금",
                        Foreign,
                        AccountMatcher::Prefix("외화예금".to_string()),
                        Debit,
                        None,
                    ),
                    funds_line(
                        "외화정기예금",
                        Foreign,
                        AccountMatcher::Prefix("외화정기예금".to_string()),
                        Debit,
                        None,
                    ),
                    funds_line("한도대출잔액", Loan, exact(&["한도대출", "한도대출잔액"]), Credit, None),
                    funds_line("단기차입금", Loan, exact(&["단기차입금"]), Credit, None),
                    funds_line("장기차입금", Loan, exact(&["장기차입금"]), Credit, None),
                ],
                tracked_currencies: strings(&["USD", "JPY", "EUR", "GBP"]),
                default_currency: "USD".to_string(),
            },
            mobil: MobilRules {
                product_groups: strings(&["IL", "PVL", "MB", "CVL", "AVI", "MAR"]),
                name_prefixes: strings(&["MOBIL", "Mobil"]),
                supplier_marker: "모빌".to_string(),
                industry_groups: vec![
                    code_group("IL", &["IL"]),
                    code_group("AUTO", &["PVL", "CVL"]),
                    code_group("MBK", &["MB", "AVI"]),
                ],
                unknown_branch: "기타".to_string(),
            },
            kg_per_drum: 200.0,
            default_date: "2026-02-03".to_string(),
            default_year: "2026".to_string(),
        }
    }
}

impl RuleTables {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let rules: RuleTables = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<()> {
        if self.branch.keywords.is_empty() {
            return Err(ReportError::InvalidRuleTable(
                "branch keyword list must not be empty".to_string(),
            ));
        }
        if self.branch.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ReportError::InvalidRuleTable(
                "branch keywords must not be blank".to_string(),
            ));
        }
        if self.kg_per_drum.is_nan() || self.kg_per_drum <= 0.0 {
            return Err(ReportError::InvalidRuleTable(format!(
                "kg_per_drum must be positive, got {}",
                self.kg_per_drum
            )));
        }
        if self.mobil.industry_groups.is_empty() {
            return Err(ReportError::InvalidRuleTable(
                "at least one industry group is required".to_string(),
            ));
        }

        for label in &self.closing.sheet_order {
            if !self.closing.categories.iter().any(|c| c.label == *label) {
                return Err(ReportError::InvalidRuleTable(format!(
                    "closing sheet lists unknown category '{}'",
                    label
                )));
            }
        }

        let mut labels = HashSet::new();
        for line in &self.funds.lines {
            if !labels.insert(line.label.as_str()) {
                return Err(ReportError::InvalidRuleTable(format!(
                    "duplicate funds line '{}'",
                    line.label
                )));
            }
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RuleTables)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
