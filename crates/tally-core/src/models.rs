//! Domain models for Tally
//!
//! Every persisted record serializes with camelCase keys so the JSON export and
//! backup documents use the same field names as the interchange format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::balance::amounts_match;
use crate::error::{Error, Result};

/// A user profile. Every account, category and transaction belongs to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub name: String,
    /// Lower-cased name, unique across profiles
    pub name_lower: String,
    /// Argon2id PHC string
    pub pin_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    /// Legacy opening balance from before accounts existed
    pub starting_balance: Option<f64>,
}

/// A bank or other financial account owned by a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub bank_name: String,
    /// Last digits only, for display
    pub account_number: String,
    pub nickname: String,
    /// Balance when the account was created; never changes afterwards
    pub starting_balance: f64,
    pub is_primary: bool,
    pub is_active: bool,
    pub icon: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account annotated with the balance derived from its transactions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountWithBalance {
    #[serde(flatten)]
    pub account: Account,
    pub current_balance: f64,
}

/// A new account to be created
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub bank_name: String,
    pub account_number: String,
    /// Derived from bank and number when not given
    pub nickname: Option<String>,
    pub starting_balance: f64,
    /// Ignored for a profile's first account, which is always primary
    pub is_primary: bool,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// Changes to an existing account. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub nickname: Option<String>,
    pub is_primary: Option<bool>,
    pub is_active: Option<bool>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// Display icon and color for an account, looked up from its bank name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankStyle {
    pub icon: &'static str,
    pub color: &'static str,
}

pub const GENERIC_BANK_STYLE: BankStyle = BankStyle {
    icon: "🏦",
    color: "#6B7280",
};

/// Look up the icon and color for a bank, falling back to a generic style
pub fn bank_style(bank_name: &str) -> BankStyle {
    let bank = bank_name.trim().to_lowercase();
    let style = match bank.as_str() {
        "bml" | "bank of maldives" => ("🏝️", "#E31837"),
        "mib" | "maldives islamic bank" => ("🕌", "#00843D"),
        "sbi" | "state bank of india" => ("🏛️", "#22409A"),
        "hsbc" => ("🔺", "#DB0011"),
        "ccbm" | "commercial bank of maldives" => ("💼", "#F7941D"),
        "cash" | "wallet" => ("💵", "#16A34A"),
        _ => return GENERIC_BANK_STYLE,
    };
    BankStyle {
        icon: style.0,
        color: style.1,
    }
}

/// Nickname shown for an account that was never given one
pub fn default_nickname(bank_name: &str, account_number: &str) -> String {
    let bank = bank_name.trim();
    let number = account_number.trim();
    match (bank.is_empty(), number.is_empty()) {
        (true, true) => "Account".to_string(),
        (false, true) => bank.to_string(),
        (true, false) => format!("Account {}", number),
        (false, false) => format!("{} {}", bank, number),
    }
}

/// Category kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    #[default]
    Expense,
    Income,
    Transfer,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Transfer => "transfer",
        }
    }
}

impl std::str::FromStr for CategoryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("Unknown category type: {}", s)),
        }
    }
}

impl std::fmt::Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spending or income category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Localized label
    pub name_dv: Option<String>,
    pub icon: String,
    pub color: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    /// Monthly ceiling, 0 = unset
    pub budget: f64,
}

/// A new category to be created
#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub name_dv: Option<String>,
    pub icon: String,
    pub color: String,
    pub category_type: CategoryType,
    pub budget: f64,
}

/// Changes to an existing category
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub name_dv: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub category_type: Option<CategoryType>,
    pub budget: Option<f64>,
}

/// Direction of a transaction. The stored amount is always a magnitude.
///
/// Imported files may carry other labels; those are kept lower-cased as
/// `Other` and count toward neither side of a balance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    #[default]
    Debit,
    Credit,
    Other(String),
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Normalize a free-form label: income/credit and expense/debit collapse,
    /// anything else is kept lower-cased, empty means debit.
    pub fn normalize(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "" | "expense" | "debit" => Self::Debit,
            "income" | "credit" => Self::Credit,
            _ => Self::Other(label),
        }
    }
}

impl From<String> for TransactionType {
    fn from(s: String) -> Self {
        Self::normalize(&s)
    }
}

impl From<TransactionType> for String {
    fn from(t: TransactionType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a transaction entered the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSource {
    /// Entered by hand
    #[default]
    Manual,
    /// Imported from a CSV file
    Csv,
    /// Merged from a backup document
    Backup,
    /// Confirmed from a scanned receipt draft
    Receipt,
    /// Created by a recurring schedule
    Recurring,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Csv => "csv",
            Self::Backup => "backup",
            Self::Receipt => "receipt",
            Self::Recurring => "recurring",
        }
    }
}

impl std::str::FromStr for TransactionSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "csv" => Ok(Self::Csv),
            "backup" | "legacy" => Ok(Self::Backup),
            "receipt" | "scan" => Ok(Self::Receipt),
            "recurring" => Ok(Self::Recurring),
            _ => Err(format!("Unknown transaction source: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of a split transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub note: Option<String>,
}

/// A financial transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub account_id: Option<i64>,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Always non-negative; direction comes from `transaction_type`
    pub amount: f64,
    /// Category name, not a foreign key
    pub category: String,
    pub merchant: String,
    pub bank: String,
    pub account_number: String,
    pub description: String,
    pub source: TransactionSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub splits: Option<Vec<Split>>,
}

/// A new transaction (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub category: String,
    pub merchant: String,
    pub bank: String,
    pub account_number: String,
    pub description: String,
    pub source: TransactionSource,
    pub splits: Option<Vec<Split>>,
}

impl Default for NewTransaction {
    fn default() -> Self {
        Self {
            account_id: None,
            date: Utc::now(),
            transaction_type: TransactionType::Debit,
            amount: 0.0,
            category: "Other".to_string(),
            merchant: String::new(),
            bank: String::new(),
            account_number: String::new(),
            description: String::new(),
            source: TransactionSource::Manual,
            splits: None,
        }
    }
}

impl NewTransaction {
    /// Check the amount and, when present, that the splits add up to it
    pub fn validate(&self) -> Result<()> {
        validate_amount(self.amount)?;
        if let Some(splits) = &self.splits {
            validate_splits(self.amount, splits)?;
        }
        Ok(())
    }

    /// Build a debit from a best-effort receipt scan
    pub fn from_receipt_draft(draft: ReceiptDraft, account_id: Option<i64>) -> Self {
        Self {
            account_id,
            date: draft.date.unwrap_or_else(Utc::now),
            amount: draft.amount.map(f64::abs).unwrap_or(0.0),
            merchant: draft.merchant.unwrap_or_default(),
            source: TransactionSource::Receipt,
            ..Self::default()
        }
    }
}

/// Draft produced by the receipt scanner
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiptDraft {
    pub merchant: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub amount: Option<f64>,
}

/// Changes to an existing transaction
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub account_id: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    pub transaction_type: Option<TransactionType>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub merchant: Option<String>,
    pub bank: Option<String>,
    pub account_number: Option<String>,
    pub description: Option<String>,
    /// `Some(vec![])` removes the splits
    pub splits: Option<Vec<Split>>,
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidData(format!(
            "Amount must be a non-negative number, got {}",
            amount
        )));
    }
    Ok(())
}

/// Splits must add up to the transaction amount within a cent
pub fn validate_splits(amount: f64, splits: &[Split]) -> Result<()> {
    if splits.is_empty() {
        return Ok(());
    }
    if let Some(bad) = splits.iter().find(|s| !s.amount.is_finite()) {
        return Err(Error::InvalidData(format!(
            "Split '{}' has an invalid amount",
            bad.category
        )));
    }
    let total: f64 = splits.iter().map(|s| s.amount).sum();
    if !amounts_match(total, amount) {
        return Err(Error::InvalidData(format!(
            "Splits add up to {:.2} but the transaction amount is {:.2}",
            total, amount
        )));
    }
    Ok(())
}

impl Transaction {
    /// Apply an update, producing the payload to validate and store
    pub(crate) fn apply(&self, patch: &TransactionUpdate) -> NewTransaction {
        NewTransaction {
            account_id: patch.account_id.or(self.account_id),
            date: patch.date.unwrap_or(self.date),
            transaction_type: patch
                .transaction_type
                .clone()
                .unwrap_or_else(|| self.transaction_type.clone()),
            amount: patch.amount.unwrap_or(self.amount),
            category: patch.category.clone().unwrap_or_else(|| self.category.clone()),
            merchant: patch.merchant.clone().unwrap_or_else(|| self.merchant.clone()),
            bank: patch.bank.clone().unwrap_or_else(|| self.bank.clone()),
            account_number: patch
                .account_number
                .clone()
                .unwrap_or_else(|| self.account_number.clone()),
            description: patch
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            source: self.source,
            splits: match &patch.splits {
                Some(s) if s.is_empty() => None,
                Some(s) => Some(s.clone()),
                None => self.splits.clone(),
            },
        }
    }
}
