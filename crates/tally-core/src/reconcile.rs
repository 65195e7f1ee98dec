//! Backup reconciliation
//!
//! Dedupe keys for merging records from another database, lenient parsing
//! of backup documents, and the read-only backup preview.
//!
//! Backups come from older releases and other tools, so records are read
//! field by field: camelCase or snake_case keys, numbers or numeric strings.
//! Records that are not JSON objects are skipped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::db::format_timestamp;
use crate::error::{Error, Result};
use crate::import::parse_date_value;
use crate::models::{
    Category, CategoryType, NewAccount, NewCategory, NewTransaction, Split, Transaction,
    TransactionSource, TransactionType,
};

/// Tables a preview always reports, even when absent from the backup
pub const KNOWN_TABLES: [&str; 4] = ["transactions", "categories", "accounts", "users"];

/// Canonical identity of a transaction for merge dedupe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    date: String,
    transaction_type: String,
    amount: String,
    category: String,
    bank: String,
    account_number: String,
    merchant: String,
    description: String,
}

fn canonical_text(s: &str) -> String {
    s.trim().to_lowercase()
}

impl TransactionKey {
    #[allow(clippy::too_many_arguments)]
    fn build(
        date: &DateTime<Utc>,
        transaction_type: &TransactionType,
        amount: f64,
        category: &str,
        bank: &str,
        account_number: &str,
        merchant: &str,
        description: &str,
    ) -> Self {
        Self {
            date: format_timestamp(date),
            transaction_type: canonical_text(transaction_type.as_str()),
            amount: format!("{:.2}", amount),
            category: canonical_text(category),
            bank: canonical_text(bank),
            account_number: canonical_text(account_number),
            merchant: canonical_text(merchant),
            description: canonical_text(description),
        }
    }

    pub fn of_transaction(tx: &Transaction) -> Self {
        Self::build(
            &tx.date,
            &tx.transaction_type,
            tx.amount,
            &tx.category,
            &tx.bank,
            &tx.account_number,
            &tx.merchant,
            &tx.description,
        )
    }

    pub fn of_new(tx: &NewTransaction) -> Self {
        Self::build(
            &tx.date,
            &tx.transaction_type,
            tx.amount,
            &tx.category,
            &tx.bank,
            &tx.account_number,
            &tx.merchant,
            &tx.description,
        )
    }
}

/// `(name, type)`, both lower-cased
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryKey(String, String);

impl CategoryKey {
    pub fn new(name: &str, category_type: CategoryType) -> Self {
        Self(canonical_text(name), category_type.as_str().to_string())
    }

    pub fn of_category(category: &Category) -> Self {
        Self::new(&category.name, category.category_type)
    }
}

/// Accounts are matched on their trimmed number; `None` when there is none
pub fn account_key(account_number: &str) -> Option<String> {
    let number = account_number.trim();
    (!number.is_empty()).then(|| number.to_string())
}

/// Counts of records merged from a backup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub transactions: usize,
    pub categories: usize,
    pub accounts: usize,
}

/// What a backup holds, without importing it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPreview {
    pub exported_at: Option<String>,
    pub db_name: Option<String>,
    pub version: Option<i64>,
    /// Records per table
    pub counts: BTreeMap<String, usize>,
}

/// A transaction read from a backup
#[derive(Debug, Clone)]
pub struct BackupTransaction {
    /// `accountId` in the source database
    pub source_account_id: Option<i64>,
    pub transaction: NewTransaction,
}

/// An account read from a backup
#[derive(Debug, Clone)]
pub struct BackupAccount {
    /// `id` in the source database
    pub source_id: Option<i64>,
    pub account: NewAccount,
}

/// A parsed backup document with a validated top-level shape
#[derive(Debug, Clone)]
pub struct BackupDocument {
    pub exported_at: Option<String>,
    pub db_name: Option<String>,
    pub version: Option<i64>,
    tables: Map<String, Value>,
}

/// Parse a backup and check its top-level shape
///
/// Fails with `InvalidBackupFormat` on malformed JSON or when `tables` is
/// missing or not an object.
pub fn parse_backup(text: &str) -> Result<BackupDocument> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| Error::InvalidBackupFormat(format!("not valid JSON: {}", e)))?;
    let Value::Object(root) = root else {
        return Err(Error::InvalidBackupFormat(
            "expected a JSON object".to_string(),
        ));
    };
    let Some(Value::Object(tables)) = root.get("tables") else {
        return Err(Error::InvalidBackupFormat(
            "missing \"tables\" object".to_string(),
        ));
    };

    Ok(BackupDocument {
        exported_at: text_field(&root, "exportedAt"),
        db_name: text_field(&root, "dbName"),
        version: int_field(&root, "version"),
        tables: tables.clone(),
    })
}

/// Read-only summary of a backup
pub fn preview_backup(text: &str) -> Result<BackupPreview> {
    let doc = parse_backup(text)?;
    let mut counts: BTreeMap<String, usize> = KNOWN_TABLES
        .iter()
        .map(|t| (t.to_string(), 0))
        .collect();
    for (name, value) in &doc.tables {
        let count = value.as_array().map(Vec::len).unwrap_or(0);
        counts.insert(name.clone(), count);
    }

    Ok(BackupPreview {
        exported_at: doc.exported_at,
        db_name: doc.db_name,
        version: doc.version,
        counts,
    })
}

impl BackupDocument {
    /// Object records of a table; anything else is skipped
    fn records<'a>(&'a self, table: &str) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
        self.tables
            .get(table)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
    }

    /// Transactions with an amount and a readable date; ids and owners are dropped
    ///
    /// A record without a usable date has no stable dedupe key, so it is
    /// skipped rather than stamped with the import time.
    pub fn transactions(&self) -> Vec<BackupTransaction> {
        self.records("transactions")
            .filter_map(|rec| {
                let amount = number_field(rec, "amount").filter(|a| a.is_finite())?.abs();
                let date = text_field(rec, "date").as_deref().and_then(parse_instant)?;
                let splits = field(rec, "splits")
                    .and_then(|v| serde_json::from_value::<Vec<Split>>(v.clone()).ok())
                    .filter(|s| !s.is_empty())
                    .filter(|s| crate::models::validate_splits(amount, s).is_ok());

                let transaction = NewTransaction {
                    account_id: None,
                    date,
                    transaction_type: TransactionType::normalize(
                        &text_field(rec, "type").unwrap_or_default(),
                    ),
                    amount,
                    category: text_field(rec, "category").unwrap_or_else(|| "Other".to_string()),
                    merchant: text_field(rec, "merchant").unwrap_or_default(),
                    bank: text_field(rec, "bank").unwrap_or_default(),
                    account_number: text_field(rec, "accountNumber").unwrap_or_default(),
                    description: text_field(rec, "description").unwrap_or_default(),
                    source: text_field(rec, "source")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(TransactionSource::Backup),
                    splits,
                };

                Some(BackupTransaction {
                    source_account_id: int_field(rec, "accountId"),
                    transaction,
                })
            })
            .collect()
    }

    /// Categories with a name
    pub fn categories(&self) -> Vec<NewCategory> {
        self.records("categories")
            .filter_map(|rec| {
                let name = text_field(rec, "name").filter(|n| !n.trim().is_empty())?;
                Some(NewCategory {
                    name,
                    name_dv: text_field(rec, "nameDv"),
                    icon: text_field(rec, "icon").unwrap_or_default(),
                    color: text_field(rec, "color").unwrap_or_default(),
                    category_type: text_field(rec, "type")
                        .and_then(|t| t.parse().ok())
                        .unwrap_or_default(),
                    budget: number_field(rec, "budget")
                        .filter(|b| b.is_finite() && *b >= 0.0)
                        .unwrap_or(0.0),
                })
            })
            .collect()
    }

    /// Every account record; callers skip the ones without a number
    pub fn accounts(&self) -> Vec<BackupAccount> {
        self.records("accounts")
            .map(|rec| BackupAccount {
                source_id: int_field(rec, "id"),
                account: NewAccount {
                    bank_name: text_field(rec, "bankName").unwrap_or_default(),
                    account_number: text_field(rec, "accountNumber").unwrap_or_default(),
                    nickname: text_field(rec, "nickname"),
                    starting_balance: number_field(rec, "startingBalance")
                        .filter(|b| b.is_finite())
                        .unwrap_or(0.0),
                    is_primary: false,
                    icon: text_field(rec, "icon"),
                    color: text_field(rec, "color"),
                },
            })
            .collect()
    }
}

/// Backups store full instants; bare dates fall back to the CSV rules
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_date_value(s))
}

/// `accountNumber` -> `account_number`
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Look a field up by its camelCase name, then its snake_case form
fn field<'a>(rec: &'a Map<String, Value>, camel: &str) -> Option<&'a Value> {
    rec.get(camel)
        .or_else(|| rec.get(&snake_case(camel)))
        .filter(|v| !v.is_null())
}

fn text_field(rec: &Map<String, Value>, camel: &str) -> Option<String> {
    match field(rec, camel)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number_field(rec: &Map<String, Value>, camel: &str) -> Option<f64> {
    match field(rec, camel)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn int_field(rec: &Map<String, Value>, camel: &str) -> Option<i64> {
    match field(rec, camel)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
