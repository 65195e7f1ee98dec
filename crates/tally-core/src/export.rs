//! Export functionality for user data and full database dumps
//!
//! Supports:
//! - Per-profile JSON export (transactions, categories, budgets)
//! - Whole-database JSON dump in the backup format `import_backup` reads
//! - Transaction CSV export in the same column layout the CSV importer reads

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::db::{Database, TransactionFilter};
use crate::error::{Error, Result};
use crate::models::{Account, Category, CategoryType, Profile, Transaction};
use crate::session::Session;

/// Format version of the per-profile export
pub const USER_EXPORT_VERSION: &str = "1.0";

/// Column layout shared with the CSV importer
pub const CSV_HEADER: [&str; 9] = [
    "Date",
    "Type",
    "Amount",
    "Category",
    "Merchant",
    "Bank",
    "Account",
    "Balance",
    "Description",
];

/// A category budget
#[derive(Debug, Clone, Serialize)]
pub struct BudgetExport {
    pub category: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserExportData {
    pub transactions: Vec<Transaction>,
    pub categories: Vec<Category>,
    pub budgets: Vec<BudgetExport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExportStats {
    pub transaction_count: usize,
    pub category_count: usize,
}

/// Per-profile export document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExport {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub user_id: i64,
    pub data: UserExportData,
    pub stats: UserExportStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct DumpTables {
    pub users: Vec<Profile>,
    pub accounts: Vec<Account>,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
}

/// Whole-database dump document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDump {
    pub exported_at: DateTime<Utc>,
    pub db_name: String,
    pub version: i64,
    pub tables: DumpTables,
}

impl Database {
    /// Export everything the signed-in profile owns
    pub fn export_user_data(&self, session: &Session) -> Result<UserExport> {
        let owner = session.require_owner()?;
        let transactions = self.list_transactions(session, &TransactionFilter::new())?;
        let categories = self.list_categories(session)?;
        let budgets = categories
            .iter()
            .filter(|c| c.budget > 0.0)
            .map(|c| BudgetExport {
                category: c.name.clone(),
                category_type: c.category_type,
                amount: c.budget,
            })
            .collect();

        Ok(UserExport {
            version: USER_EXPORT_VERSION.to_string(),
            export_date: Utc::now(),
            user_id: owner,
            stats: UserExportStats {
                transaction_count: transactions.len(),
                category_count: categories.len(),
            },
            data: UserExportData {
                transactions,
                categories,
                budgets,
            },
        })
    }

    /// Dump every row of every table
    ///
    /// Not scoped to a profile: the dump holds all profiles' records,
    /// including PIN hashes. It is meant as a full-file backup, so hand it
    /// only to whoever already controls the database file.
    pub fn export_database_dump(&self) -> Result<DatabaseDump> {
        Ok(DatabaseDump {
            exported_at: Utc::now(),
            db_name: self.db_name(),
            version: self.schema_version()?,
            tables: DumpTables {
                users: self.list_profiles()?,
                accounts: self.list_all_accounts()?,
                categories: self.list_all_categories()?,
                transactions: self.list_all_transactions()?,
            },
        })
    }

    /// Export the owner's transactions as CSV the importer can read back
    ///
    /// `Date` is the local calendar date. The importer anchors it at local
    /// noon, so rows that came in through CSV dedupe against their export;
    /// other times of day are not preserved.
    pub fn export_transactions_csv(
        &self,
        session: &Session,
        filter: &TransactionFilter,
    ) -> Result<String> {
        session.require_owner()?;
        let transactions = self.list_transactions(session, filter)?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for tx in &transactions {
            writer.write_record([
                tx.date.with_timezone(&Local).format("%Y-%m-%d").to_string().as_str(),
                tx.transaction_type.as_str(),
                format!("{:.2}", tx.amount).as_str(),
                tx.category.as_str(),
                tx.merchant.as_str(),
                tx.bank.as_str(),
                tx.account_number.as_str(),
                "",
                tx.description.as_str(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| Error::InvalidData(e.to_string()))
    }
}

/// Serialize an export document for writing to disk
pub fn to_json_pretty<T: Serialize>(document: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}
