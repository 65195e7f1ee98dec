//! Imports written in one transaction
//!
//! Both importers build a dedupe index from the owner's existing records,
//! stage what is new, and commit everything at once. Any error rolls the
//! whole import back.

use std::collections::{HashMap, HashSet};

use tracing::info;

use super::accounts::insert_account_row;
use super::categories::insert_category_row;
use super::transaction_filter::TransactionFilter;
use super::transactions::insert_transaction_row;
use super::Database;
use crate::error::{Error, Result};
use crate::import::{parse_csv, CsvDefaults, CsvImportResult};
use crate::reconcile::{account_key, parse_backup, CategoryKey, MergeStats, TransactionKey};
use crate::session::Session;

impl Database {
    /// Import transactions from CSV text into an account
    ///
    /// Uses `account_id` when given, otherwise the owner's primary account.
    /// Rows already present for the owner, or repeated within the file, are
    /// counted as duplicates and skipped.
    pub fn import_csv(
        &self,
        session: &Session,
        text: Option<&str>,
        account_id: Option<i64>,
    ) -> Result<CsvImportResult> {
        let text = text.ok_or(Error::NoFileSelected)?;
        let owner = session.require_owner()?;

        let account = match account_id {
            Some(id) => Some(
                self.get_account(session, id)?
                    .ok_or_else(|| Error::NotFound(format!("account {}", id)))?,
            ),
            None => self.primary_account(session)?,
        };
        let defaults = CsvDefaults {
            account_id: account.as_ref().map(|a| a.id),
            bank: account
                .as_ref()
                .map(|a| a.bank_name.clone())
                .unwrap_or_default(),
            account_number: account
                .as_ref()
                .map(|a| a.account_number.clone())
                .unwrap_or_default(),
        };

        let rows = parse_csv(text, &defaults)?;
        let mut seen: HashSet<TransactionKey> = self
            .list_transactions(session, &TransactionFilter::new())?
            .iter()
            .map(TransactionKey::of_transaction)
            .collect();

        let mut result = CsvImportResult {
            parsed: rows.len(),
            ..CsvImportResult::default()
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for row in &rows {
            if !seen.insert(TransactionKey::of_new(row)) {
                result.duplicates += 1;
                continue;
            }
            insert_transaction_row(&tx, owner, row)?;
            result.imported += 1;
        }
        tx.commit()?;

        info!(
            owner,
            parsed = result.parsed,
            imported = result.imported,
            duplicates = result.duplicates,
            "CSV import complete"
        );
        Ok(result)
    }

    /// Merge a backup document into the signed-in profile
    ///
    /// Transactions, categories and accounts already present (by dedupe key)
    /// are skipped. Incoming `accountId` links are remapped to the owner's
    /// account with the same number.
    pub fn import_backup(&self, session: &Session, text: Option<&str>) -> Result<MergeStats> {
        let text = text.ok_or(Error::NoFileSelected)?;
        let owner = session.require_owner()?;
        let doc = parse_backup(text)?;

        let existing_accounts = self.list_accounts(session)?;
        let mut account_ids: HashMap<String, i64> = HashMap::new();
        for account in &existing_accounts {
            if let Some(key) = account_key(&account.account_number) {
                account_ids.entry(key).or_insert(account.id);
            }
        }
        let mut seen_categories: HashSet<CategoryKey> = self
            .list_categories(session)?
            .iter()
            .map(CategoryKey::of_category)
            .collect();
        let mut seen_transactions: HashSet<TransactionKey> = self
            .list_transactions(session, &TransactionFilter::new())?
            .iter()
            .map(TransactionKey::of_transaction)
            .collect();

        let mut stats = MergeStats::default();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // Source account id -> account number, for remapping transactions
        let mut source_numbers: HashMap<i64, String> = HashMap::new();
        for incoming in doc.accounts() {
            let Some(key) = account_key(&incoming.account.account_number) else {
                continue;
            };
            if let Some(source_id) = incoming.source_id {
                source_numbers.insert(source_id, key.clone());
            }
            if account_ids.contains_key(&key) {
                continue;
            }
            // The first account of an owner without accounts becomes primary
            let id = insert_account_row(&tx, owner, &incoming.account)?;
            account_ids.insert(key, id);
            stats.accounts += 1;
        }

        for category in doc.categories() {
            if seen_categories.insert(CategoryKey::new(&category.name, category.category_type)) {
                insert_category_row(&tx, owner, &category)?;
                stats.categories += 1;
            }
        }

        for incoming in doc.transactions() {
            let mut transaction = incoming.transaction;
            if !seen_transactions.insert(TransactionKey::of_new(&transaction)) {
                continue;
            }
            transaction.account_id = incoming
                .source_account_id
                .and_then(|id| source_numbers.get(&id))
                .and_then(|number| account_ids.get(number))
                .copied();
            insert_transaction_row(&tx, owner, &transaction)?;
            stats.transactions += 1;
        }

        tx.commit()?;
        info!(
            owner,
            transactions = stats.transactions,
            categories = stats.categories,
            accounts = stats.accounts,
            "Backup merged"
        );
        Ok(stats)
    }
}
