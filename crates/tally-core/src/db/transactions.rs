//! Transaction operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::transaction_filter::TransactionFilter;
use super::{format_timestamp, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Split, Transaction, TransactionType, TransactionUpdate};
use crate::session::Session;

pub(crate) const TRANSACTION_COLUMNS: &str = "t.id, t.user_id, t.account_id, t.date, t.type, \
     t.amount, t.category, t.merchant, t.bank, t.account_number, t.description, t.source, \
     t.created_at, t.updated_at, t.splits";

fn splits_to_json(splits: &Option<Vec<Split>>) -> Result<Option<String>> {
    match splits {
        Some(s) if !s.is_empty() => Ok(Some(serde_json::to_string(s)?)),
        _ => Ok(None),
    }
}

/// Insert one transaction row for `owner`
pub(crate) fn insert_transaction_row(
    conn: &Connection,
    owner: i64,
    tx: &NewTransaction,
) -> Result<i64> {
    let now = format_timestamp(&Utc::now());
    conn.execute(
        r#"
        INSERT INTO transactions (user_id, account_id, date, type, amount, category, merchant,
            bank, account_number, description, source, splits, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            owner,
            tx.account_id,
            format_timestamp(&tx.date),
            tx.transaction_type.as_str(),
            tx.amount,
            tx.category,
            tx.merchant,
            tx.bank,
            tx.account_number,
            tx.description,
            tx.source.as_str(),
            splits_to_json(&tx.splits)?,
            now,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fail with `NotFound` unless `account_id` belongs to `owner`
pub(crate) fn ensure_account_owned(conn: &Connection, owner: i64, account_id: i64) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM accounts WHERE id = ? AND user_id = ?",
            params![account_id, owner],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(Error::NotFound(format!("account {}", account_id))),
    }
}

impl Database {
    /// List the owner's transactions, newest first
    pub fn list_transactions(
        &self,
        session: &Session,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let Some(owner) = session.owner() else {
            return Ok(Vec::new());
        };
        let conn = self.conn()?;
        let built = filter.build(owner);
        let sql = format!(
            "SELECT {} FROM transactions t {} {} {}",
            TRANSACTION_COLUMNS, built.where_clause, built.order_clause, built.limit_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(built.params_refs().as_slice(), Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count the owner's transactions matching a filter (limit ignored)
    pub fn count_transactions(&self, session: &Session, filter: &TransactionFilter) -> Result<i64> {
        let Some(owner) = session.owner() else {
            return Ok(0);
        };
        let conn = self.conn()?;
        let unbounded = filter.clone().limit(None);
        let built = unbounded.build(owner);
        let count = conn.query_row(
            &built.build_count_query(),
            built.params_refs().as_slice(),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn get_transaction(&self, session: &Session, id: i64) -> Result<Option<Transaction>> {
        let Some(owner) = session.owner() else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions t WHERE t.id = ? AND t.user_id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![id, owner],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Validate and store a new transaction for the signed-in profile
    pub fn add_transaction(&self, session: &Session, tx: &NewTransaction) -> Result<i64> {
        let owner = session.require_owner()?;
        tx.validate()?;

        let conn = self.conn()?;
        if let Some(account_id) = tx.account_id {
            ensure_account_owned(&conn, owner, account_id)?;
        }
        let id = insert_transaction_row(&conn, owner, tx)?;
        debug!(id, owner, "Added transaction");
        Ok(id)
    }

    /// Apply a patch to an owned transaction
    pub fn update_transaction(
        &self,
        session: &Session,
        id: i64,
        patch: &TransactionUpdate,
    ) -> Result<()> {
        let owner = session.require_owner()?;
        let existing = self
            .get_transaction(session, id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))?;

        let merged = existing.apply(patch);
        merged.validate()?;

        let conn = self.conn()?;
        if let Some(account_id) = merged.account_id {
            if patch.account_id.is_some() {
                ensure_account_owned(&conn, owner, account_id)?;
            }
        }

        conn.execute(
            r#"
            UPDATE transactions SET account_id = ?, date = ?, type = ?, amount = ?, category = ?,
                merchant = ?, bank = ?, account_number = ?, description = ?, splits = ?,
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
            params![
                merged.account_id,
                format_timestamp(&merged.date),
                merged.transaction_type.as_str(),
                merged.amount,
                merged.category,
                merged.merchant,
                merged.bank,
                merged.account_number,
                merged.description,
                splits_to_json(&merged.splits)?,
                format_timestamp(&Utc::now()),
                id,
                owner,
            ],
        )?;
        Ok(())
    }

    /// Delete an owned transaction; absent or foreign ids are ignored
    pub fn delete_transaction(&self, session: &Session, id: i64) -> Result<()> {
        let owner = session.require_owner()?;
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM transactions WHERE id = ? AND user_id = ?",
            params![id, owner],
        )?;
        Ok(())
    }

    /// Every transaction of every owner, by id
    pub(crate) fn list_all_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions t ORDER BY t.id",
            TRANSACTION_COLUMNS
        ))?;
        let transactions = stmt
            .query_map([], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    /// Helper to convert a row to a Transaction
    ///
    /// Expects the columns of `TRANSACTION_COLUMNS`, in order.
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let date_str: String = row.get(3)?;
        let type_str: String = row.get(4)?;
        let source_str: String = row.get(11)?;
        let created_at_str: String = row.get(12)?;
        let updated_at_str: String = row.get(13)?;
        let splits_json: Option<String> = row.get(14)?;

        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
            account_id: row.get(2)?,
            date: parse_datetime(&date_str),
            transaction_type: TransactionType::normalize(&type_str),
            amount: row.get(5)?,
            category: row.get(6)?,
            merchant: row.get(7)?,
            bank: row.get(8)?,
            account_number: row.get(9)?,
            description: row.get(10)?,
            source: source_str.parse().unwrap_or_default(),
            created_at: parse_datetime(&created_at_str),
            updated_at: parse_datetime(&updated_at_str),
            splits: splits_json.and_then(|j| serde_json::from_str(&j).ok()),
        })
    }
}
