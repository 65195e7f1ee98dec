//! Account operations

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::transactions::TRANSACTION_COLUMNS;
use super::{format_timestamp, parse_datetime, Database};
use crate::balance::account_balance;
use crate::error::{Error, Result};
use crate::models::{
    bank_style, default_nickname, Account, AccountUpdate, AccountWithBalance, NewAccount,
    Transaction,
};
use crate::session::Session;

const ACCOUNT_COLUMNS: &str = "id, user_id, bank_name, account_number, nickname, \
     starting_balance, is_primary, is_active, icon, color, created_at, updated_at";

/// Insert one account row for `owner`, resolving the primary flag
///
/// The owner's first account is always primary; a primary insert clears the
/// flag on every other owned account. Call inside a transaction.
pub(crate) fn insert_account_row(conn: &Connection, owner: i64, account: &NewAccount) -> Result<i64> {
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE user_id = ?",
        params![owner],
        |row| row.get(0),
    )?;
    let is_primary = existing == 0 || account.is_primary;
    if is_primary {
        conn.execute(
            "UPDATE accounts SET is_primary = 0 WHERE user_id = ?",
            params![owner],
        )?;
    }

    let style = bank_style(&account.bank_name);
    let nickname = account
        .nickname
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_nickname(&account.bank_name, &account.account_number));
    let now = format_timestamp(&Utc::now());

    conn.execute(
        r#"
        INSERT INTO accounts (user_id, bank_name, account_number, nickname, starting_balance,
            is_primary, is_active, icon, color, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)
        "#,
        params![
            owner,
            account.bank_name.trim(),
            account.account_number.trim(),
            nickname,
            account.starting_balance,
            is_primary,
            account.icon.as_deref().unwrap_or(style.icon),
            account.color.as_deref().unwrap_or(style.color),
            now,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// The owner's accounts, primary first
    pub fn list_accounts(&self, session: &Session) -> Result<Vec<Account>> {
        let Some(owner) = session.owner() else {
            return Ok(Vec::new());
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE user_id = ? ORDER BY is_primary DESC, id",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map(params![owner], Self::row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Get an account by ID
    pub fn get_account(&self, session: &Session, id: i64) -> Result<Option<Account>> {
        let Some(owner) = session.owner() else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE id = ? AND user_id = ?",
                    ACCOUNT_COLUMNS
                ),
                params![id, owner],
                Self::row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    /// The owner's primary account, if any
    pub fn primary_account(&self, session: &Session) -> Result<Option<Account>> {
        Ok(self
            .list_accounts(session)?
            .into_iter()
            .find(|a| a.is_primary))
    }

    pub fn add_account(&self, session: &Session, account: &NewAccount) -> Result<i64> {
        let owner = session.require_owner()?;
        if !account.starting_balance.is_finite() {
            return Err(Error::InvalidData(
                "Starting balance must be a number".to_string(),
            ));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id = insert_account_row(&tx, owner, account)?;
        tx.commit()?;

        info!(id, owner, "Added account");
        Ok(id)
    }

    /// Apply a patch to an owned account
    ///
    /// `is_primary: Some(true)` clears the flag on the owner's other accounts
    /// in the same transaction. The starting balance cannot be changed.
    pub fn update_account(&self, session: &Session, id: i64, patch: &AccountUpdate) -> Result<()> {
        let owner = session.require_owner()?;
        let existing = self
            .get_account(session, id)?
            .ok_or_else(|| Error::NotFound(format!("account {}", id)))?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if patch.is_primary == Some(true) {
            tx.execute(
                "UPDATE accounts SET is_primary = 0 WHERE user_id = ? AND id != ?",
                params![owner, id],
            )?;
        }

        tx.execute(
            r#"
            UPDATE accounts SET bank_name = ?, account_number = ?, nickname = ?, is_primary = ?,
                is_active = ?, icon = ?, color = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
            params![
                patch.bank_name.as_deref().unwrap_or(&existing.bank_name),
                patch
                    .account_number
                    .as_deref()
                    .unwrap_or(&existing.account_number),
                patch.nickname.as_deref().unwrap_or(&existing.nickname),
                patch.is_primary.unwrap_or(existing.is_primary),
                patch.is_active.unwrap_or(existing.is_active),
                patch.icon.as_deref().unwrap_or(&existing.icon),
                patch.color.as_deref().unwrap_or(&existing.color),
                format_timestamp(&Utc::now()),
                id,
                owner,
            ],
        )?;

        tx.commit()?;
        if patch.is_primary == Some(true) {
            info!(id, owner, "Primary account changed");
        }
        Ok(())
    }

    pub fn set_primary_account(&self, session: &Session, id: i64) -> Result<()> {
        self.update_account(
            session,
            id,
            &AccountUpdate {
                is_primary: Some(true),
                ..AccountUpdate::default()
            },
        )
    }

    /// Delete an owned account that no transaction references
    ///
    /// Absent or foreign ids are ignored. Deleting the primary account
    /// promotes the oldest remaining one.
    pub fn delete_account(&self, session: &Session, id: i64) -> Result<()> {
        let owner = session.require_owner()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let found: Option<Option<bool>> = tx
            .query_row(
                "SELECT is_primary FROM accounts WHERE id = ? AND user_id = ?",
                params![id, owner],
                |row| row.get(0),
            )
            .optional()?;
        let Some(was_primary) = found.map(|flag| flag.unwrap_or(false)) else {
            return Ok(());
        };

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        if count > 0 {
            return Err(Error::AccountHasTransactions {
                account_id: id,
                count,
            });
        }

        tx.execute(
            "DELETE FROM accounts WHERE id = ? AND user_id = ?",
            params![id, owner],
        )?;

        if was_primary {
            tx.execute(
                r#"
                UPDATE accounts SET is_primary = 1
                WHERE id = (SELECT MIN(id) FROM accounts WHERE user_id = ?1)
                "#,
                params![owner],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Current balance of an owned account, derived from its transactions
    ///
    /// Unknown or foreign accounts have a balance of 0.
    pub fn calculate_account_balance(&self, session: &Session, account_id: i64) -> Result<f64> {
        let Some(owner) = session.owner() else {
            return Ok(0.0);
        };
        let Some(account) = self.get_account(session, account_id)? else {
            return Ok(0.0);
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions t WHERE t.user_id = ? AND t.account_id = ?",
            TRANSACTION_COLUMNS
        ))?;
        let transactions = stmt
            .query_map(params![owner, account_id], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(account_balance(account.starting_balance, &transactions))
    }

    /// Every owned account with its derived balance
    pub fn list_accounts_with_balances(&self, session: &Session) -> Result<Vec<AccountWithBalance>> {
        let Some(owner) = session.owner() else {
            return Ok(Vec::new());
        };
        let accounts = self.list_accounts(session)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions t WHERE t.user_id = ? AND t.account_id IS NOT NULL",
            TRANSACTION_COLUMNS
        ))?;
        let mut by_account: HashMap<i64, Vec<Transaction>> = HashMap::new();
        for tx in stmt.query_map(params![owner], Self::row_to_transaction)? {
            let tx = tx?;
            if let Some(account_id) = tx.account_id {
                by_account.entry(account_id).or_default().push(tx);
            }
        }

        Ok(accounts
            .into_iter()
            .map(|account| {
                let txs = by_account.get(&account.id).map(Vec::as_slice).unwrap_or(&[]);
                let current_balance = account_balance(account.starting_balance, txs);
                AccountWithBalance {
                    account,
                    current_balance,
                }
            })
            .collect())
    }

    /// Every account of every owner, by id
    pub(crate) fn list_all_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts ORDER BY id",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map([], Self::row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
        let bank_name: String = row.get(2)?;
        let account_number: String = row.get(3)?;
        let nickname: Option<String> = row.get(4)?;
        let icon: Option<String> = row.get(8)?;
        let color: Option<String> = row.get(9)?;
        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;
        let style = bank_style(&bank_name);

        Ok(Account {
            id: row.get(0)?,
            user_id: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
            nickname: nickname.unwrap_or_else(|| default_nickname(&bank_name, &account_number)),
            starting_balance: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
            is_primary: row.get::<_, Option<bool>>(6)?.unwrap_or(false),
            is_active: row.get(7)?,
            icon: icon.unwrap_or_else(|| style.icon.to_string()),
            color: color.unwrap_or_else(|| style.color.to_string()),
            created_at: parse_datetime(&created_at_str),
            updated_at: parse_datetime(&updated_at_str),
            bank_name,
            account_number,
        })
    }
}
