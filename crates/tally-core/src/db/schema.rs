//! Applying schema steps to an open connection
//!
//! The version lives in `PRAGMA user_version`. Every pending step's DDL, the
//! data transforms and the version bump share one transaction, so a failed
//! upgrade leaves both the schema and the version where they were.

use std::collections::HashMap;

use rusqlite::{params, Connection, Transaction};
use tracing::info;

use super::format_timestamp;
use crate::error::{Error, Result};
use crate::migrations::{
    AccountRow, DdlStep, Migration, Snapshot, TransactionRow, UserRow, MIGRATIONS,
};

pub(crate) fn user_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Bring the database to the newest version, returning it
pub(crate) fn upgrade(conn: &mut Connection) -> Result<i64> {
    conn.execute_batch(
        r#"
        -- WAL mode: readers don't block writers
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        "#,
    )?;
    run_steps(conn, MIGRATIONS)
}

/// Apply every step newer than the stored version, all or nothing
pub(crate) fn run_steps(conn: &mut Connection, steps: &[Migration]) -> Result<i64> {
    let current = user_version(conn)?;
    let pending: Vec<&Migration> = steps.iter().filter(|m| m.version > current).collect();
    let Some(target) = pending.last().map(|m| m.version) else {
        return Ok(current);
    };

    // Dropping `tx` without commit rolls everything back
    let tx = conn.transaction()?;

    for step in &pending {
        apply_ddl(&tx, step).map_err(|e| failed(step.version, e))?;
    }

    let before = load_snapshot(&tx).map_err(|e| failed(target, e))?;
    let mut snapshot = before.clone();
    for step in &pending {
        snapshot = (step.transform)(snapshot).map_err(|e| failed(step.version, e))?;
        info!(
            version = step.version,
            description = step.description,
            "Applied schema step"
        );
    }
    write_snapshot(&tx, &before, &snapshot).map_err(|e| failed(target, e))?;

    tx.pragma_update(None, "user_version", target)
        .map_err(|e| failed(target, e.into()))?;
    tx.commit().map_err(|e| failed(target, e.into()))?;

    info!(from = current, to = target, "Database schema upgraded");
    Ok(target)
}

fn failed(version: i64, err: Error) -> Error {
    match err {
        Error::Migration { .. } => err,
        other => Error::Migration {
            version,
            reason: other.to_string(),
        },
    }
}

fn apply_ddl(tx: &Transaction, step: &Migration) -> Result<()> {
    for ddl in step.ddl {
        match *ddl {
            DdlStep::Sql(sql) => tx.execute_batch(sql)?,
            DdlStep::AddColumn {
                table,
                column,
                decl,
            } => {
                if !column_exists(tx, table, column)? {
                    tx.execute_batch(&format!(
                        "ALTER TABLE {} ADD COLUMN {} {};",
                        table, column, decl
                    ))?;
                }
            }
        }
    }
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Select list for `columns`; columns a partial upgrade has not added yet read as NULL
fn select_list(conn: &Connection, table: &str, columns: &[&str]) -> Result<String> {
    let mut list = Vec::with_capacity(columns.len());
    for column in columns {
        if column_exists(conn, table, column)? {
            list.push(column.to_string());
        } else {
            list.push(format!("NULL AS {}", column));
        }
    }
    Ok(list.join(", "))
}

fn load_snapshot(conn: &Connection) -> Result<Snapshot> {
    let users = if table_exists(conn, "users")? {
        let sql = format!(
            "SELECT {} FROM users ORDER BY id",
            select_list(conn, "users", &["id", "name", "starting_balance"])?
        );
        conn.prepare(&sql)?
            .query_map([], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    starting_balance: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };

    let account_columns = select_list(
        conn,
        "accounts",
        &[
            "id",
            "user_id",
            "bank_name",
            "account_number",
            "is_active",
            "created_at",
            "updated_at",
            "nickname",
            "starting_balance",
            "is_primary",
            "icon",
            "color",
        ],
    )?;
    let accounts = conn
        .prepare(&format!("SELECT {} FROM accounts ORDER BY id", account_columns))?
        .query_map([], |row| {
            Ok(AccountRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                bank_name: row.get(2)?,
                account_number: row.get(3)?,
                is_active: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
                nickname: row.get(7)?,
                starting_balance: row.get(8)?,
                is_primary: row.get(9)?,
                icon: row.get(10)?,
                color: row.get(11)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let transaction_columns = select_list(
        conn,
        "transactions",
        &["id", "user_id", "account_id", "account_number"],
    )?;
    let transactions = conn
        .prepare(&format!(
            "SELECT {} FROM transactions ORDER BY id",
            transaction_columns
        ))?
        .query_map([], |row| {
            Ok(TransactionRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                account_id: row.get(2)?,
                account_number: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Snapshot {
        now: format_timestamp(&chrono::Utc::now()),
        users,
        accounts,
        transactions,
    })
}

/// Write rows that differ from `before`; rows without a counterpart are inserted
fn write_snapshot(tx: &Transaction, before: &Snapshot, after: &Snapshot) -> Result<()> {
    let old_users: HashMap<i64, &UserRow> = before.users.iter().map(|u| (u.id, u)).collect();
    for user in &after.users {
        match old_users.get(&user.id) {
            Some(old) if *old == user => {}
            Some(_) => {
                tx.execute(
                    "UPDATE users SET name = ?, starting_balance = ? WHERE id = ?",
                    params![user.name, user.starting_balance, user.id],
                )?;
            }
            None => {
                return Err(Error::InvalidData(format!(
                    "schema steps cannot create profiles (id {})",
                    user.id
                )))
            }
        }
    }

    let old_accounts: HashMap<i64, &AccountRow> =
        before.accounts.iter().map(|a| (a.id, a)).collect();
    for account in &after.accounts {
        match old_accounts.get(&account.id) {
            Some(old) if *old == account => {}
            Some(_) => {
                tx.execute(
                    r#"
                    UPDATE accounts SET user_id = ?, bank_name = ?, account_number = ?,
                        is_active = ?, updated_at = ?, nickname = ?, starting_balance = ?,
                        is_primary = ?, icon = ?, color = ?
                    WHERE id = ?
                    "#,
                    params![
                        account.user_id,
                        account.bank_name,
                        account.account_number,
                        account.is_active,
                        account.updated_at,
                        account.nickname,
                        account.starting_balance,
                        account.is_primary,
                        account.icon,
                        account.color,
                        account.id,
                    ],
                )?;
            }
            None => {
                tx.execute(
                    r#"
                    INSERT INTO accounts (id, user_id, bank_name, account_number, is_active,
                        created_at, updated_at, nickname, starting_balance, is_primary, icon, color)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        account.id,
                        account.user_id,
                        account.bank_name,
                        account.account_number,
                        account.is_active,
                        account.created_at,
                        account.updated_at,
                        account.nickname,
                        account.starting_balance,
                        account.is_primary,
                        account.icon,
                        account.color,
                    ],
                )?;
            }
        }
    }

    let old_transactions: HashMap<i64, &TransactionRow> =
        before.transactions.iter().map(|t| (t.id, t)).collect();
    for row in &after.transactions {
        match old_transactions.get(&row.id) {
            Some(old) if *old == row => {}
            Some(_) => {
                tx.execute(
                    "UPDATE transactions SET user_id = ?, account_id = ? WHERE id = ?",
                    params![row.user_id, row.account_id, row.id],
                )?;
            }
            None => {
                return Err(Error::InvalidData(format!(
                    "schema steps cannot create transactions (id {})",
                    row.id
                )))
            }
        }
    }

    Ok(())
}
