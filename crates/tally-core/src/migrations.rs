//! Versioned schema steps
//!
//! Each step pairs additive DDL with a pure data transform over a `Snapshot`
//! of the rows the upgrade can touch. The database layer (`db::schema`) runs
//! the DDL of every pending step, loads one snapshot, folds it through the
//! pending transforms in order and writes back whatever changed, all inside
//! one SQLite transaction.
//!
//! Transforms only fill fields that are absent (`None`), so running a step
//! over already-upgraded rows is a no-op.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::models::{bank_style, default_nickname};

/// Schema version this build expects
pub const TARGET_VERSION: i64 = 4;

/// Bank name given to the account synthesized for profiles that had none
pub const BACKFILL_BANK_NAME: &str = "Main";
pub const BACKFILL_NICKNAME: &str = "Main Account";

/// A schema change applied before the data transform
#[derive(Debug, Clone, Copy)]
pub enum DdlStep {
    /// Idempotent statement batch (`CREATE ... IF NOT EXISTS`)
    Sql(&'static str),
    /// Add a nullable column unless it already exists
    AddColumn {
        table: &'static str,
        column: &'static str,
        decl: &'static str,
    },
}

pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub ddl: &'static [DdlStep],
    pub transform: fn(Snapshot) -> Result<Snapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub starting_balance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub bank_name: String,
    pub account_number: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub nickname: Option<String>,
    pub starting_balance: Option<f64>,
    pub is_primary: Option<bool>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub account_id: Option<i64>,
    pub account_number: String,
}

/// In-memory copy of the rows schema upgrades read and rewrite
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Timestamp stamped on rows a transform creates
    pub now: String,
    pub users: Vec<UserRow>,
    pub accounts: Vec<AccountRow>,
    pub transactions: Vec<TransactionRow>,
}

impl Snapshot {
    fn next_account_id(&self) -> i64 {
        self.accounts.iter().map(|a| a.id).max().unwrap_or(0) + 1
    }
}

const BASE_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY,
        bank_name TEXT NOT NULL DEFAULT '',
        account_number TEXT NOT NULL DEFAULT '',
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        name_dv TEXT,
        icon TEXT NOT NULL DEFAULT '',
        color TEXT NOT NULL DEFAULT '',
        type TEXT NOT NULL DEFAULT 'expense',     -- expense, income, transfer
        budget REAL NOT NULL DEFAULT 0           -- monthly ceiling, 0 = unset
    );

    CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY,
        date TEXT NOT NULL,                       -- RFC 3339 instant, UTC
        type TEXT NOT NULL DEFAULT 'debit',       -- debit, credit
        amount REAL NOT NULL,                     -- magnitude, never negative
        category TEXT NOT NULL DEFAULT 'Other',   -- category name, not an id
        merchant TEXT NOT NULL DEFAULT '',
        bank TEXT NOT NULL DEFAULT '',
        account_number TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL DEFAULT 'manual',    -- manual, csv, backup, receipt, recurring
        splits TEXT,                              -- JSON array of {category, amount, note}
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
"#;

const PROFILE_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        name_lower TEXT NOT NULL UNIQUE,
        pin_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        last_login_at TEXT
    );

    -- Persisted session (current profile id)
    CREATE TABLE IF NOT EXISTS session (
        key TEXT PRIMARY KEY,
        value TEXT
    );
"#;

const OWNER_INDEXES: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);
    CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id);
    CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id);
"#;

const ACCOUNT_LINK_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(user_id, account_id);
"#;

/// Ordered list of every schema step
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "base tables",
        ddl: &[DdlStep::Sql(BASE_TABLES)],
        transform: unchanged,
    },
    Migration {
        version: 2,
        description: "profiles and per-record owner",
        ddl: &[
            DdlStep::Sql(PROFILE_TABLES),
            DdlStep::AddColumn {
                table: "transactions",
                column: "user_id",
                decl: "INTEGER",
            },
            DdlStep::AddColumn {
                table: "categories",
                column: "user_id",
                decl: "INTEGER",
            },
            DdlStep::AddColumn {
                table: "accounts",
                column: "user_id",
                decl: "INTEGER",
            },
            DdlStep::Sql(OWNER_INDEXES),
        ],
        transform: unchanged,
    },
    Migration {
        version: 3,
        description: "profile starting balance",
        ddl: &[DdlStep::AddColumn {
            table: "users",
            column: "starting_balance",
            decl: "REAL",
        }],
        transform: unchanged,
    },
    Migration {
        version: 4,
        description: "account details and transaction account links",
        ddl: &[
            DdlStep::AddColumn {
                table: "accounts",
                column: "nickname",
                decl: "TEXT",
            },
            DdlStep::AddColumn {
                table: "accounts",
                column: "starting_balance",
                decl: "REAL",
            },
            DdlStep::AddColumn {
                table: "accounts",
                column: "is_primary",
                decl: "BOOLEAN",
            },
            DdlStep::AddColumn {
                table: "accounts",
                column: "icon",
                decl: "TEXT",
            },
            DdlStep::AddColumn {
                table: "accounts",
                column: "color",
                decl: "TEXT",
            },
            DdlStep::AddColumn {
                table: "transactions",
                column: "account_id",
                decl: "INTEGER REFERENCES accounts(id)",
            },
            DdlStep::Sql(ACCOUNT_LINK_INDEX),
        ],
        transform: enrich_accounts_and_backfill,
    },
];

/// Steps newer than `current`, in order
pub fn pending(current: i64) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > current)
}

/// Versions 1-3 only add tables and columns; existing rows keep every new
/// field absent. Orphaned rows are claimed when the first profile is created.
fn unchanged(snapshot: Snapshot) -> Result<Snapshot> {
    Ok(snapshot)
}

/// Version 4: fill account display fields, then link transactions to accounts
pub fn enrich_accounts_and_backfill(snapshot: Snapshot) -> Result<Snapshot> {
    let snapshot = enrich_accounts(snapshot);
    Ok(backfill_account_links(snapshot))
}

/// Fill nickname, starting balance, primary flag, icon and color where absent
pub fn enrich_accounts(mut snapshot: Snapshot) -> Snapshot {
    for account in &mut snapshot.accounts {
        let style = bank_style(&account.bank_name);
        if account.nickname.is_none() {
            account.nickname = Some(default_nickname(
                &account.bank_name,
                &account.account_number,
            ));
        }
        if account.starting_balance.is_none() {
            account.starting_balance = Some(0.0);
        }
        if account.is_primary.is_none() {
            account.is_primary = Some(false);
        }
        if account.icon.is_none() {
            account.icon = Some(style.icon.to_string());
        }
        if account.color.is_none() {
            account.color = Some(style.color.to_string());
        }
    }
    snapshot
}

/// Give every profile without accounts a primary account holding its legacy
/// starting balance and move its unlinked transactions there. For profiles
/// that already have accounts, link unlinked transactions by account number.
pub fn backfill_account_links(mut snapshot: Snapshot) -> Snapshot {
    let owners_with_accounts: HashSet<i64> =
        snapshot.accounts.iter().filter_map(|a| a.user_id).collect();

    let mut synthesized: HashMap<i64, i64> = HashMap::new();
    let profiles: Vec<(i64, Option<f64>)> = snapshot
        .users
        .iter()
        .map(|u| (u.id, u.starting_balance))
        .collect();

    for (user_id, starting_balance) in profiles {
        if owners_with_accounts.contains(&user_id) {
            continue;
        }
        let id = snapshot.next_account_id();
        let style = bank_style(BACKFILL_BANK_NAME);
        snapshot.accounts.push(AccountRow {
            id,
            user_id: Some(user_id),
            bank_name: BACKFILL_BANK_NAME.to_string(),
            account_number: String::new(),
            is_active: true,
            created_at: snapshot.now.clone(),
            updated_at: snapshot.now.clone(),
            nickname: Some(BACKFILL_NICKNAME.to_string()),
            starting_balance: Some(starting_balance.unwrap_or(0.0)),
            is_primary: Some(true),
            icon: Some(style.icon.to_string()),
            color: Some(style.color.to_string()),
        });
        synthesized.insert(user_id, id);
    }

    // (owner, trimmed account number) -> account id; first account wins
    let mut by_number: HashMap<(i64, String), i64> = HashMap::new();
    for account in &snapshot.accounts {
        let number = account.account_number.trim();
        if let (Some(owner), false) = (account.user_id, number.is_empty()) {
            by_number
                .entry((owner, number.to_string()))
                .or_insert(account.id);
        }
    }

    for tx in &mut snapshot.transactions {
        if tx.account_id.is_some() {
            continue;
        }
        let Some(owner) = tx.user_id else {
            continue;
        };
        if let Some(account_id) = synthesized.get(&owner) {
            tx.account_id = Some(*account_id);
            continue;
        }
        let number = tx.account_number.trim();
        if number.is_empty() {
            continue;
        }
        if let Some(account_id) = by_number.get(&(owner, number.to_string())) {
            tx.account_id = Some(*account_id);
        }
    }

    snapshot
}
