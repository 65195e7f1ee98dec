//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `require_session` - Fail early when nobody is signed in
//! - `cmd_init` - Initialize the database

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tally_core::{db::Database, models::TransactionType, Session};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    tracing::debug!(path = path_str, encrypted = !no_encrypt, "Opening database");
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// The signed-in profile's id, or a hint on how to sign in
pub fn require_session(session: &Session) -> Result<i64> {
    match session.owner() {
        Some(id) => Ok(id),
        None => bail!("Not signed in. Run: tally profile login <name> --pin <pin>"),
    }
}

/// Parse a `YYYY-MM-DD` argument
pub fn parse_date_arg(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

/// Colored signed amount: red for debits, green for credits
pub fn format_money(amount: f64, kind: &TransactionType, currency: &str) -> String {
    match kind {
        TransactionType::Debit => format!("\x1b[31m-{} {:.2}\x1b[0m", currency, amount),
        TransactionType::Credit => format!("\x1b[32m+{} {:.2}\x1b[0m", currency, amount),
        TransactionType::Other(_) => format!("{} {:.2}", currency, amount),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    println!("   Schema version: {}", db.schema_version()?);

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create a profile: tally profile create <name> --pin <pin>");
    println!("  2. Add an account: tally accounts add --bank BML --number 1234");
    println!("  3. Import transactions: tally import csv --file statement.csv");

    Ok(())
}
