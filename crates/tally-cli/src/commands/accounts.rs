//! Account and balance command implementations

use anyhow::Result;
use tally_core::{
    db::Database,
    models::{AccountWithBalance, NewAccount},
    Error, Session,
};

use super::{require_session, truncate};

fn print_account(entry: &AccountWithBalance, currency: &str) {
    let account = &entry.account;
    let primary = if account.is_primary { "★" } else { " " };
    let balance = if entry.current_balance < 0.0 {
        format!("\x1b[31m{} {:.2}\x1b[0m", currency, entry.current_balance)
    } else {
        format!("{} {:.2}", currency, entry.current_balance)
    };
    println!(
        "   {} [{}] {} {:<24} │ {:<8} │ {:>14}",
        primary,
        account.id,
        account.icon,
        truncate(&account.nickname, 24),
        account.account_number,
        balance
    );
}

pub fn cmd_accounts_list(db: &Database, session: &Session, currency: &str) -> Result<()> {
    require_session(session)?;
    let accounts = db.list_accounts_with_balances(session)?;

    if accounts.is_empty() {
        println!("No accounts yet. Add one with:");
        println!("  tally accounts add --bank BML --number 1234");
        return Ok(());
    }

    println!();
    println!("🏦 Accounts");
    println!("   ─────────────────────────────────────────────────────────────");
    for entry in &accounts {
        print_account(entry, currency);
    }
    Ok(())
}

pub fn cmd_accounts_add(
    db: &Database,
    session: &Session,
    bank: &str,
    number: &str,
    nickname: Option<String>,
    starting_balance: f64,
    primary: bool,
) -> Result<()> {
    require_session(session)?;
    let id = db.add_account(
        session,
        &NewAccount {
            bank_name: bank.to_string(),
            account_number: number.to_string(),
            nickname,
            starting_balance,
            is_primary: primary,
            ..NewAccount::default()
        },
    )?;

    let is_primary = db
        .get_account(session, id)?
        .map(|a| a.is_primary)
        .unwrap_or(false);
    println!("✅ Added account {} ({} {})", id, bank, number);
    if is_primary {
        println!("   ★ This is now your primary account");
    }
    Ok(())
}

pub fn cmd_accounts_set_primary(db: &Database, session: &Session, id: i64) -> Result<()> {
    require_session(session)?;
    db.set_primary_account(session, id)?;
    println!("★ Account {} is now primary", id);
    Ok(())
}

pub fn cmd_accounts_delete(db: &Database, session: &Session, id: i64) -> Result<()> {
    require_session(session)?;
    match db.delete_account(session, id) {
        Ok(()) => {
            println!("🗑️  Account {} deleted", id);
            Ok(())
        }
        Err(e @ Error::AccountHasTransactions { .. }) => {
            println!("❌ {}", e);
            println!("   List them with: tally transactions list --account {}", id);
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn cmd_balance(
    db: &Database,
    session: &Session,
    account: Option<i64>,
    currency: &str,
) -> Result<()> {
    require_session(session)?;

    if let Some(id) = account {
        let found = db
            .get_account(session, id)?
            .ok_or_else(|| anyhow::anyhow!("Account {} not found", id))?;
        let balance = db.calculate_account_balance(session, id)?;
        println!(
            "{} {}: {} {:.2}",
            found.icon, found.nickname, currency, balance
        );
        return Ok(());
    }

    let accounts = db.list_accounts_with_balances(session)?;
    if accounts.is_empty() {
        println!("No accounts yet.");
        return Ok(());
    }

    println!();
    println!("💰 Balances");
    println!("   ─────────────────────────────────────────────────────────────");
    for entry in &accounts {
        print_account(entry, currency);
    }
    let total: f64 = accounts.iter().map(|a| a.current_balance).sum();
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Total: {} {:.2}", currency, total);
    Ok(())
}
