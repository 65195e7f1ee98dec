//! Transaction command implementations

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use tally_core::{
    db::{Database, TransactionFilter},
    models::{NewTransaction, TransactionType},
    Session,
};

use super::{format_money, parse_date_arg, require_session, truncate};

/// Filters for `transactions list`
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub limit: i64,
    pub from: Option<String>,
    pub to: Option<String>,
    pub transaction_type: Option<String>,
    pub category: Option<String>,
    pub bank: Option<String>,
    pub account: Option<i64>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            from: None,
            to: None,
            transaction_type: None,
            category: None,
            bank: None,
            account: None,
        }
    }
}

/// Arguments for `transactions add`
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub amount: f64,
    pub transaction_type: String,
    pub category: String,
    pub merchant: String,
    pub description: String,
    pub date: Option<String>,
    pub account: Option<i64>,
}

pub fn cmd_transactions_list(
    db: &Database,
    session: &Session,
    options: &ListOptions,
    currency: &str,
) -> Result<()> {
    require_session(session)?;

    let date_range = match (&options.from, &options.to) {
        (None, None) => None,
        (from, to) => {
            let from = match from {
                Some(s) => parse_date_arg(s)?,
                None => NaiveDate::from_ymd_opt(1, 1, 1).context("date out of range")?,
            };
            let to = match to {
                Some(s) => parse_date_arg(s)?,
                None => NaiveDate::from_ymd_opt(9999, 12, 31).context("date out of range")?,
            };
            Some((from, to))
        }
    };

    let filter = TransactionFilter::new()
        .account_id(options.account)
        .date_range(date_range)
        .transaction_type(options.transaction_type.as_deref().map(TransactionType::normalize))
        .category(options.category.as_deref())
        .bank(options.bank.as_deref())
        .limit(Some(options.limit));

    let transactions = db.list_transactions(session, &filter)?;
    if transactions.is_empty() {
        println!("No transactions found. Import some with:");
        println!("  tally import csv --file statement.csv");
        return Ok(());
    }
    let total = db.count_transactions(session, &filter)?;

    println!();
    println!(
        "📝 Transactions ({} of {})",
        transactions.len(),
        total
    );
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let label = if tx.merchant.is_empty() {
            &tx.description
        } else {
            &tx.merchant
        };
        println!(
            "   [{}] {} │ {:>16} │ {:<12} │ {}",
            tx.id,
            tx.date.with_timezone(&Local).format("%Y-%m-%d"),
            format_money(tx.amount, &tx.transaction_type, currency),
            truncate(&tx.category, 12),
            truncate(label, 32)
        );
    }

    Ok(())
}

pub fn cmd_transactions_add(db: &Database, session: &Session, entry: NewEntry) -> Result<()> {
    require_session(session)?;

    let date = match entry.date.as_deref() {
        Some(s) => {
            let day = parse_date_arg(s)?;
            // Same local-noon anchoring as CSV dates
            day.and_hms_opt(12, 0, 0)
                .and_then(|noon| Local.from_local_datetime(&noon).earliest())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now)
        }
        None => Utc::now(),
    };

    let account_id = match entry.account {
        Some(id) => Some(id),
        None => db.primary_account(session)?.map(|a| a.id),
    };
    let (bank, account_number) = match account_id {
        Some(id) => db
            .get_account(session, id)?
            .map(|a| (a.bank_name, a.account_number))
            .unwrap_or_default(),
        None => Default::default(),
    };

    let id = db.add_transaction(
        session,
        &NewTransaction {
            account_id,
            date,
            transaction_type: TransactionType::normalize(&entry.transaction_type),
            amount: entry.amount.abs(),
            category: entry.category,
            merchant: entry.merchant,
            bank,
            account_number,
            description: entry.description,
            ..NewTransaction::default()
        },
    )?;

    println!("✅ Added transaction {}", id);
    Ok(())
}

pub fn cmd_transactions_delete(db: &Database, session: &Session, id: i64) -> Result<()> {
    require_session(session)?;
    db.delete_transaction(session, id)?;
    println!("🗑️  Transaction {} deleted", id);
    Ok(())
}
