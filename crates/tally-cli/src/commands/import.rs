//! Import command implementations (CSV import, backup merge and preview)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{db::Database, preview_backup, Session};

use super::require_session;

fn read_file(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read file: {}", file.display()))
}

pub fn cmd_import_csv(
    db: &Database,
    session: &Session,
    file: &Path,
    account: Option<i64>,
) -> Result<()> {
    require_session(session)?;
    let text = read_file(file)?;

    println!("📥 Importing {}...", file.display());
    let result = db.import_csv(session, Some(&text), account)?;
    if result.parsed == 0 {
        tracing::warn!(file = %file.display(), "No rows with a usable amount");
    }

    println!("✅ Import complete!");
    println!("   Parsed: {}", result.parsed);
    println!("   Imported: {}", result.imported);
    println!("   Skipped (duplicates): {}", result.duplicates);
    if result.imported == 0 && result.parsed == 0 {
        println!();
        println!("💡 No rows had a usable amount. Check the Amount column.");
    }
    Ok(())
}

pub fn cmd_import_backup_preview(file: &Path) -> Result<()> {
    let text = read_file(file)?;
    let preview = preview_backup(&text)?;

    println!();
    println!("🔎 Backup Preview");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   File: {}", file.display());
    println!(
        "   Database: {}",
        preview.db_name.as_deref().unwrap_or("(unknown)")
    );
    println!(
        "   Exported: {}",
        preview.exported_at.as_deref().unwrap_or("(unknown)")
    );
    if let Some(version) = preview.version {
        println!("   Schema version: {}", version);
    }
    println!();
    for (table, count) in &preview.counts {
        println!("   {:<14} {}", table, count);
    }
    println!();
    println!("   Nothing was imported. Re-run without --preview to merge.");
    Ok(())
}

pub fn cmd_import_backup(db: &Database, session: &Session, file: &Path) -> Result<()> {
    require_session(session)?;
    let text = read_file(file)?;

    println!("📦 Merging {}...", file.display());
    let stats = db.import_backup(session, Some(&text))?;

    println!("✅ Merge complete!");
    println!("   Transactions: {}", stats.transactions);
    println!("   Categories: {}", stats.categories);
    println!("   Accounts: {}", stats.accounts);
    Ok(())
}
