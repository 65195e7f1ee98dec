//! Export command implementations

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tally_core::{
    db::{Database, TransactionFilter},
    export::to_json_pretty,
    Session,
};

use super::require_session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Signed-in profile's transactions, categories and budgets as JSON
    Profile,
    /// Every table of every profile as JSON
    Dump,
    /// Signed-in profile's transactions as CSV
    Csv,
}

impl ExportKind {
    fn default_file_name(self) -> String {
        let date = Local::now().format("%Y-%m-%d");
        match self {
            Self::Profile => format!("tally-export-{}.json", date),
            Self::Dump => format!("tally-dump-{}.json", date),
            Self::Csv => format!("tally-transactions-{}.csv", date),
        }
    }
}

pub fn cmd_export(
    db: &Database,
    session: &Session,
    kind: ExportKind,
    out: Option<&Path>,
    export_dir: &Path,
) -> Result<PathBuf> {
    let (content, summary) = match kind {
        ExportKind::Profile => {
            require_session(session)?;
            let export = db.export_user_data(session)?;
            let summary = format!(
                "{} transactions, {} categories, {} budgets",
                export.stats.transaction_count,
                export.stats.category_count,
                export.data.budgets.len()
            );
            (to_json_pretty(&export)?, summary)
        }
        ExportKind::Dump => {
            let dump = db.export_database_dump()?;
            let summary = format!(
                "{} profiles, {} accounts, {} categories, {} transactions",
                dump.tables.users.len(),
                dump.tables.accounts.len(),
                dump.tables.categories.len(),
                dump.tables.transactions.len()
            );
            (to_json_pretty(&dump)?, summary)
        }
        ExportKind::Csv => {
            require_session(session)?;
            let csv = db.export_transactions_csv(session, &TransactionFilter::new())?;
            let rows = csv.lines().count().saturating_sub(1);
            (csv, format!("{} transactions", rows))
        }
    };

    let path = match out {
        Some(path) => path.to_path_buf(),
        None => {
            fs::create_dir_all(export_dir)
                .with_context(|| format!("Failed to create {}", export_dir.display()))?;
            export_dir.join(kind.default_file_name())
        }
    };
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(kind = ?kind, path = %path.display(), "Export written");

    println!("📤 Exported {} to {}", summary, path.display());
    if kind == ExportKind::Dump {
        println!("   ⚠️  The dump holds every profile's data and PIN hashes. Keep it private.");
    }
    Ok(path)
}
