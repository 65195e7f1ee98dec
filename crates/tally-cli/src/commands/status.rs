//! Status command implementation

use std::fs;

use anyhow::Result;
use tally_core::{db::DB_KEY_ENV, migrations::TARGET_VERSION, Config, TransactionFilter};

use super::open_db;

pub fn cmd_status(config: &Config, no_encrypt: bool) -> Result<()> {
    let db_path = &config.database_path;

    println!();
    println!("📊 Tally Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Database path
    println!("   Database: {}", db_path.display());
    println!("   Exports: {}", config.export_dir.display());

    // Check if database file exists and get size
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    // Check encryption status
    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    // Try to open the database and show stats
    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                println!();
                println!("   Schema version: {} (target {})", db.schema_version()?, TARGET_VERSION);
                println!("   Profiles: {}", db.list_profiles()?.len());

                let session = db.session()?;
                match session.owner().map(|id| db.get_profile(id)).transpose()?.flatten() {
                    Some(profile) => {
                        println!("   Signed in: {}", profile.name);
                        println!("   Accounts: {}", db.list_accounts(&session)?.len());
                        println!(
                            "   Transactions: {}",
                            db.count_transactions(&session, &TransactionFilter::new())?
                        );
                    }
                    None => println!("   Signed in: (nobody)"),
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}
