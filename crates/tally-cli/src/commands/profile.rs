//! Profile command implementations

use anyhow::{bail, Result};
use tally_core::db::Database;

use super::require_session;

pub fn cmd_profile_create(db: &Database, name: &str, pin: &str) -> Result<()> {
    let first = db.list_profiles()?.is_empty();
    let profile = db.create_profile(name, pin)?;

    println!("✅ Created profile '{}' (id {})", profile.name, profile.id);
    if first {
        println!("   Any records from before profiles existed now belong to it.");
    }
    println!("   Sign in with: tally profile login {} --pin <pin>", profile.name);
    Ok(())
}

pub fn cmd_profile_list(db: &Database) -> Result<()> {
    let profiles = db.list_profiles()?;
    if profiles.is_empty() {
        println!("No profiles yet. Create one with:");
        println!("  tally profile create <name> --pin <pin>");
        return Ok(());
    }

    let current = db.session()?.owner();

    println!();
    println!("👤 Profiles");
    println!("   ─────────────────────────────────────────────────────────────");
    for profile in profiles {
        let marker = if Some(profile.id) == current { "●" } else { " " };
        let last_login = profile
            .last_login_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "   {} [{}] {:<20} last login: {}",
            marker, profile.id, profile.name, last_login
        );
    }
    Ok(())
}

pub fn cmd_profile_login(db: &Database, name: &str, pin: &str) -> Result<()> {
    let session = db.login(name, pin)?;
    let seeded = db.seed_default_categories(&session)?;

    println!("🔓 Signed in as {}", name.trim());
    if seeded > 0 {
        println!("   Added {} default categories", seeded);
    }
    Ok(())
}

pub fn cmd_profile_logout(db: &Database) -> Result<()> {
    db.logout()?;
    println!("🔒 Signed out");
    Ok(())
}

pub fn cmd_profile_rename(db: &Database, name: &str) -> Result<()> {
    let session = db.session()?;
    require_session(&session)?;
    db.rename_profile(&session, name)?;
    println!("✅ Profile renamed to '{}'", name.trim());
    Ok(())
}

pub fn cmd_profile_set_pin(db: &Database, old_pin: &str, new_pin: &str) -> Result<()> {
    let session = db.session()?;
    require_session(&session)?;
    db.change_pin(&session, old_pin, new_pin)?;
    println!("✅ PIN changed");
    Ok(())
}

pub fn cmd_profile_delete(db: &Database, confirmed: bool) -> Result<()> {
    let session = db.session()?;
    let id = require_session(&session)?;
    if !confirmed {
        bail!("This deletes the profile and all its accounts, categories and transactions. Re-run with --yes to confirm.");
    }

    db.delete_profile(&session)?;
    println!("🗑️  Deleted profile {} and everything it owned", id);
    Ok(())
}
