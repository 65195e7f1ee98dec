//! Category command implementations

use anyhow::{anyhow, Result};
use tally_core::{
    db::Database,
    models::{CategoryType, NewCategory},
    Session,
};

use super::require_session;

pub fn cmd_categories_list(db: &Database, session: &Session) -> Result<()> {
    require_session(session)?;
    let categories = db.list_categories(session)?;

    if categories.is_empty() {
        println!("No categories. Add the defaults with:");
        println!("  tally categories seed");
        return Ok(());
    }

    println!();
    println!("🗂️  Categories");
    println!("   ─────────────────────────────────────────────────────────────");
    for category in categories {
        let budget = if category.budget > 0.0 {
            format!("budget {:.2}", category.budget)
        } else {
            String::new()
        };
        println!(
            "   [{}] {} {:<20} {:<9} {}",
            category.id, category.icon, category.name, category.category_type, budget
        );
    }
    Ok(())
}

pub fn cmd_categories_add(
    db: &Database,
    session: &Session,
    name: &str,
    category_type: &str,
    budget: f64,
    icon: Option<&str>,
) -> Result<()> {
    require_session(session)?;
    let category_type: CategoryType = category_type.parse().map_err(|e: String| anyhow!(e))?;

    let id = db.add_category(
        session,
        &NewCategory {
            name: name.to_string(),
            icon: icon.unwrap_or("🏷️").to_string(),
            category_type,
            budget,
            ..NewCategory::default()
        },
    )?;
    println!("✅ Added category {} ({})", name, id);
    Ok(())
}

pub fn cmd_categories_delete(db: &Database, session: &Session, id: i64) -> Result<()> {
    require_session(session)?;
    db.delete_category(session, id)?;
    println!("🗑️  Category {} deleted", id);
    Ok(())
}

pub fn cmd_categories_seed(db: &Database, session: &Session) -> Result<()> {
    require_session(session)?;
    let created = db.seed_default_categories(session)?;
    if created == 0 {
        println!("Categories already exist; nothing to seed.");
    } else {
        println!("✅ Added {} default categories", created);
    }
    Ok(())
}
