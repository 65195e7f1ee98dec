//! Category operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Category, CategoryType, CategoryUpdate, NewCategory};
use crate::session::Session;

/// Seed set given to a profile with no categories: (name, icon, color, type)
pub const DEFAULT_CATEGORIES: &[(&str, &str, &str, CategoryType)] = &[
    ("Food", "🍔", "#F97316", CategoryType::Expense),
    ("Groceries", "🛒", "#84CC16", CategoryType::Expense),
    ("Transport", "🚕", "#0EA5E9", CategoryType::Expense),
    ("Shopping", "🛍️", "#EC4899", CategoryType::Expense),
    ("Bills", "🧾", "#EAB308", CategoryType::Expense),
    ("Health", "💊", "#EF4444", CategoryType::Expense),
    ("Entertainment", "🎬", "#8B5CF6", CategoryType::Expense),
    ("Education", "📚", "#14B8A6", CategoryType::Expense),
    ("Other", "📦", "#6B7280", CategoryType::Expense),
    ("Salary", "💰", "#16A34A", CategoryType::Income),
    ("Freelance", "💼", "#22C55E", CategoryType::Income),
    ("Other Income", "➕", "#4ADE80", CategoryType::Income),
    ("Transfer", "🔁", "#64748B", CategoryType::Transfer),
];

const CATEGORY_COLUMNS: &str = "id, user_id, name, name_dv, icon, color, type, budget";

/// Insert one category row for `owner`
pub(crate) fn insert_category_row(conn: &Connection, owner: i64, category: &NewCategory) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO categories (user_id, name, name_dv, icon, color, type, budget)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            owner,
            category.name.trim(),
            category.name_dv,
            category.icon,
            category.color,
            category.category_type.as_str(),
            category.budget,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn validate(category: &NewCategory) -> Result<()> {
    if category.name.trim().is_empty() {
        return Err(Error::InvalidData("Category name cannot be empty".to_string()));
    }
    if !category.budget.is_finite() || category.budget < 0.0 {
        return Err(Error::InvalidData(format!(
            "Budget must be a non-negative number, got {}",
            category.budget
        )));
    }
    Ok(())
}

impl Database {
    /// The owner's categories: type, then name
    pub fn list_categories(&self, session: &Session) -> Result<Vec<Category>> {
        let Some(owner) = session.owner() else {
            return Ok(Vec::new());
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM categories WHERE user_id = ? ORDER BY type, name COLLATE NOCASE, id",
            CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map(params![owner], Self::row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn get_category(&self, session: &Session, id: i64) -> Result<Option<Category>> {
        let Some(owner) = session.owner() else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let category = conn
            .query_row(
                &format!(
                    "SELECT {} FROM categories WHERE id = ? AND user_id = ?",
                    CATEGORY_COLUMNS
                ),
                params![id, owner],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Create a category; duplicate names are allowed
    pub fn add_category(&self, session: &Session, category: &NewCategory) -> Result<i64> {
        let owner = session.require_owner()?;
        validate(category)?;
        let conn = self.conn()?;
        insert_category_row(&conn, owner, category)
    }

    pub fn update_category(&self, session: &Session, id: i64, patch: &CategoryUpdate) -> Result<()> {
        let owner = session.require_owner()?;
        let existing = self
            .get_category(session, id)?
            .ok_or_else(|| Error::NotFound(format!("category {}", id)))?;

        let merged = NewCategory {
            name: patch.name.clone().unwrap_or(existing.name),
            name_dv: patch.name_dv.clone().or(existing.name_dv),
            icon: patch.icon.clone().unwrap_or(existing.icon),
            color: patch.color.clone().unwrap_or(existing.color),
            category_type: patch.category_type.unwrap_or(existing.category_type),
            budget: patch.budget.unwrap_or(existing.budget),
        };
        validate(&merged)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE categories SET name = ?, name_dv = ?, icon = ?, color = ?, type = ?, budget = ?
            WHERE id = ? AND user_id = ?
            "#,
            params![
                merged.name.trim(),
                merged.name_dv,
                merged.icon,
                merged.color,
                merged.category_type.as_str(),
                merged.budget,
                id,
                owner,
            ],
        )?;
        Ok(())
    }

    /// Delete an owned category; absent or foreign ids are ignored
    ///
    /// Transactions keep their category name.
    pub fn delete_category(&self, session: &Session, id: i64) -> Result<()> {
        let owner = session.require_owner()?;
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM categories WHERE id = ? AND user_id = ?",
            params![id, owner],
        )?;
        Ok(())
    }

    /// Give the owner the default categories if they have none
    ///
    /// Returns the number created.
    pub fn seed_default_categories(&self, session: &Session) -> Result<usize> {
        let owner = session.require_owner()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM categories WHERE user_id = ?",
            params![owner],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(0);
        }

        for (name, icon, color, category_type) in DEFAULT_CATEGORIES {
            insert_category_row(
                &tx,
                owner,
                &NewCategory {
                    name: name.to_string(),
                    name_dv: None,
                    icon: icon.to_string(),
                    color: color.to_string(),
                    category_type: *category_type,
                    budget: 0.0,
                },
            )?;
        }
        tx.commit()?;

        info!(owner, count = DEFAULT_CATEGORIES.len(), "Seeded default categories");
        Ok(DEFAULT_CATEGORIES.len())
    }

    /// Every category of every owner, by id
    pub(crate) fn list_all_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM categories ORDER BY id",
            CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map([], Self::row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        let type_str: String = row.get(6)?;
        Ok(Category {
            id: row.get(0)?,
            user_id: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
            name: row.get(2)?,
            name_dv: row.get(3)?,
            icon: row.get(4)?,
            color: row.get(5)?,
            category_type: type_str.parse().unwrap_or_default(),
            budget: row.get(7)?,
        })
    }
}
