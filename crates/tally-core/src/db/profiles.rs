//! Profile operations

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{format_timestamp, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::Profile;
use crate::session::Session;

const PROFILE_COLUMNS: &str =
    "id, name, name_lower, pin_hash, created_at, last_login_at, starting_balance";

fn hash_pin(pin: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Encryption(format!("Failed to hash PIN: {}", e)))
}

fn verify_pin(pin: &str, pin_hash: &str) -> bool {
    PasswordHash::new(pin_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(pin.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn clean_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidData("Profile name cannot be empty".to_string()));
    }
    Ok(name.to_string())
}

fn check_pin(pin: &str) -> Result<()> {
    if pin.trim().is_empty() {
        return Err(Error::InvalidData("PIN cannot be empty".to_string()));
    }
    Ok(())
}

impl Database {
    /// Create a profile
    ///
    /// Names are unique case-insensitively. The first profile ever created
    /// takes ownership of records that predate profiles.
    pub fn create_profile(&self, name: &str, pin: &str) -> Result<Profile> {
        let name = clean_name(name)?;
        check_pin(pin)?;
        let name_lower = name.to_lowercase();
        let pin_hash = hash_pin(pin)?;
        let now = format_timestamp(&Utc::now());

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let taken: Option<i64> = tx
            .query_row(
                "SELECT id FROM users WHERE name_lower = ?",
                params![name_lower],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(Error::DuplicateProfile(name));
        }

        let existing: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

        tx.execute(
            "INSERT INTO users (name, name_lower, pin_hash, created_at) VALUES (?, ?, ?, ?)",
            params![name, name_lower, pin_hash, now],
        )?;
        let id = tx.last_insert_rowid();

        if existing == 0 {
            let claimed = claim_orphans(&tx, id)?;
            if claimed > 0 {
                info!(user_id = id, records = claimed, "Claimed records without owner");
            }
        }

        tx.commit()?;
        info!(user_id = id, "Created profile");

        self.get_profile(id)?
            .ok_or_else(|| Error::NotFound(format!("profile {}", id)))
    }

    pub fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", PROFILE_COLUMNS),
                params![id],
                Self::row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// All profiles, by name
    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY name_lower",
            PROFILE_COLUMNS
        ))?;
        let profiles = stmt
            .query_map([], Self::row_to_profile)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    /// Verify a PIN and sign the profile in
    pub fn login(&self, name: &str, pin: &str) -> Result<Session> {
        let name_lower = name.trim().to_lowercase();
        let found: Option<(i64, String)> = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT id, pin_hash FROM users WHERE name_lower = ?",
                params![name_lower],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        let (id, pin_hash) = found.ok_or(Error::InvalidCredentials)?;
        if !verify_pin(pin, &pin_hash) {
            return Err(Error::InvalidCredentials);
        }

        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE users SET last_login_at = ? WHERE id = ?",
                params![format_timestamp(&Utc::now()), id],
            )?;
        }
        self.set_current_user_id(Some(id))?;

        info!(user_id = id, "Signed in");
        Ok(Session::signed_in(id))
    }

    pub fn logout(&self) -> Result<()> {
        self.set_current_user_id(None)
    }

    pub fn rename_profile(&self, session: &Session, name: &str) -> Result<()> {
        let id = session.require_owner()?;
        let name = clean_name(name)?;
        let name_lower = name.to_lowercase();

        let conn = self.conn()?;
        let taken: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE name_lower = ? AND id != ?",
                params![name_lower, id],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(Error::DuplicateProfile(name));
        }

        let updated = conn.execute(
            "UPDATE users SET name = ?, name_lower = ? WHERE id = ?",
            params![name, name_lower, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("profile {}", id)));
        }
        Ok(())
    }

    /// Replace the PIN after checking the current one
    pub fn change_pin(&self, session: &Session, old_pin: &str, new_pin: &str) -> Result<()> {
        let id = session.require_owner()?;
        check_pin(new_pin)?;

        let profile = self
            .get_profile(id)?
            .ok_or_else(|| Error::NotFound(format!("profile {}", id)))?;
        if !verify_pin(old_pin, &profile.pin_hash) {
            return Err(Error::InvalidCredentials);
        }

        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET pin_hash = ? WHERE id = ?",
            params![hash_pin(new_pin)?, id],
        )?;
        Ok(())
    }

    /// Delete the signed-in profile and everything it owns
    pub fn delete_profile(&self, session: &Session) -> Result<()> {
        let id = session.require_owner()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // Transactions first: they reference accounts
        let transactions = tx.execute("DELETE FROM transactions WHERE user_id = ?", params![id])?;
        let categories = tx.execute("DELETE FROM categories WHERE user_id = ?", params![id])?;
        let accounts = tx.execute("DELETE FROM accounts WHERE user_id = ?", params![id])?;
        tx.execute("DELETE FROM users WHERE id = ?", params![id])?;
        tx.execute(
            "DELETE FROM session WHERE key = 'current_user_id' AND value = ?",
            params![id.to_string()],
        )?;

        tx.commit()?;
        info!(
            user_id = id,
            transactions, categories, accounts, "Deleted profile"
        );
        Ok(())
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        let created_at: String = row.get(4)?;
        let last_login_at: Option<String> = row.get(5)?;
        Ok(Profile {
            id: row.get(0)?,
            name: row.get(1)?,
            name_lower: row.get(2)?,
            pin_hash: row.get(3)?,
            created_at: parse_datetime(&created_at),
            last_login_at: last_login_at.as_deref().map(parse_datetime),
            starting_balance: row.get(6)?,
        })
    }
}

/// Assign every record without an owner to `user_id` and link its
/// transactions to accounts by number
fn claim_orphans(tx: &rusqlite::Transaction, user_id: i64) -> Result<usize> {
    let mut claimed = 0;
    for table in ["transactions", "categories", "accounts"] {
        claimed += tx.execute(
            &format!("UPDATE {} SET user_id = ? WHERE user_id IS NULL", table),
            params![user_id],
        )?;
    }

    tx.execute(
        r#"
        UPDATE transactions SET account_id = (
            SELECT a.id FROM accounts a
            WHERE a.user_id = ?1
              AND TRIM(a.account_number) != ''
              AND TRIM(a.account_number) = TRIM(transactions.account_number)
            ORDER BY a.id LIMIT 1
        )
        WHERE user_id = ?1 AND account_id IS NULL
        "#,
        params![user_id],
    )?;

    // Claimed accounts need a primary like any other set
    tx.execute(
        r#"
        UPDATE accounts SET is_primary = 1
        WHERE id = (SELECT MIN(id) FROM accounts WHERE user_id = ?1)
          AND NOT EXISTS (SELECT 1 FROM accounts WHERE user_id = ?1 AND is_primary = 1)
        "#,
        params![user_id],
    )?;

    Ok(claimed)
}
