//! Persisted session
//!
//! One row in the `session` key/value table remembers which profile is signed
//! in between runs. Single-process only.

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::session::{parse_owner_id, Session};

const CURRENT_USER_KEY: &str = "current_user_id";

impl Database {
    /// Persisted owner id, if any
    pub fn current_user_id(&self) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT value FROM session WHERE key = ?",
                params![CURRENT_USER_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.flatten().as_deref().and_then(parse_owner_id))
    }

    /// Persist the owner id; `None` signs out
    pub fn set_current_user_id(&self, user_id: Option<i64>) -> Result<()> {
        let conn = self.conn()?;
        match user_id.filter(|id| *id > 0) {
            Some(id) => {
                conn.execute(
                    "INSERT INTO session (key, value) VALUES (?, ?)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![CURRENT_USER_KEY, id.to_string()],
                )?;
            }
            None => {
                conn.execute(
                    "DELETE FROM session WHERE key = ?",
                    params![CURRENT_USER_KEY],
                )?;
            }
        }
        Ok(())
    }

    /// Resolve the persisted id into a `Session`
    ///
    /// An id whose profile no longer exists resolves to an anonymous session.
    pub fn session(&self) -> Result<Session> {
        let Some(id) = self.current_user_id()? else {
            return Ok(Session::anonymous());
        };
        if self.get_profile(id)?.is_some() {
            Ok(Session::signed_in(id))
        } else {
            Ok(Session::anonymous())
        }
    }
}
