//! Identity/session context
//!
//! A `Session` carries the currently active profile id, or nothing when no
//! one is signed in. It is passed explicitly into every repository call; the
//! persisted copy lives in the database (see `Database::session`).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    owner: Option<i64>,
}

impl Session {
    /// A session for the given profile. Non-positive ids are treated as absent.
    pub fn signed_in(user_id: i64) -> Self {
        Self::from_owner(Some(user_id))
    }

    pub fn anonymous() -> Self {
        Self { owner: None }
    }

    pub fn from_owner(owner: Option<i64>) -> Self {
        Self {
            owner: owner.filter(|id| *id > 0),
        }
    }

    pub fn owner(&self) -> Option<i64> {
        self.owner
    }

    pub fn is_signed_in(&self) -> bool {
        self.owner.is_some()
    }

    /// The owner id, or `NotSignedIn` for writes without a profile
    pub fn require_owner(&self) -> Result<i64> {
        self.owner.ok_or(Error::NotSignedIn)
    }
}

/// Parse an owner id as stored in the session table or supplied by a caller
pub fn parse_owner_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_in() {
        let session = Session::signed_in(7);
        assert_eq!(session.owner(), Some(7));
        assert_eq!(session.require_owner().unwrap(), 7);
    }

    #[test]
    fn test_anonymous_requires_sign_in() {
        let session = Session::anonymous();
        assert!(!session.is_signed_in());
        assert!(matches!(session.require_owner(), Err(Error::NotSignedIn)));
    }

    #[test]
    fn test_invalid_ids_are_anonymous() {
        assert!(!Session::signed_in(0).is_signed_in());
        assert!(!Session::signed_in(-3).is_signed_in());
    }

    #[test]
    fn test_parse_owner_id() {
        assert_eq!(parse_owner_id(" 12 "), Some(12));
        assert_eq!(parse_owner_id("abc"), None);
        assert_eq!(parse_owner_id("NaN"), None);
        assert_eq!(parse_owner_id("0"), None);
    }
}
