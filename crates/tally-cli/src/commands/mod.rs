//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, require_session, money)
//! - `profile` - Profile commands (create, list, login, logout, rename, set-pin, delete)
//! - `accounts` - Account commands and balances
//! - `categories` - Category commands
//! - `transactions` - Transaction commands (list, add, delete)
//! - `import` - CSV import and backup merge/preview
//! - `export` - Per-profile export, full dump, CSV export
//! - `status` - Database status

pub mod accounts;
pub mod categories;
pub mod core;
pub mod export;
pub mod import;
pub mod profile;
pub mod status;
pub mod transactions;

// Re-export command functions for main.rs
pub use accounts::*;
pub use categories::*;
pub use self::core::*;
pub use export::*;
pub use import::*;
pub use profile::*;
pub use status::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
