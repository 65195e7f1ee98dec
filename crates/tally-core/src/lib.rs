//! Tally Core Library
//!
//! Local data store for the Tally personal finance tracker:
//! - Profiles with PIN login and a persisted session
//! - Accounts whose balances are derived from the transaction log
//! - Versioned schema upgrades with data backfill
//! - CSV import and backup merge with duplicate detection
//! - JSON and CSV export

pub mod balance;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod migrations;
pub mod models;
pub mod reconcile;
pub mod session;

pub use config::{Config, FileConfig};
pub use db::{Database, TransactionFilter};
pub use error::{Error, Result};
pub use export::{DatabaseDump, UserExport};
pub use import::{CsvDefaults, CsvImportResult};
pub use reconcile::{preview_backup, BackupPreview, MergeStats};
pub use session::Session;
