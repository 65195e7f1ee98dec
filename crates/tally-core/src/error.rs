//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("No file selected")]
    NoFileSelected,

    #[error("Invalid file: expected a header row and at least one data row")]
    InvalidFile,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid backup format: {0}")]
    InvalidBackupFormat(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account {account_id} still has {count} transaction(s); move or delete them first")]
    AccountHasTransactions { account_id: i64, count: i64 },

    #[error("A profile named '{0}' already exists")]
    DuplicateProfile(String),

    #[error("Invalid name or PIN")]
    InvalidCredentials,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Schema upgrade to version {version} failed: {reason}")]
    Migration { version: i64, reason: String },

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
