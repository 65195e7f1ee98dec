//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Track money across profiles and accounts
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Local personal finance tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides TALLY_DB and the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to the data directory's config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and bring its schema up to date
    Init,

    /// Manage profiles and sign in
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Manage accounts (list, add, set-primary, delete)
    Accounts {
        #[command(subcommand)]
        action: Option<AccountsAction>,
    },

    /// Manage categories (list, add, delete, seed)
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Manage transactions (list, add, delete)
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Show derived account balances
    Balance {
        /// Only this account
        #[arg(short, long)]
        account: Option<i64>,
    },

    /// Import a CSV statement or merge a backup
    Import {
        #[command(subcommand)]
        action: ImportAction,
    },

    /// Export the signed-in profile's data, or dump the whole database
    Export {
        /// Dump every table of every profile (includes PIN hashes)
        #[arg(long, conflicts_with = "csv")]
        dump: bool,

        /// Export transactions as CSV instead of JSON
        #[arg(long)]
        csv: bool,

        /// Output file (defaults to a dated file in the export directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show database status (encryption, size, schema version, session)
    Status,
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Create a profile
    Create {
        name: String,
        #[arg(long)]
        pin: String,
    },

    /// List profiles
    List,

    /// Sign in
    Login {
        name: String,
        #[arg(long)]
        pin: String,
    },

    /// Sign out
    Logout,

    /// Rename the signed-in profile
    Rename { name: String },

    /// Change the signed-in profile's PIN
    SetPin {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },

    /// Delete the signed-in profile and everything it owns
    Delete {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum AccountsAction {
    /// List accounts with balances
    List,

    /// Add an account
    Add {
        /// Bank name (e.g., BML, MIB)
        #[arg(short, long)]
        bank: String,

        /// Last digits of the account number
        #[arg(short, long)]
        number: String,

        #[arg(long)]
        nickname: Option<String>,

        /// Balance at creation; cannot be changed later
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        starting_balance: f64,

        /// Make this the primary account
        #[arg(long)]
        primary: bool,
    },

    /// Make an account the primary one
    SetPrimary { id: i64 },

    /// Delete an account that has no transactions
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories
    List,

    /// Add a category
    Add {
        name: String,

        /// expense, income, or transfer
        #[arg(short = 't', long = "type", default_value = "expense")]
        category_type: String,

        /// Monthly budget (0 = none)
        #[arg(long, default_value = "0")]
        budget: f64,

        #[arg(long)]
        icon: Option<String>,
    },

    /// Delete a category
    Delete { id: i64 },

    /// Add the default categories if there are none
    Seed,
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List transactions, newest first
    List {
        /// Maximum number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// debit or credit
        #[arg(short = 't', long = "type")]
        transaction_type: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        bank: Option<String>,

        #[arg(short, long)]
        account: Option<i64>,
    },

    /// Add a transaction
    Add {
        amount: f64,

        /// debit or credit
        #[arg(short = 't', long = "type", default_value = "debit")]
        transaction_type: String,

        #[arg(short, long, default_value = "Other")]
        category: String,

        #[arg(short, long, default_value = "")]
        merchant: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Date (YYYY-MM-DD), defaults to now
        #[arg(long)]
        date: Option<String>,

        /// Account id (defaults to the primary account)
        #[arg(short, long)]
        account: Option<i64>,
    },

    /// Delete a transaction
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum ImportAction {
    /// Import a CSV statement (Date, Type, Amount columns required)
    Csv {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Account id (defaults to the primary account)
        #[arg(short, long)]
        account: Option<i64>,
    },

    /// Merge a JSON backup or dump into the signed-in profile
    Backup {
        /// Backup file to merge
        #[arg(short, long)]
        file: PathBuf,

        /// Show what the backup holds without importing
        #[arg(long)]
        preview: bool,
    },
}
