//! Tally CLI - Local personal finance tracker
//!
//! Usage:
//!   tally init                          Create the database
//!   tally profile create NAME --pin P   Create a profile
//!   tally profile login NAME --pin P    Sign in
//!   tally import csv --file CSV         Import a statement
//!   tally balance                       Show account balances

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use tally_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = Config::load(cli.db.clone(), cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Init => commands::cmd_init(&config.database_path, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&config, cli.no_encrypt),
        Commands::Profile { action } => {
            let db = commands::open_db(&config.database_path, cli.no_encrypt)?;
            match action {
                ProfileAction::Create { name, pin } => commands::cmd_profile_create(&db, &name, &pin),
                ProfileAction::List => commands::cmd_profile_list(&db),
                ProfileAction::Login { name, pin } => commands::cmd_profile_login(&db, &name, &pin),
                ProfileAction::Logout => commands::cmd_profile_logout(&db),
                ProfileAction::Rename { name } => commands::cmd_profile_rename(&db, &name),
                ProfileAction::SetPin { old, new } => commands::cmd_profile_set_pin(&db, &old, &new),
                ProfileAction::Delete { yes } => commands::cmd_profile_delete(&db, yes),
            }
        }
        Commands::Accounts { action } => {
            let db = commands::open_db(&config.database_path, cli.no_encrypt)?;
            let session = db.session()?;
            match action {
                None | Some(AccountsAction::List) => {
                    commands::cmd_accounts_list(&db, &session, &config.default_currency)
                }
                Some(AccountsAction::Add {
                    bank,
                    number,
                    nickname,
                    starting_balance,
                    primary,
                }) => commands::cmd_accounts_add(
                    &db,
                    &session,
                    &bank,
                    &number,
                    nickname,
                    starting_balance,
                    primary,
                ),
                Some(AccountsAction::SetPrimary { id }) => {
                    commands::cmd_accounts_set_primary(&db, &session, id)
                }
                Some(AccountsAction::Delete { id }) => commands::cmd_accounts_delete(&db, &session, id),
            }
        }
        Commands::Categories { action } => {
            let db = commands::open_db(&config.database_path, cli.no_encrypt)?;
            let session = db.session()?;
            match action {
                None | Some(CategoriesAction::List) => commands::cmd_categories_list(&db, &session),
                Some(CategoriesAction::Add {
                    name,
                    category_type,
                    budget,
                    icon,
                }) => commands::cmd_categories_add(
                    &db,
                    &session,
                    &name,
                    &category_type,
                    budget,
                    icon.as_deref(),
                ),
                Some(CategoriesAction::Delete { id }) => {
                    commands::cmd_categories_delete(&db, &session, id)
                }
                Some(CategoriesAction::Seed) => commands::cmd_categories_seed(&db, &session),
            }
        }
        Commands::Transactions { action } => {
            let db = commands::open_db(&config.database_path, cli.no_encrypt)?;
            let session = db.session()?;
            match action {
                None => commands::cmd_transactions_list(
                    &db,
                    &session,
                    &commands::ListOptions::default(),
                    &config.default_currency,
                ),
                Some(TransactionsAction::List {
                    limit,
                    from,
                    to,
                    transaction_type,
                    category,
                    bank,
                    account,
                }) => commands::cmd_transactions_list(
                    &db,
                    &session,
                    &commands::ListOptions {
                        limit,
                        from,
                        to,
                        transaction_type,
                        category,
                        bank,
                        account,
                    },
                    &config.default_currency,
                ),
                Some(TransactionsAction::Add {
                    amount,
                    transaction_type,
                    category,
                    merchant,
                    description,
                    date,
                    account,
                }) => commands::cmd_transactions_add(
                    &db,
                    &session,
                    commands::NewEntry {
                        amount,
                        transaction_type,
                        category,
                        merchant,
                        description,
                        date,
                        account,
                    },
                ),
                Some(TransactionsAction::Delete { id }) => {
                    commands::cmd_transactions_delete(&db, &session, id)
                }
            }
        }
        Commands::Balance { account } => {
            let db = commands::open_db(&config.database_path, cli.no_encrypt)?;
            let session = db.session()?;
            commands::cmd_balance(&db, &session, account, &config.default_currency)
        }
        Commands::Import { action } => {
            let db = commands::open_db(&config.database_path, cli.no_encrypt)?;
            let session = db.session()?;
            match action {
                ImportAction::Csv { file, account } => {
                    commands::cmd_import_csv(&db, &session, &file, account)
                }
                ImportAction::Backup { file, preview } => {
                    if preview {
                        commands::cmd_import_backup_preview(&file)
                    } else {
                        commands::cmd_import_backup(&db, &session, &file)
                    }
                }
            }
        }
        Commands::Export { dump, csv, out } => {
            let db = commands::open_db(&config.database_path, cli.no_encrypt)?;
            let session = db.session()?;
            let format = if dump {
                commands::ExportKind::Dump
            } else if csv {
                commands::ExportKind::Csv
            } else {
                commands::ExportKind::Profile
            };
            commands::cmd_export(&db, &session, format, out.as_deref(), &config.export_dir)
                .map(|_| ())
        }
    }
}
