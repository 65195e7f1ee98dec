//! Database tests

use super::*;
use crate::models::*;
use crate::session::Session;
use crate::reconcile::MergeStats;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rusqlite::params;

    fn profile(db: &Database, name: &str) -> Session {
        let profile = db.create_profile(name, "1234").unwrap();
        Session::signed_in(profile.id)
    }

    fn account(db: &Database, session: &Session, number: &str, balance: f64) -> i64 {
        db.add_account(
            session,
            &NewAccount {
                bank_name: "BML".to_string(),
                account_number: number.to_string(),
                starting_balance: balance,
                ..NewAccount::default()
            },
        )
        .unwrap()
    }

    fn entry(kind: TransactionType, amount: f64, account_id: Option<i64>) -> NewTransaction {
        NewTransaction {
            account_id,
            transaction_type: kind,
            amount,
            ..NewTransaction::default()
        }
    }

    fn on(y: i32, m: u32, d: u32) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), crate::migrations::TARGET_VERSION);
        assert!(db.list_profiles().unwrap().is_empty());
    }

    #[test]
    fn test_reopen_keeps_version_and_data() {
        let db = Database::in_memory().unwrap();
        let path = db.path().to_string();
        let session = profile(&db, "Aisha");
        account(&db, &session, "1111", 10.0);
        drop(db);

        let db = Database::new_unencrypted(&path).unwrap();
        assert_eq!(db.schema_version().unwrap(), crate::migrations::TARGET_VERSION);
        assert_eq!(db.list_accounts(&session).unwrap().len(), 1);
    }

    // =========================================================================
    // Profiles and session
    // =========================================================================

    #[test]
    fn test_profile_names_unique_case_insensitively() {
        let db = Database::in_memory().unwrap();
        db.create_profile("Aisha", "1234").unwrap();

        let err = db.create_profile("  AISHA ", "9999").unwrap_err();
        assert!(matches!(err, Error::DuplicateProfile(_)));

        let other = profile(&db, "Hassan");
        assert!(matches!(
            db.rename_profile(&other, "aisha"),
            Err(Error::DuplicateProfile(_))
        ));
        // Renaming to a different case of your own name is fine
        db.rename_profile(&other, "HASSAN").unwrap();
        let renamed = db.get_profile(other.owner().unwrap()).unwrap().unwrap();
        assert_eq!(renamed.name, "HASSAN");
        assert_eq!(renamed.name_lower, "hassan");
    }

    #[test]
    fn test_profile_rejects_blank_name_and_pin() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(db.create_profile("  ", "1234"), Err(Error::InvalidData(_))));
        assert!(matches!(db.create_profile("Aisha", ""), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_pin_is_hashed() {
        let db = Database::in_memory().unwrap();
        let profile = db.create_profile("Aisha", "4321").unwrap();
        assert_ne!(profile.pin_hash, "4321");
        assert!(profile.pin_hash.starts_with("$argon2"));
    }

    #[test]
    fn test_login_and_session_persistence() {
        let db = Database::in_memory().unwrap();
        let id = db.create_profile("Aisha", "1234").unwrap().id;
        assert!(!db.session().unwrap().is_signed_in());

        assert!(matches!(db.login("aisha", "0000"), Err(Error::InvalidCredentials)));
        assert!(matches!(db.login("nobody", "1234"), Err(Error::InvalidCredentials)));

        let session = db.login("AISHA", "1234").unwrap();
        assert_eq!(session.owner(), Some(id));
        assert_eq!(db.current_user_id().unwrap(), Some(id));
        assert_eq!(db.session().unwrap(), session);
        assert!(db.get_profile(id).unwrap().unwrap().last_login_at.is_some());

        db.logout().unwrap();
        assert_eq!(db.current_user_id().unwrap(), None);
        assert!(!db.session().unwrap().is_signed_in());
    }

    #[test]
    fn test_stale_session_resolves_to_anonymous() {
        let db = Database::in_memory().unwrap();
        db.set_current_user_id(Some(42)).unwrap();
        assert_eq!(db.current_user_id().unwrap(), Some(42));
        assert_eq!(db.session().unwrap(), Session::anonymous());

        // Garbage in the session table is not an owner either
        let conn = db.conn().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO session (key, value) VALUES ('current_user_id', 'NaN')",
            [],
        )
        .unwrap();
        assert_eq!(db.current_user_id().unwrap(), None);
    }

    #[test]
    fn test_change_pin() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");

        assert!(matches!(
            db.change_pin(&session, "0000", "5555"),
            Err(Error::InvalidCredentials)
        ));
        db.change_pin(&session, "1234", "5555").unwrap();
        assert!(db.login("Aisha", "1234").is_err());
        assert!(db.login("Aisha", "5555").is_ok());
    }

    #[test]
    fn test_delete_profile_cascades_only_own_records() {
        let db = Database::in_memory().unwrap();
        let a = profile(&db, "Aisha");
        let b = profile(&db, "Hassan");

        for session in [&a, &b] {
            let acc = account(&db, session, "1111", 0.0);
            db.add_transaction(session, &entry(TransactionType::Debit, 5.0, Some(acc)))
                .unwrap();
            db.seed_default_categories(session).unwrap();
        }
        db.set_current_user_id(a.owner()).unwrap();

        db.delete_profile(&a).unwrap();

        assert!(db.get_profile(a.owner().unwrap()).unwrap().is_none());
        assert!(db.list_transactions(&a, &TransactionFilter::new()).unwrap().is_empty());
        assert!(db.list_accounts(&a).unwrap().is_empty());
        assert!(db.list_categories(&a).unwrap().is_empty());
        assert_eq!(db.current_user_id().unwrap(), None);

        assert_eq!(db.list_transactions(&b, &TransactionFilter::new()).unwrap().len(), 1);
        assert_eq!(db.list_accounts(&b).unwrap().len(), 1);
        assert_eq!(
            db.list_categories(&b).unwrap().len(),
            DEFAULT_CATEGORIES.len()
        );
    }

    #[test]
    fn test_first_profile_claims_orphans() {
        let db = Database::in_memory().unwrap();
        {
            let conn = db.conn().unwrap();
            let now = format_timestamp(&chrono::Utc::now());
            conn.execute(
                "INSERT INTO accounts (bank_name, account_number, created_at, updated_at)
                 VALUES ('MIB', '5566', ?1, ?1)",
                params![now],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO transactions (date, type, amount, account_number, created_at, updated_at)
                 VALUES (?1, 'credit', 20, ' 5566 ', ?1, ?1)",
                params![now],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO categories (name) VALUES ('Legacy')",
                [],
            )
            .unwrap();
        }

        let first = profile(&db, "Aisha");
        let accounts = db.list_accounts(&first).unwrap();
        assert_eq!(accounts.len(), 1);
        assert!(accounts[0].is_primary);

        let txs = db.list_transactions(&first, &TransactionFilter::new()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].account_id, Some(accounts[0].id));
        assert_eq!(db.list_categories(&first).unwrap().len(), 1);
        assert_eq!(db.calculate_account_balance(&first, accounts[0].id).unwrap(), 20.0);

        // Later profiles start empty
        let second = profile(&db, "Hassan");
        assert!(db.list_accounts(&second).unwrap().is_empty());
    }

    // =========================================================================
    // Accounts and balances
    // =========================================================================

    #[test]
    fn test_balance_derivation() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let acc = account(&db, &session, "1111", 1000.0);

        db.add_transaction(&session, &entry(TransactionType::Credit, 500.0, Some(acc)))
            .unwrap();
        db.add_transaction(&session, &entry(TransactionType::Debit, 200.0, Some(acc)))
            .unwrap();
        // Unlinked transactions do not count
        db.add_transaction(&session, &entry(TransactionType::Debit, 75.0, None))
            .unwrap();

        assert_eq!(db.calculate_account_balance(&session, acc).unwrap(), 1300.0);

        let with_balances = db.list_accounts_with_balances(&session).unwrap();
        assert_eq!(with_balances.len(), 1);
        assert_eq!(with_balances[0].current_balance, 1300.0);
        assert_eq!(with_balances[0].account.starting_balance, 1000.0);
    }

    #[test]
    fn test_balance_of_unknown_or_foreign_account_is_zero() {
        let db = Database::in_memory().unwrap();
        let a = profile(&db, "Aisha");
        let b = profile(&db, "Hassan");
        let acc = account(&db, &a, "1111", 50.0);

        assert_eq!(db.calculate_account_balance(&b, acc).unwrap(), 0.0);
        assert_eq!(db.calculate_account_balance(&a, 9999).unwrap(), 0.0);
        assert_eq!(db.calculate_account_balance(&Session::anonymous(), acc).unwrap(), 0.0);
    }

    #[test]
    fn test_primary_exclusivity() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");

        let a1 = account(&db, &session, "1111", 0.0);
        assert!(db.get_account(&session, a1).unwrap().unwrap().is_primary);

        let a2 = db
            .add_account(
                &session,
                &NewAccount {
                    bank_name: "MIB".to_string(),
                    account_number: "2222".to_string(),
                    is_primary: true,
                    ..NewAccount::default()
                },
            )
            .unwrap();

        let primaries: Vec<i64> = db
            .list_accounts(&session)
            .unwrap()
            .iter()
            .filter(|a| a.is_primary)
            .map(|a| a.id)
            .collect();
        assert_eq!(primaries, vec![a2]);

        db.set_primary_account(&session, a1).unwrap();
        assert_eq!(db.primary_account(&session).unwrap().unwrap().id, a1);
        assert!(!db.get_account(&session, a2).unwrap().unwrap().is_primary);
    }

    #[test]
    fn test_account_defaults_from_bank_style() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let acc = account(&db, &session, "7788", 0.0);

        let stored = db.get_account(&session, acc).unwrap().unwrap();
        assert_eq!(stored.nickname, "BML 7788");
        assert_eq!(stored.icon, bank_style("BML").icon);
        assert_eq!(stored.color, bank_style("BML").color);
        assert!(stored.is_active);
    }

    #[test]
    fn test_update_account_keeps_starting_balance() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let acc = account(&db, &session, "1111", 250.0);

        db.update_account(
            &session,
            acc,
            &AccountUpdate {
                nickname: Some("Savings".to_string()),
                ..AccountUpdate::default()
            },
        )
        .unwrap();

        let stored = db.get_account(&session, acc).unwrap().unwrap();
        assert_eq!(stored.nickname, "Savings");
        assert_eq!(stored.starting_balance, 250.0);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[test]
    fn test_account_deletion_guard() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let acc = account(&db, &session, "1111", 100.0);
        let tx = db
            .add_transaction(&session, &entry(TransactionType::Debit, 10.0, Some(acc)))
            .unwrap();

        let err = db.delete_account(&session, acc).unwrap_err();
        assert!(matches!(
            err,
            Error::AccountHasTransactions { account_id, count: 1 } if account_id == acc
        ));
        assert!(db.get_account(&session, acc).unwrap().is_some());
        assert!(db.get_transaction(&session, tx).unwrap().is_some());

        // Once unreferenced it goes, and a second delete is silent
        db.delete_transaction(&session, tx).unwrap();
        db.delete_account(&session, acc).unwrap();
        db.delete_account(&session, acc).unwrap();
        assert!(db.get_account(&session, acc).unwrap().is_none());
    }

    #[test]
    fn test_deleting_primary_promotes_oldest() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let a1 = account(&db, &session, "1111", 0.0);
        let a2 = account(&db, &session, "2222", 0.0);
        let a3 = account(&db, &session, "3333", 0.0);
        db.set_primary_account(&session, a3).unwrap();

        db.delete_account(&session, a3).unwrap();
        assert_eq!(db.primary_account(&session).unwrap().unwrap().id, a1);
        assert!(!db.get_account(&session, a2).unwrap().unwrap().is_primary);
    }

    #[test]
    fn test_delete_foreign_account_is_silent() {
        let db = Database::in_memory().unwrap();
        let a = profile(&db, "Aisha");
        let b = profile(&db, "Hassan");
        let acc = account(&db, &a, "1111", 0.0);
        db.add_transaction(&a, &entry(TransactionType::Debit, 1.0, Some(acc)))
            .unwrap();

        db.delete_account(&b, acc).unwrap();
        assert!(db.get_account(&a, acc).unwrap().is_some());
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    #[test]
    fn test_ownership_isolation() {
        let db = Database::in_memory().unwrap();
        let x = profile(&db, "Aisha");
        let y = profile(&db, "Hassan");
        let id = db
            .add_transaction(&y, &entry(TransactionType::Debit, 30.0, None))
            .unwrap();

        let patch = TransactionUpdate {
            amount: Some(1.0),
            ..TransactionUpdate::default()
        };
        assert!(matches!(
            db.update_transaction(&x, id, &patch),
            Err(Error::NotFound(_))
        ));
        assert!(db.get_transaction(&x, id).unwrap().is_none());
        assert_eq!(db.get_transaction(&y, id).unwrap().unwrap().amount, 30.0);

        // Foreign delete is silent and leaves the record alone
        db.delete_transaction(&x, id).unwrap();
        assert!(db.get_transaction(&y, id).unwrap().is_some());
    }

    #[test]
    fn test_cannot_link_foreign_account() {
        let db = Database::in_memory().unwrap();
        let x = profile(&db, "Aisha");
        let y = profile(&db, "Hassan");
        let foreign = account(&db, &y, "9999", 0.0);

        assert!(matches!(
            db.add_transaction(&x, &entry(TransactionType::Debit, 5.0, Some(foreign))),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_idempotence() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let id = db
            .add_transaction(&session, &entry(TransactionType::Debit, 3.0, None))
            .unwrap();

        db.delete_transaction(&session, id).unwrap();
        db.delete_transaction(&session, id).unwrap();
        db.delete_transaction(&session, 123_456).unwrap();
        assert!(db.get_transaction(&session, id).unwrap().is_none());
    }

    #[test]
    fn test_signed_out_reads_are_empty_and_writes_fail() {
        let db = Database::in_memory().unwrap();
        let anon = Session::anonymous();

        assert!(db.list_transactions(&anon, &TransactionFilter::new()).unwrap().is_empty());
        assert!(db.list_accounts(&anon).unwrap().is_empty());
        assert!(db.list_categories(&anon).unwrap().is_empty());
        assert_eq!(db.count_transactions(&anon, &TransactionFilter::new()).unwrap(), 0);

        assert!(matches!(
            db.add_transaction(&anon, &entry(TransactionType::Debit, 1.0, None)),
            Err(Error::NotSignedIn)
        ));
        assert!(matches!(
            db.add_account(&anon, &NewAccount::default()),
            Err(Error::NotSignedIn)
        ));
        assert!(matches!(db.delete_transaction(&anon, 1), Err(Error::NotSignedIn)));
        assert!(matches!(db.seed_default_categories(&anon), Err(Error::NotSignedIn)));
    }

    #[test]
    fn test_split_sum_invariant() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let split = |category: &str, amount: f64| Split {
            category: category.to_string(),
            amount,
            note: None,
        };

        let valid = NewTransaction {
            amount: 100.0,
            splits: Some(vec![split("Food", 60.0), split("Bills", 40.0)]),
            ..NewTransaction::default()
        };
        let id = db.add_transaction(&session, &valid).unwrap();
        let stored = db.get_transaction(&session, id).unwrap().unwrap();
        assert_eq!(stored.splits.as_ref().map(Vec::len), Some(2));

        let invalid = NewTransaction {
            amount: 100.0,
            splits: Some(vec![split("Food", 60.0), split("Bills", 30.0)]),
            ..NewTransaction::default()
        };
        assert!(matches!(
            db.add_transaction(&session, &invalid),
            Err(Error::InvalidData(_))
        ));

        // Changing the amount without the splits is caught on update too
        assert!(matches!(
            db.update_transaction(
                &session,
                id,
                &TransactionUpdate {
                    amount: Some(90.0),
                    ..TransactionUpdate::default()
                }
            ),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        assert!(matches!(
            db.add_transaction(&session, &entry(TransactionType::Debit, -5.0, None)),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_update_transaction_refreshes_updated_at() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let id = db
            .add_transaction(&session, &entry(TransactionType::Debit, 10.0, None))
            .unwrap();
        let before = db.get_transaction(&session, id).unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        db.update_transaction(
            &session,
            id,
            &TransactionUpdate {
                category: Some("Food".to_string()),
                transaction_type: Some(TransactionType::Credit),
                ..TransactionUpdate::default()
            },
        )
        .unwrap();

        let after = db.get_transaction(&session, id).unwrap().unwrap();
        assert_eq!(after.category, "Food");
        assert_eq!(after.transaction_type, TransactionType::Credit);
        assert_eq!(after.amount, 10.0);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_list_transactions_sorted_and_filtered() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let add = |date, kind, category: &str, bank: &str| {
            db.add_transaction(
                &session,
                &NewTransaction {
                    date,
                    transaction_type: kind,
                    amount: 10.0,
                    category: category.to_string(),
                    bank: bank.to_string(),
                    ..NewTransaction::default()
                },
            )
            .unwrap()
        };
        let jan = add(on(2024, 1, 5), TransactionType::Debit, "Food", "BML");
        let feb = add(on(2024, 2, 10), TransactionType::Credit, "Salary", "MIB");
        let mar = add(on(2024, 3, 15), TransactionType::Debit, "Food", "MIB");

        let all = db.list_transactions(&session, &TransactionFilter::new()).unwrap();
        let ids: Vec<i64> = all.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![mar, feb, jan]);

        let food = db
            .list_transactions(&session, &TransactionFilter::new().category(Some("Food")))
            .unwrap();
        assert_eq!(food.len(), 2);

        let food_at_mib = TransactionFilter::new()
            .category(Some("Food"))
            .bank(Some("MIB"));
        let rows = db.list_transactions(&session, &food_at_mib).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, mar);

        let credits = TransactionFilter::new().transaction_type(Some(TransactionType::Credit));
        assert_eq!(db.count_transactions(&session, &credits).unwrap(), 1);

        // Date range is inclusive on both ends
        let range = TransactionFilter::new().date_range(Some((
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
        )));
        let rows = db.list_transactions(&session, &range).unwrap();
        assert_eq!(rows.iter().map(|t| t.id).collect::<Vec<_>>(), vec![feb, jan]);

        let limited = TransactionFilter::new().limit(Some(1));
        assert_eq!(db.list_transactions(&session, &limited).unwrap().len(), 1);
        assert_eq!(db.count_transactions(&session, &limited).unwrap(), 3);
    }

    // =========================================================================
    // Categories
    // =========================================================================

    #[test]
    fn test_seed_default_categories_once() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");

        assert_eq!(
            db.seed_default_categories(&session).unwrap(),
            DEFAULT_CATEGORIES.len()
        );
        assert_eq!(db.seed_default_categories(&session).unwrap(), 0);
        assert_eq!(
            db.list_categories(&session).unwrap().len(),
            DEFAULT_CATEGORIES.len()
        );
    }

    #[test]
    fn test_seed_skipped_when_profile_has_categories() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        db.add_category(
            &session,
            &NewCategory {
                name: "Rent".to_string(),
                ..NewCategory::default()
            },
        )
        .unwrap();
        assert_eq!(db.seed_default_categories(&session).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_category_names_allowed() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let food = NewCategory {
            name: "Food".to_string(),
            ..NewCategory::default()
        };
        db.add_category(&session, &food).unwrap();
        db.add_category(&session, &food).unwrap();
        assert_eq!(db.list_categories(&session).unwrap().len(), 2);
    }

    #[test]
    fn test_update_and_delete_category() {
        let db = Database::in_memory().unwrap();
        let a = profile(&db, "Aisha");
        let b = profile(&db, "Hassan");
        let id = db
            .add_category(
                &a,
                &NewCategory {
                    name: "Food".to_string(),
                    ..NewCategory::default()
                },
            )
            .unwrap();

        let patch = CategoryUpdate {
            budget: Some(500.0),
            ..CategoryUpdate::default()
        };
        assert!(matches!(
            db.update_category(&b, id, &patch),
            Err(Error::NotFound(_))
        ));
        db.update_category(&a, id, &patch).unwrap();
        assert_eq!(db.get_category(&a, id).unwrap().unwrap().budget, 500.0);

        db.delete_category(&b, id).unwrap();
        assert!(db.get_category(&a, id).unwrap().is_some());
        db.delete_category(&a, id).unwrap();
        db.delete_category(&a, id).unwrap();
        assert!(db.get_category(&a, id).unwrap().is_none());
    }

    // =========================================================================
    // Imports
    // =========================================================================

    const CSV: &str = "Date,Type,Amount,Category\n\
                       2024-01-05,debit,150.00,Food\n\
                       2024-01-06,credit,abc,Salary\n";

    #[test]
    fn test_csv_row_robustness() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let acc = account(&db, &session, "1111", 0.0);

        let result = db.import_csv(&session, Some(CSV), None).unwrap();
        assert_eq!(result.parsed, 1);
        assert_eq!(result.imported, 1);

        let txs = db.list_transactions(&session, &TransactionFilter::new()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, 150.0);
        assert_eq!(txs[0].source, TransactionSource::Csv);
        // Lands in the primary account with its bank details
        assert_eq!(txs[0].account_id, Some(acc));
        assert_eq!(txs[0].bank, "BML");
        assert_eq!(txs[0].account_number, "1111");
    }

    #[test]
    fn test_csv_reimport_skips_duplicates() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");

        let text = "Date,Type,Amount\n2024-01-05,debit,10\n2024-01-05,debit,10\n2024-01-07,credit,99\n";
        let first = db.import_csv(&session, Some(text), None).unwrap();
        assert_eq!((first.parsed, first.imported, first.duplicates), (3, 2, 1));

        let second = db.import_csv(&session, Some(text), None).unwrap();
        assert_eq!((second.imported, second.duplicates), (0, 3));
    }

    #[test]
    fn test_csv_import_into_explicit_account() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        account(&db, &session, "1111", 0.0);
        let other = account(&db, &session, "2222", 0.0);

        db.import_csv(&session, Some(CSV), Some(other)).unwrap();
        assert_eq!(db.calculate_account_balance(&session, other).unwrap(), -150.0);

        assert!(matches!(
            db.import_csv(&session, Some(CSV), Some(424_242)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_import_precondition_order() {
        let db = Database::in_memory().unwrap();
        let anon = Session::anonymous();

        assert!(matches!(db.import_csv(&anon, None, None), Err(Error::NoFileSelected)));
        assert!(matches!(db.import_csv(&anon, Some(CSV), None), Err(Error::NotSignedIn)));
        assert!(matches!(db.import_backup(&anon, None), Err(Error::NoFileSelected)));
        assert!(matches!(db.import_backup(&anon, Some("{}")), Err(Error::NotSignedIn)));

        let session = profile(&db, "Aisha");
        assert!(matches!(
            db.import_csv(&session, Some("Date,Type,Amount\n"), None),
            Err(Error::InvalidFile)
        ));
        assert!(matches!(
            db.import_backup(&session, Some("not json")),
            Err(Error::InvalidBackupFormat(_))
        ));
        assert!(matches!(
            db.import_backup(&session, Some(r#"{"tables": []}"#)),
            Err(Error::InvalidBackupFormat(_))
        ));
    }

    fn backup_json() -> String {
        serde_json::json!({
            "exportedAt": "2024-03-01T10:00:00.000Z",
            "dbName": "old-phone",
            "version": 3,
            "tables": {
                "accounts": [
                    {"id": 7, "bankName": "BML", "accountNumber": "1111", "startingBalance": 500},
                    {"id": 8, "bankName": "MIB", "accountNumber": " 2222 "},
                    {"id": 9, "bankName": "Cash"}
                ],
                "categories": [
                    {"name": "Food", "type": "expense"},
                    {"name": "food", "type": "EXPENSE"},
                    {"name": "Salary", "type": "income"}
                ],
                "transactions": [
                    {"id": 1, "date": "2024-02-01T08:30:00.000Z", "type": "debit", "amount": 25.5,
                     "category": "Food", "merchant": "Cafe", "accountNumber": "1111", "accountId": 7},
                    {"id": 2, "date": "2024-02-01T08:30:00.000Z", "type": "debit", "amount": "25.50",
                     "category": "food ", "merchant": "CAFE", "accountNumber": "1111", "accountId": 7},
                    {"id": 3, "date": "2024-02-03T09:00:00.000Z", "type": "credit", "amount": 1000,
                     "category": "Salary", "accountNumber": "2222", "accountId": 8},
                    {"id": 4, "date": "2024-02-04T09:00:00.000Z", "type": "debit", "amount": 5,
                     "accountId": 99}
                ],
                "users": [{"id": 1, "name": "Old"}]
            }
        })
        .to_string()
    }

    #[test]
    fn test_backup_import_dedupe_idempotence() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let text = backup_json();

        let first = db.import_backup(&session, Some(&text)).unwrap();
        assert_eq!(first.transactions, 3);
        assert_eq!(first.categories, 2);
        assert_eq!(first.accounts, 2);

        let second = db.import_backup(&session, Some(&text)).unwrap();
        assert_eq!(second, MergeStats::default());
        assert_eq!(
            db.list_transactions(&session, &TransactionFilter::new()).unwrap().len(),
            3
        );
    }

    #[test]
    fn test_backup_dateless_transactions_are_skipped() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let text = serde_json::json!({
            "tables": {
                "transactions": [
                    {"type": "debit", "amount": 5, "category": "Food"},
                    {"date": "sometime", "type": "debit", "amount": 6, "category": "Food"},
                    {"date": "2024-02-01T08:30:00.000Z", "type": "debit", "amount": 7}
                ]
            }
        })
        .to_string();

        assert_eq!(db.import_backup(&session, Some(&text)).unwrap().transactions, 1);
        assert_eq!(db.import_backup(&session, Some(&text)).unwrap().transactions, 0);

        let txs = db.list_transactions(&session, &TransactionFilter::new()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, 7.0);
    }

    fn reject_inserts_of(db: &Database, amount: f64) {
        db.conn()
            .unwrap()
            .execute_batch(&format!(
                "CREATE TRIGGER reject_amount BEFORE INSERT ON transactions \
                 WHEN NEW.amount = {} BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                amount
            ))
            .unwrap();
    }

    #[test]
    fn test_failed_backup_merge_commits_nothing() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        // Accounts, categories and the first transaction are staged before this fails
        reject_inserts_of(&db, 1000.0);

        assert!(db.import_backup(&session, Some(&backup_json())).is_err());
        assert!(db.list_accounts(&session).unwrap().is_empty());
        assert!(db.list_categories(&session).unwrap().is_empty());
        assert_eq!(
            db.count_transactions(&session, &TransactionFilter::new()).unwrap(),
            0
        );

        db.conn()
            .unwrap()
            .execute_batch("DROP TRIGGER reject_amount;")
            .unwrap();
        let stats = db.import_backup(&session, Some(&backup_json())).unwrap();
        assert_eq!((stats.transactions, stats.categories, stats.accounts), (3, 2, 2));
    }

    #[test]
    fn test_failed_csv_import_commits_nothing() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        reject_inserts_of(&db, 99.0);

        let text = "Date,Type,Amount\n2024-01-05,debit,10\n2024-01-07,credit,99\n2024-01-08,debit,20\n";
        assert!(db.import_csv(&session, Some(text), None).is_err());
        assert_eq!(
            db.count_transactions(&session, &TransactionFilter::new()).unwrap(),
            0
        );
    }

    #[test]
    fn test_backup_import_remaps_accounts() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        // Existing account with the same number absorbs the incoming one
        let existing = account(&db, &session, "1111", 100.0);

        let stats = db.import_backup(&session, Some(&backup_json())).unwrap();
        assert_eq!(stats.accounts, 1);

        let accounts = db.list_accounts(&session).unwrap();
        assert_eq!(accounts.len(), 2);
        let mib = accounts.iter().find(|a| a.account_number == "2222").unwrap();
        assert!(!mib.is_primary);
        assert_eq!(db.primary_account(&session).unwrap().unwrap().id, existing);

        assert_eq!(db.calculate_account_balance(&session, existing).unwrap(), 74.5);
        assert_eq!(db.calculate_account_balance(&session, mib.id).unwrap(), 1000.0);

        let txs = db.list_transactions(&session, &TransactionFilter::new()).unwrap();
        let unlinked = txs.iter().find(|t| t.amount == 5.0).unwrap();
        assert_eq!(unlinked.account_id, None);
        assert!(txs.iter().all(|t| t.user_id == session.owner().unwrap()));
    }

    #[test]
    fn test_backup_import_first_account_becomes_primary() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        db.import_backup(&session, Some(&backup_json())).unwrap();

        let primaries: Vec<Account> = db
            .list_accounts(&session)
            .unwrap()
            .into_iter()
            .filter(|a| a.is_primary)
            .collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].account_number, "1111");
    }

    #[test]
    fn test_backup_import_is_per_owner() {
        let db = Database::in_memory().unwrap();
        let a = profile(&db, "Aisha");
        let b = profile(&db, "Hassan");
        let text = backup_json();

        assert_eq!(db.import_backup(&a, Some(&text)).unwrap().transactions, 3);
        // Another owner's copies do not count as duplicates
        assert_eq!(db.import_backup(&b, Some(&text)).unwrap().transactions, 3);
    }

    #[test]
    fn test_preview_writes_nothing() {
        let db = Database::in_memory().unwrap();
        let session = profile(&db, "Aisha");
        let text = backup_json();

        let preview = crate::reconcile::preview_backup(&text).unwrap();
        assert_eq!(preview.db_name.as_deref(), Some("old-phone"));
        assert_eq!(preview.counts.get("transactions"), Some(&4));
        assert_eq!(preview.counts.get("users"), Some(&1));

        assert!(db.list_transactions(&session, &TransactionFilter::new()).unwrap().is_empty());
        assert!(db.list_accounts(&session).unwrap().is_empty());
        assert!(db.list_categories(&session).unwrap().is_empty());
    }
}
