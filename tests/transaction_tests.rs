/// Transaction tests
///
/// Snapshot isolation, rollback and write conflicts of store transactions.
/// Run with: cargo test --test transaction_tests
use rust_decimal::Decimal;
use wsvdb::core::{DbError, Value};
use wsvdb::executor::{Assignment, Filter, Statement};
use wsvdb::transaction::TransactionState;
use wsvdb::wsv::{
    Account, AccountAsset, Asset, Domain, PublicKey, StoreWsvCommand, WsvCommand, WsvError,
    schema,
};
use wsvdb::WorldStateDb;

fn insert_role(name: &str) -> Statement {
    Statement::insert(schema::ROLE, &["role_id"], vec![Value::from(name)])
}

fn select_roles() -> Statement {
    Statement::select(schema::ROLE, &["role_id"], Filter::new())
}

fn committed_roles(db: &WorldStateDb) -> usize {
    db.dump_table(schema::ROLE).unwrap().row_count()
}

#[test]
fn test_transaction_begin_commit() {
    let db = WorldStateDb::in_memory().unwrap();

    let mut tx = db.begin().unwrap();
    assert_eq!(tx.state(), TransactionState::Active);
    tx.execute(&insert_role("admin")).unwrap();
    tx.execute(&insert_role("user")).unwrap();
    tx.commit().unwrap();

    assert_eq!(committed_roles(&db), 2);
    assert_eq!(db.transaction_stats().committed, 1);
}

#[test]
fn test_transaction_begin_rollback() {
    let db = WorldStateDb::in_memory().unwrap();

    let mut tx = db.begin().unwrap();
    tx.execute(&insert_role("admin")).unwrap();
    tx.rollback().unwrap();

    assert_eq!(committed_roles(&db), 0);
    assert_eq!(db.transaction_stats().aborted, 1);
}

#[test]
fn test_transaction_auto_rollback_on_drop() {
    let db = WorldStateDb::in_memory().unwrap();

    {
        let mut tx = db.begin().unwrap();
        tx.execute(&insert_role("admin")).unwrap();
        // dropped without commit
    }

    assert_eq!(committed_roles(&db), 0);
    // the key is free again
    db.query(&insert_role("admin")).unwrap();
    assert_eq!(committed_roles(&db), 1);
}

#[test]
fn test_rollback_restores_updated_and_deleted_rows() {
    let db = WorldStateDb::in_memory().unwrap();
    db.query(&insert_role("user")).unwrap();
    db.query(&Statement::insert(
        schema::DOMAIN,
        &["domain_id", "default_role"],
        vec![Value::from("test"), Value::from("user")],
    ))
    .unwrap();
    db.query(&insert_role("auditor")).unwrap();

    let mut tx = db.begin().unwrap();
    tx.execute(&Statement::update(
        schema::DOMAIN,
        vec![Assignment::set("default_role", "auditor")],
        Filter::new().eq("domain_id", "test"),
    ))
    .unwrap();
    tx.execute(&Statement::update(
        schema::DOMAIN,
        vec![Assignment::set("default_role", "user")],
        Filter::new().eq("domain_id", "test"),
    ))
    .unwrap();
    tx.execute(&Statement::delete(
        schema::ROLE,
        Filter::new().eq("role_id", "auditor"),
    ))
    .unwrap();
    tx.rollback().unwrap();

    let domains = db.dump_table(schema::DOMAIN).unwrap();
    assert_eq!(
        domains.rows,
        vec![vec![Value::from("test"), Value::from("user")]]
    );
    assert_eq!(committed_roles(&db), 2);
}

#[test]
fn test_uncommitted_writes_are_invisible_to_others() {
    let db = WorldStateDb::in_memory().unwrap();

    let mut writer = db.begin().unwrap();
    let mut reader = db.begin().unwrap();
    writer.execute(&insert_role("admin")).unwrap();

    assert_eq!(writer.execute(&select_roles()).unwrap().row_count(), 1);
    assert_eq!(reader.execute(&select_roles()).unwrap().row_count(), 0);
    assert_eq!(committed_roles(&db), 0);

    writer.commit().unwrap();

    // the reader keeps the snapshot it started with
    assert_eq!(reader.execute(&select_roles()).unwrap().row_count(), 0);
    reader.commit().unwrap();

    let mut late = db.begin().unwrap();
    assert_eq!(late.execute(&select_roles()).unwrap().row_count(), 1);
}

#[test]
fn test_concurrent_insert_of_same_key_conflicts() {
    let db = WorldStateDb::in_memory().unwrap();

    let mut first = db.begin().unwrap();
    let mut second = db.begin().unwrap();
    first.execute(&insert_role("admin")).unwrap();

    let err = second.execute(&insert_role("admin")).unwrap_err();
    assert!(matches!(err, DbError::WriteConflict(_)), "{:?}", err);

    first.commit().unwrap();
    let err = second.execute(&insert_role("admin")).unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }), "{:?}", err);
}

#[test]
fn test_concurrent_update_of_same_row_conflicts() {
    let db = WorldStateDb::in_memory().unwrap();
    db.query(&insert_role("user")).unwrap();
    db.query(&Statement::insert(
        schema::DOMAIN,
        &["domain_id", "default_role"],
        vec![Value::from("test"), Value::from("user")],
    ))
    .unwrap();
    db.query(&insert_role("admin")).unwrap();

    let set_role = |role: &str| {
        Statement::update(
            schema::DOMAIN,
            vec![Assignment::set("default_role", role)],
            Filter::new().eq("domain_id", "test"),
        )
    };

    let mut first = db.begin().unwrap();
    let mut second = db.begin().unwrap();
    assert_eq!(first.execute(&set_role("admin")).unwrap().affected_rows, 1);

    let err = second.execute(&set_role("user")).unwrap_err();
    assert!(matches!(err, DbError::WriteConflict(_)), "{:?}", err);

    first.commit().unwrap();
    let domains = db.dump_table(schema::DOMAIN).unwrap();
    assert_eq!(domains.rows[0][1], Value::from("admin"));
}

#[test]
fn test_failed_statement_is_atomic() {
    let db = WorldStateDb::in_memory().unwrap();
    db.query(&insert_role("b")).unwrap();

    let mut tx = db.begin().unwrap();
    let err = tx
        .execute(&Statement::insert_many(
            schema::ROLE,
            &["role_id"],
            vec![vec![Value::from("a")], vec![Value::from("b")]],
        ))
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));

    // "a" was reverted with the statement, the transaction goes on
    tx.execute(&insert_role("a")).unwrap();
    tx.commit().unwrap();
    assert_eq!(committed_roles(&db), 2);
}

#[test]
fn test_delete_of_referenced_row_is_restricted() {
    let db = WorldStateDb::in_memory().unwrap();
    db.query(&insert_role("user")).unwrap();
    db.query(&Statement::insert(
        schema::DOMAIN,
        &["domain_id", "default_role"],
        vec![Value::from("test"), Value::from("user")],
    ))
    .unwrap();

    let err = db
        .query(&Statement::delete(
            schema::ROLE,
            Filter::new().eq("role_id", "user"),
        ))
        .unwrap_err();
    assert!(matches!(err, DbError::RowReferenced { .. }), "{:?}", err);

    let skipped = db
        .query(&Statement::delete_unreferenced(
            schema::ROLE,
            Filter::new().eq("role_id", "user"),
        ))
        .unwrap();
    assert_eq!(skipped.affected_rows, 0);
    assert_eq!(committed_roles(&db), 1);
}

#[test]
fn test_parallel_transactions_on_distinct_keys() {
    let db = WorldStateDb::in_memory().unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let db = &db;
            scope.spawn(move || {
                for n in 0..25 {
                    let mut tx = db.begin().unwrap();
                    tx.execute(&insert_role(&format!("role_{}_{}", worker, n)))
                        .unwrap();
                    tx.commit().unwrap();
                }
            });
        }
    });

    assert_eq!(committed_roles(&db), 100);
    assert_eq!(db.transaction_stats().committed, 100);
}

/// Role `user`, domain `test`, account `alice@test`, asset `coin#test` and
/// an unattached signatory 0x09.
fn seeded_wsv(wsv: &StoreWsvCommand) -> WorldStateDb {
    let db = WorldStateDb::in_memory().unwrap();
    let mut tx = db.begin().unwrap();
    wsv.insert_role(&mut tx, "user").unwrap();
    wsv.insert_domain(
        &mut tx,
        &Domain {
            domain_id: "test".into(),
            default_role: "user".into(),
        },
    )
    .unwrap();
    wsv.insert_account(&mut tx, &Account::new("alice@test", "test", 1))
        .unwrap();
    wsv.insert_asset(
        &mut tx,
        &Asset {
            asset_id: "coin#test".into(),
            domain_id: "test".into(),
            precision: 2,
        },
    )
    .unwrap();
    wsv.insert_signatory(&mut tx, &PublicKey::new(vec![9; 32]))
        .unwrap();
    tx.commit().unwrap();
    db
}

#[test]
fn test_delete_of_key_attached_by_concurrent_transaction_conflicts() {
    let wsv = StoreWsvCommand::new();
    let db = seeded_wsv(&wsv);
    let key = PublicKey::new(vec![9; 32]);
    let alice = "alice@test".to_string();

    let mut attach = db.begin().unwrap();
    let mut remove = db.begin().unwrap();
    wsv.insert_account_signatory(&mut attach, &alice, &key)
        .unwrap();

    let err = wsv.delete_signatory(&mut remove, &key).unwrap_err();
    assert!(matches!(err, WsvError::BackendUnavailable { .. }), "{:?}", err);
    assert!(err.is_retryable());
    remove.rollback().unwrap();

    attach.commit().unwrap();
    assert_eq!(db.dump_table(schema::SIGNATORY).unwrap().row_count(), 1);
    assert_eq!(
        db.dump_table(schema::ACCOUNT_HAS_SIGNATORY)
            .unwrap()
            .row_count(),
        1
    );
}

#[test]
fn test_attach_of_key_deleted_by_concurrent_transaction_conflicts() {
    let wsv = StoreWsvCommand::new();
    let db = seeded_wsv(&wsv);
    let key = PublicKey::new(vec![9; 32]);
    let alice = "alice@test".to_string();

    let mut attach = db.begin().unwrap();
    let mut remove = db.begin().unwrap();
    wsv.delete_signatory(&mut remove, &key).unwrap();

    let err = wsv
        .insert_account_signatory(&mut attach, &alice, &key)
        .unwrap_err();
    assert!(matches!(err, WsvError::BackendUnavailable { .. }), "{:?}", err);

    // the rejected link was reverted with its statement
    let own = attach
        .execute(&Statement::select(
            schema::ACCOUNT_HAS_SIGNATORY,
            &["account_id"],
            Filter::new(),
        ))
        .unwrap();
    assert_eq!(own.row_count(), 0);
    attach.commit().unwrap();

    remove.commit().unwrap();
    assert_eq!(db.dump_table(schema::SIGNATORY).unwrap().row_count(), 0);
    assert_eq!(
        db.dump_table(schema::ACCOUNT_HAS_SIGNATORY)
            .unwrap()
            .row_count(),
        0
    );
}

#[test]
fn test_reference_to_row_with_concurrent_non_key_update_is_accepted() {
    let wsv = StoreWsvCommand::new();
    let db = seeded_wsv(&wsv);
    db.query(&Statement::insert(
        schema::ROLE,
        &["role_id"],
        vec![Value::from("admin")],
    ))
    .unwrap();

    let mut updater = db.begin().unwrap();
    let mut linker = db.begin().unwrap();
    updater
        .execute(&Statement::update(
            schema::ACCOUNT,
            vec![Assignment::set("quorum", 2i64)],
            Filter::new().eq("account_id", "alice@test"),
        ))
        .unwrap();

    wsv.insert_account_role(&mut linker, "alice@test", "admin")
        .unwrap();
    linker.commit().unwrap();
    updater.commit().unwrap();

    assert_eq!(db.dump_table(schema::ACCOUNT_HAS_ROLES).unwrap().row_count(), 1);
}

#[test]
fn test_concurrent_upsert_of_same_balance_conflicts() {
    let wsv = StoreWsvCommand::new();
    let db = seeded_wsv(&wsv);
    let balance = |amount: i64| AccountAsset {
        account_id: "alice@test".into(),
        asset_id: "coin#test".into(),
        balance: Decimal::from(amount),
    };

    let mut first = db.begin().unwrap();
    let mut second = db.begin().unwrap();
    wsv.upsert_account_asset(&mut first, &balance(10)).unwrap();

    let err = wsv
        .upsert_account_asset(&mut second, &balance(15))
        .unwrap_err();
    assert!(matches!(err, WsvError::BackendUnavailable { .. }), "{:?}", err);
    assert!(err.is_retryable());
    second.rollback().unwrap();

    first.commit().unwrap();
    let balances = db.dump_table(schema::ACCOUNT_HAS_ASSET).unwrap();
    assert_eq!(balances.row_count(), 1);
    assert_eq!(balances.rows[0][2], Value::Decimal(Decimal::from(10)));
}
