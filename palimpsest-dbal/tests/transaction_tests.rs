//! Nested transaction behaviour against in-memory SQLite.

use palimpsest_dbal::{record, transaction, DatabaseConnection, DbalError, TransactionState};
use palimpsest_test_utils::*;

fn plain() -> Connection {
    let mut conn = memory_connection();
    create_plain_table(&mut conn, "tx_test");
    conn
}

fn foos<C: DatabaseConnection + ?Sized>(conn: &mut C) -> Vec<i64> {
    let mut values: Vec<i64> = conn
        .select("tx_test", &Record::new(), &["foo"])
        .unwrap()
        .fetch_all()
        .unwrap()
        .iter()
        .filter_map(|row| row["foo"].as_i64())
        .collect();
    values.sort_unstable();
    values
}

#[test]
fn committed_transaction_is_visible() {
    let mut conn = plain();
    let mut tx = conn.get_transaction().unwrap();
    tx.insert("tx_test", &record! { "foo" => 1 }).unwrap();
    tx.commit().unwrap();
    drop(tx);

    assert_eq!(foos(&mut conn), vec![1]);
}

#[test]
fn rolled_back_transaction_leaves_no_trace() {
    let mut conn = plain();
    let mut tx = conn.get_transaction().unwrap();
    tx.insert("tx_test", &record! { "foo" => 1 }).unwrap();
    assert_eq!(foos(&mut tx), vec![1]);
    tx.rollback().unwrap();
    assert_eq!(tx.state(), TransactionState::RolledBack);
    drop(tx);

    assert!(foos(&mut conn).is_empty());
}

#[test]
fn inner_rollback_undoes_only_its_level() {
    let mut conn = plain();
    let mut outer = conn.get_transaction().unwrap();
    outer.insert("tx_test", &record! { "foo" => 1 }).unwrap();

    let mut inner = outer.get_transaction().unwrap();
    assert!(inner.is_nested());
    inner.insert("tx_test", &record! { "foo" => 2 }).unwrap();
    assert_eq!(foos(&mut inner), vec![1, 2]);
    inner.rollback().unwrap();
    drop(inner);

    assert_eq!(foos(&mut outer), vec![1]);
    outer.commit().unwrap();
    drop(outer);

    assert_eq!(foos(&mut conn), vec![1]);
}

#[test]
fn inner_commit_can_still_be_rolled_back_by_parent() {
    let mut conn = plain();
    let mut outer = conn.get_transaction().unwrap();

    let mut inner = outer.get_transaction().unwrap();
    inner.insert("tx_test", &record! { "foo" => 2 }).unwrap();
    inner.commit().unwrap();
    drop(inner);

    assert_eq!(foos(&mut outer), vec![2]);
    outer.rollback().unwrap();
    drop(outer);

    assert!(foos(&mut conn).is_empty());
}

#[test]
fn three_levels_deep() {
    let mut conn = plain();
    let mut first = conn.get_transaction().unwrap();
    first.insert("tx_test", &record! { "foo" => 1 }).unwrap();
    {
        let mut second = first.get_transaction().unwrap();
        second.insert("tx_test", &record! { "foo" => 2 }).unwrap();
        {
            let mut third = second.get_transaction().unwrap();
            third.insert("tx_test", &record! { "foo" => 3 }).unwrap();
            third.commit().unwrap();
        }
        second.rollback().unwrap();
    }
    first.commit().unwrap();
    drop(first);

    assert_eq!(foos(&mut conn), vec![1]);
}

#[test]
fn abandoned_transaction_rolls_back_and_logs() {
    let mut conn = plain();
    let logs = LogCapture::new();
    logs.run(|| {
        let mut tx = conn.get_transaction().unwrap();
        tx.insert("tx_test", &record! { "foo" => 1 }).unwrap();
    });

    let errors = logs.lines_at("ERROR");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Transaction dropped without commit or rollback"));
    assert!(foos(&mut conn).is_empty());

    // The connection is usable after the abandoned transaction.
    conn.insert("tx_test", &record! { "foo" => 5 }).unwrap();
    assert_eq!(foos(&mut conn), vec![5]);
}

#[test]
fn abandoned_nested_transaction_leaves_parent_usable() {
    let mut conn = plain();
    let logs = LogCapture::new();
    let mut outer = conn.get_transaction().unwrap();
    outer.insert("tx_test", &record! { "foo" => 1 }).unwrap();

    logs.run(|| {
        let mut inner = outer.get_transaction().unwrap();
        inner.insert("tx_test", &record! { "foo" => 2 }).unwrap();
    });
    assert!(logs.contains("Transaction dropped without commit or rollback"));
    assert!(logs.contains("transaction_"));

    outer.insert("tx_test", &record! { "foo" => 3 }).unwrap();
    outer.commit().unwrap();
    drop(outer);

    assert_eq!(foos(&mut conn), vec![1, 3]);
}

#[test]
fn finished_transaction_refuses_work() {
    let mut conn = plain();
    let mut tx = conn.get_transaction().unwrap();
    tx.rollback().unwrap();

    let err = tx.insert("tx_test", &record! { "foo" => 1 }).unwrap_err();
    assert!(matches!(err, DbalError::TransactionClosed { .. }));
    assert!(format!("{}", err).contains("rolled back"));
}

#[test]
fn scoped_helper_commits_on_ok() {
    let mut conn = plain();
    let id = transaction(&mut conn, |tx| {
        tx.insert_return_id("tx_test", &record! { "foo" => 10 })
    })
    .unwrap();
    assert_eq!(id, 1);
    assert_eq!(foos(&mut conn), vec![10]);
}

#[test]
fn scoped_helper_rolls_back_on_err() {
    let mut conn = plain();
    let err = transaction(&mut conn, |tx| {
        tx.insert("tx_test", &record! { "foo" => 10 })?;
        tx.update("tx_test", &record! { "bar" => "x" }, &record! { "foo" => 404 })?;
        Ok(())
    })
    .unwrap_err();
    assert!(err.is_update_cardinality());
    assert!(foos(&mut conn).is_empty());
}

#[test]
fn scoped_helper_nests() {
    let mut conn = plain();
    transaction(&mut conn, |outer| {
        outer.insert("tx_test", &record! { "foo" => 1 })?;
        let inner = transaction(outer, |inner| {
            inner.insert("tx_test", &record! { "foo" => 2 })?;
            Err::<(), _>(DbalError::invalid_record("discard inner"))
        });
        assert!(inner.is_err());
        Ok(())
    })
    .unwrap();

    assert_eq!(foos(&mut conn), vec![1]);
}

#[test]
fn sequence_advance_is_transactional() {
    let mut conn = plain();
    let mut tx = conn.get_transaction().unwrap();
    assert_eq!(
        tx.insert_return_id("tx_test", &record! { "foo" => 1 }).unwrap(),
        1
    );
    tx.rollback().unwrap();
    drop(tx);

    // SQLite's emulated sequence rolls back with the transaction.
    assert_eq!(
        conn.insert_return_id("tx_test", &record! { "foo" => 2 }).unwrap(),
        1
    );
}
