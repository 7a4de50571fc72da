//! Data operations against in-memory SQLite.

use palimpsest_dbal::{record, DatabaseConnection, DbalError, Record, Value};
use palimpsest_test_utils::*;
use proptest::prelude::*;

fn plain() -> Connection {
    let mut conn = memory_connection();
    create_plain_table(&mut conn, "dbal_test");
    conn
}

#[test]
fn insert_then_select_returns_single_row() {
    let mut conn = plain();
    conn.insert(
        "dbal_test",
        &record! { "foo" => 1, "bar" => "FUBAR", "boo" => true },
    )
    .expect("insert");

    let cursor = conn
        .select("dbal_test", &record! { "foo" => 1 }, &[])
        .expect("select");
    assert_eq!(cursor.num_rows().unwrap(), 1);

    let row = cursor.fetch_first().unwrap();
    assert_eq!(row["foo"], Value::Integer(1));
    assert_eq!(row["bar"], Value::from("FUBAR"));
    assert_eq!(row["boo"], Value::Boolean(true));

    assert_eq!(conn.commit().unwrap_err(), DbalError::NotInTransaction);
}

#[test]
fn cursor_iteration_visits_every_row() {
    let mut conn = plain();
    for i in 0..4 {
        conn.insert("dbal_test", &record! { "foo" => i }).unwrap();
    }

    let mut cursor = conn.select("dbal_test", &Record::new(), &["foo"]).unwrap();
    let mut seen = Vec::new();
    cursor.rewind();
    while cursor.valid() {
        seen.push(cursor.current().unwrap()["foo"].as_i64().unwrap());
        cursor.next();
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3]);

    let err = cursor.fetch(4).unwrap_err();
    assert!(format!("{}", err).contains("Unable to fetch row: 4"));
}

#[test]
fn quotes_and_backslashes_survive_round_trip() {
    let mut conn = plain();
    let awkward = "it's a \\path\\ with \"quotes\"";
    conn.insert("dbal_test", &record! { "foo" => 9, "bar" => awkward })
        .unwrap();

    let row = conn
        .select("dbal_test", &record! { "bar" => awkward }, &[])
        .unwrap()
        .fetch_first()
        .unwrap();
    assert_eq!(row["foo"], Value::Integer(9));
}

#[test]
fn update_changes_exactly_one_row() {
    let mut conn = plain();
    conn.insert("dbal_test", &record! { "foo" => 1, "bar" => "old" })
        .unwrap();
    conn.insert("dbal_test", &record! { "foo" => 2, "bar" => "other" })
        .unwrap();

    let cursor = conn
        .update("dbal_test", &record! { "bar" => "new" }, &record! { "foo" => 1 })
        .unwrap();
    assert_eq!(cursor.affected_rows().unwrap(), 1);

    let row = conn
        .select("dbal_test", &record! { "foo" => 1 }, &[])
        .unwrap()
        .fetch_first()
        .unwrap();
    assert_eq!(row["bar"], Value::from("new"));
}

#[test]
fn update_on_no_match_is_cardinality_error() {
    let mut conn = plain();
    let err = conn
        .update("dbal_test", &record! { "bar" => "x" }, &record! { "foo" => 404 })
        .unwrap_err();
    assert_eq!(
        err,
        DbalError::UpdateCardinality {
            table: "dbal_test".to_string(),
            affected: 0,
        }
    );
}

#[test]
fn update_or_insert_inserts_merged_record() {
    let mut conn = plain();
    conn.update_or_insert(
        "dbal_test",
        &record! { "bar" => "created", "boo" => false },
        &record! { "foo" => 5 },
    )
    .unwrap();

    let row = conn
        .select("dbal_test", &record! { "foo" => 5 }, &[])
        .unwrap()
        .fetch_first()
        .unwrap();
    assert_eq!(row["bar"], Value::from("created"));
    assert_eq!(row["boo"], Value::Boolean(false));
}

#[test]
fn update_or_insert_falls_back_with_warning() {
    let mut conn = plain();
    let logs = LogCapture::new();
    logs.run(|| {
        conn.update_or_insert("dbal_test", &record! { "bar" => "x" }, &record! { "foo" => 1 })
            .unwrap();
    });
    assert_eq!(logs.lines_at("WARN").len(), 1);
    assert!(logs.contains("INSERT INTO"));
}

#[test]
fn exists_or_insert_twice_yields_one_row() {
    let mut conn = plain();
    let record = record! { "foo" => 42, "bar" => "answer" };
    let first = conn.exists_or_insert("dbal_test", &record).unwrap();
    let second = conn.exists_or_insert("dbal_test", &record).unwrap();
    assert_eq!(first, second);
    assert_eq!(count_rows(&mut conn, "dbal_test"), 1);

    let other = conn
        .exists_or_insert("dbal_test", &record! { "foo" => 43 })
        .unwrap();
    assert_ne!(other, first);
    assert_eq!(count_rows(&mut conn, "dbal_test"), 2);
}

#[test]
fn insert_return_id_without_sequence_fails() {
    let mut conn = memory_connection();
    conn.query("CREATE TABLE no_seq (no_seq_id BIGINT, foo INTEGER)")
        .unwrap();
    let err = conn
        .insert_return_id("no_seq", &record! { "foo" => 1 })
        .unwrap_err();
    assert!(matches!(err, DbalError::Query { .. }));
    assert_eq!(count_rows(&mut conn, "no_seq"), 0);
}

#[test]
fn records_from_json() {
    let mut conn = plain();
    let record = Record::from_json(serde_json::json!({
        "foo": 3, "bar": "json", "boo": true
    }))
    .unwrap();
    conn.insert("dbal_test", &record).unwrap();
    assert_eq!(
        conn.select("dbal_test", &record, &[])
            .unwrap()
            .num_rows()
            .unwrap(),
        1
    );

    let err = Record::from_json(serde_json::json!({ "foo": [1, 2] })).unwrap_err();
    assert!(matches!(err, DbalError::UnsupportedValue { .. }));
}

#[test]
fn every_statement_is_logged() {
    let mut conn = plain();
    let logs = LogCapture::new();
    logs.run(|| {
        conn.insert("dbal_test", &record! { "foo" => 1 }).unwrap();
    });
    assert!(logs.contains("Executing statement"));
    assert!(logs.contains("INSERT INTO \"dbal_test\""));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_inserted_text_is_selectable(bar in "[a-zA-Z0-9 '\\\\\"%_-]{0,32}", foo in any::<i32>()) {
        let mut conn = plain();
        conn.insert("dbal_test", &record! { "foo" => foo, "bar" => bar.as_str() }).unwrap();

        let cursor = conn
            .select("dbal_test", &record! { "foo" => foo, "bar" => bar.as_str() }, &[])
            .unwrap();
        prop_assert_eq!(cursor.num_rows().unwrap(), 1);
        prop_assert_eq!(cursor.fetch_first().unwrap()["bar"].to_text(), bar);
    }

    #[test]
    fn prop_any_record_is_found_by_itself(record in arb_scalar_record()) {
        prop_assume!(!record.is_empty());
        let mut conn = memory_connection();
        let dialect = conn.dialect();
        let columns: Vec<String> = record.keys().map(|k| dialect.escape_identifier(k)).collect();
        conn.query(&format!("CREATE TABLE anything ({})", columns.join(", "))).unwrap();

        conn.insert("anything", &record).unwrap();
        let cursor = conn.select("anything", &record, &[]).unwrap();
        prop_assert_eq!(cursor.num_rows().unwrap(), 1);
    }
}
