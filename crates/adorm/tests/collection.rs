mod common;

use adorm::{OrmResult, Query, Row, Value};
use common::{MockConnection, row};

fn ids(range: std::ops::Range<i64>) -> Vec<Row> {
    range.map(|id| row(&[("id", Value::Int(id))])).collect()
}

#[test]
fn batches_stop_on_short_page() {
    let mock = MockConnection::new();
    mock.push_rows(ids(0..2));
    mock.push_rows(ids(2..4));
    mock.push_rows(ids(4..5));

    let collection = Query::table("user")
        .on(mock.db())
        .where_eq("active", 1)
        .collection()
        .size(2);

    let sizes: Vec<usize> = collection
        .batches()
        .map(|batch| batch.map(|rows| rows.len()))
        .collect::<OrmResult<_>>()
        .unwrap();

    assert_eq!(sizes, vec![2, 2, 1]);
    let sql: Vec<String> = mock.queries().into_iter().map(|(sql, _)| sql).collect();
    assert_eq!(
        sql,
        vec![
            "SELECT * FROM `user` WHERE `user`.`active` = ? LIMIT 2",
            "SELECT * FROM `user` WHERE `user`.`active` = ? LIMIT 2, 2",
            "SELECT * FROM `user` WHERE `user`.`active` = ? LIMIT 4, 2",
        ]
    );
}

#[test]
fn batches_stop_on_empty_page() {
    let mock = MockConnection::new();
    mock.push_rows(ids(0..3));

    let collection = Query::table("user").on(mock.db()).collection().size(3);
    assert_eq!(collection.batches().count(), 1);
    // The full first page forces a second fetch, which comes back empty.
    assert_eq!(mock.queries().len(), 2);
}

#[test]
fn single_page_mode_fetches_once() {
    let mock = MockConnection::new();
    mock.push_rows(ids(20..30));

    let collection = Query::table("user").on(mock.db()).collection().page(3, 10);
    let rows: Vec<Row> = collection.rows().collect::<OrmResult<_>>().unwrap();

    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0]["id"], Value::Int(20));
    assert_eq!(mock.queries().len(), 1);
    assert_eq!(mock.queries()[0].0, "SELECT * FROM `user` LIMIT 20, 10");
}

#[test]
fn rows_flatten_pages() {
    let mock = MockConnection::new();
    mock.push_rows(ids(0..2));
    mock.push_rows(ids(2..3));

    let collection = Query::table("user").on(mock.db()).collection().size(2);
    let ids: Vec<i64> = collection
        .rows()
        .map(|row| row.map(|r| r["id"].as_i64().unwrap_or_default()))
        .collect::<OrmResult<_>>()
        .unwrap();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn error_ends_iteration() {
    let mock = MockConnection::new();
    mock.push_rows(ids(0..2));
    mock.fail_next_query("lost connection");

    let collection = Query::table("user").on(mock.db()).collection().size(2);
    let mut batches = collection.batches();
    assert!(batches.next().unwrap().is_err());
    assert!(batches.next().is_none());
}

#[test]
fn total_count_is_memoized() {
    let mock = MockConnection::new();
    mock.push_row(row(&[("COUNT(*)", Value::Int(45))]));

    let collection = Query::table("user")
        .on(mock.db())
        .where_eq("active", 1)
        .collection()
        .size(20);

    assert_eq!(collection.total_count().unwrap(), 45);
    assert_eq!(collection.total_pages().unwrap(), 3);
    assert_eq!(mock.queries().len(), 1);
    assert_eq!(
        mock.queries()[0],
        (
            "SELECT COUNT(*) FROM `user` WHERE `user`.`active` = ?".to_string(),
            vec![Value::Int(1)]
        )
    );
}
