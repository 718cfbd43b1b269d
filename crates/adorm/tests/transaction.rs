mod common;

use adorm::{OrmError, Value};
use common::{Call, MockConnection};
use std::panic::{AssertUnwindSafe, catch_unwind};

// ==================== Strict ====================

#[test]
fn strict_commits_on_success() {
    let mock = MockConnection::new();
    let ok = mock
        .db()
        .transaction(|db| {
            db.execute("UPDATE account SET balance = ? WHERE id = ?", &[Value::Int(10), Value::Int(1)])?;
            Ok(true)
        })
        .unwrap();

    assert!(ok);
    assert_eq!(mock.transaction_calls(), vec![Call::Begin, Call::Commit]);
}

#[test]
fn strict_rolls_back_when_work_reports_failure() {
    let mock = MockConnection::new();
    let ok = mock.db().transaction(|_| Ok(false)).unwrap();
    assert!(!ok);
    assert_eq!(mock.transaction_calls(), vec![Call::Begin, Call::Rollback]);
}

#[test]
fn strict_rolls_back_and_returns_work_error() {
    let mock = MockConnection::new();
    mock.fail_next_execute("deadlock");

    let err = mock
        .db()
        .transaction(|db| {
            db.execute("DELETE FROM account", &[])?;
            Ok(true)
        })
        .unwrap_err();

    assert!(matches!(err, OrmError::Query(ref m) if m == "deadlock"));
    assert_eq!(mock.transaction_calls(), vec![Call::Begin, Call::Rollback]);
}

#[test]
fn strict_rollback_failure_is_combined() {
    let mock = MockConnection::new();
    mock.set_rollback_errors(true);

    let err = mock
        .db()
        .transaction(|_| Err(OrmError::validation("bad input")))
        .unwrap_err();

    match err {
        OrmError::Transaction(message) => {
            assert!(message.contains("bad input"));
            assert!(message.contains("connection lost"));
        }
        other => panic!("expected transaction error, got {other:?}"),
    }
}

#[test]
fn strict_begin_failure_skips_work() {
    let mock = MockConnection::new();
    mock.set_begin_fails(true);
    let mut ran = false;
    let ok = mock
        .db()
        .transaction(|_| {
            ran = true;
            Ok(true)
        })
        .unwrap();
    assert!(!ok);
    assert!(!ran);
    assert_eq!(mock.transaction_calls(), vec![Call::Begin]);
}

#[test]
fn strict_commit_failure_rolls_back() {
    let mock = MockConnection::new();
    mock.set_commit_fails(true);
    let ok = mock.db().transaction(|_| Ok(true)).unwrap();
    assert!(!ok);
    assert_eq!(
        mock.transaction_calls(),
        vec![Call::Begin, Call::Commit, Call::Rollback]
    );
}

#[test]
fn strict_commit_error_rolls_back_and_surfaces() {
    let mock = MockConnection::new();
    mock.set_commit_errors(true);
    let err = mock.db().transaction(|_| Ok(true)).unwrap_err();
    assert!(matches!(err, OrmError::Connection(ref m) if m == "server gone away"));
    assert_eq!(
        mock.transaction_calls(),
        vec![Call::Begin, Call::Commit, Call::Rollback]
    );

    mock.clear_calls();
    mock.set_rollback_errors(true);
    match mock.db().transaction(|_| Ok(true)).unwrap_err() {
        OrmError::Transaction(message) => {
            assert!(message.contains("server gone away"));
            assert!(message.contains("connection lost"));
        }
        other => panic!("expected transaction error, got {other:?}"),
    }
}

#[test]
fn strict_rolls_back_on_panic() {
    let mock = MockConnection::new();
    let db = mock.db();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _ = db.transaction(|_| -> adorm::OrmResult<bool> { panic!("work exploded") });
    }));

    assert!(result.is_err());
    assert_eq!(mock.transaction_calls(), vec![Call::Begin, Call::Rollback]);
}

// ==================== Smart ====================

#[test]
fn smart_completes_on_success() {
    let mock = MockConnection::new();
    let ok = mock.db().smart_transaction(|_| Ok(true)).unwrap();
    assert!(ok);
    assert_eq!(mock.transaction_calls(), vec![Call::Start, Call::Complete]);
}

#[test]
fn smart_flags_failure_before_completing() {
    let mock = MockConnection::new();
    let ok = mock.db().smart_transaction(|_| Ok(false)).unwrap();
    assert!(!ok);
    assert_eq!(
        mock.transaction_calls(),
        vec![Call::Start, Call::Fail, Call::Complete]
    );
}

#[test]
fn smart_returns_work_error_after_completion() {
    let mock = MockConnection::new();
    let err = mock
        .db()
        .smart_transaction(|_| Err(OrmError::not_found("account 3")))
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        mock.transaction_calls(),
        vec![Call::Start, Call::Fail, Call::Complete]
    );
}

#[test]
fn smart_fails_and_completes_on_panic() {
    let mock = MockConnection::new();
    let db = mock.db();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _ = db.smart_transaction(|_| -> adorm::OrmResult<bool> { panic!("work exploded") });
    }));

    assert!(result.is_err());
    assert_eq!(
        mock.transaction_calls(),
        vec![Call::Start, Call::Fail, Call::Complete]
    );
}
