//! Scripted in-memory connection shared by the integration tests.

#![allow(dead_code)]

use adorm::{Connection, Db, OrmError, OrmResult, Row, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// One call received by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Execute(String, Vec<Value>),
    Query(String, Vec<Value>),
    InsertId(String, String),
    Begin,
    Commit,
    Rollback,
    Start,
    Fail,
    Complete,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    rows: VecDeque<Vec<Row>>,
    query_errors: VecDeque<String>,
    execute_errors: VecDeque<String>,
    insert_id: Value,
    begin_fails: bool,
    commit_fails: bool,
    commit_errors: bool,
    rollback_errors: bool,
    smart_failed: bool,
    last_error: String,
}

/// Connection that records every call and answers from scripted results.
///
/// Reads pop the next scripted row set (empty when none is left); writes succeed with
/// one affected row unless an error is queued.
#[derive(Clone, Default)]
pub struct MockConnection {
    state: Rc<RefCell<State>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `Db` handle named `main` over this mock.
    pub fn db(&self) -> Db {
        Db::new("main", self.clone())
    }

    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.state.borrow_mut().rows.push_back(rows);
        self
    }

    pub fn push_row(&self, row: Row) -> &Self {
        self.push_rows(vec![row])
    }

    /// Make the next read fail.
    pub fn fail_next_query(&self, message: &str) -> &Self {
        self.state
            .borrow_mut()
            .query_errors
            .push_back(message.to_string());
        self
    }

    /// Make the next execute fail.
    pub fn fail_next_execute(&self, message: &str) -> &Self {
        self.state
            .borrow_mut()
            .execute_errors
            .push_back(message.to_string());
        self
    }

    pub fn set_insert_id(&self, id: impl Into<Value>) -> &Self {
        self.state.borrow_mut().insert_id = id.into();
        self
    }

    pub fn set_begin_fails(&self, fails: bool) {
        self.state.borrow_mut().begin_fails = fails;
    }

    pub fn set_commit_fails(&self, fails: bool) {
        self.state.borrow_mut().commit_fails = fails;
    }

    /// Make `commit_trans` return an error instead of `Ok(false)`.
    pub fn set_commit_errors(&self, errors: bool) {
        self.state.borrow_mut().commit_errors = errors;
    }

    pub fn set_rollback_errors(&self, errors: bool) {
        self.state.borrow_mut().rollback_errors = errors;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Executed statements (writes), in order.
    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Execute(sql, binds) => Some((sql, binds)),
                _ => None,
            })
            .collect()
    }

    /// Read statements, in order.
    pub fn queries(&self) -> Vec<(String, Vec<Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Query(sql, binds) => Some((sql, binds)),
                _ => None,
            })
            .collect()
    }

    /// Transaction control calls only.
    pub fn transaction_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Execute(..) | Call::Query(..) | Call::InsertId(..)))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Connection for MockConnection {
    fn execute(&self, sql: &str, binds: &[Value]) -> OrmResult<u64> {
        self.record(Call::Execute(sql.to_string(), binds.to_vec()));
        let mut state = self.state.borrow_mut();
        match state.execute_errors.pop_front() {
            Some(message) => {
                state.last_error = message.clone();
                Err(OrmError::query(message))
            }
            None => Ok(1),
        }
    }

    fn get_all(&self, sql: &str, binds: &[Value]) -> OrmResult<Vec<Row>> {
        self.record(Call::Query(sql.to_string(), binds.to_vec()));
        let mut state = self.state.borrow_mut();
        if let Some(message) = state.query_errors.pop_front() {
            state.last_error = message.clone();
            return Err(OrmError::query(message));
        }
        Ok(state.rows.pop_front().unwrap_or_default())
    }

    fn insert_id(&self, table: &str, column: &str) -> OrmResult<Value> {
        self.record(Call::InsertId(table.to_string(), column.to_string()));
        Ok(self.state.borrow().insert_id.clone())
    }

    fn affected_rows(&self) -> OrmResult<u64> {
        Ok(1)
    }

    fn begin_trans(&self) -> OrmResult<bool> {
        self.record(Call::Begin);
        Ok(!self.state.borrow().begin_fails)
    }

    fn commit_trans(&self) -> OrmResult<bool> {
        self.record(Call::Commit);
        if self.state.borrow().commit_errors {
            return Err(OrmError::Connection("server gone away".into()));
        }
        Ok(!self.state.borrow().commit_fails)
    }

    fn rollback_trans(&self) -> OrmResult<bool> {
        self.record(Call::Rollback);
        if self.state.borrow().rollback_errors {
            return Err(OrmError::Connection("connection lost".into()));
        }
        Ok(true)
    }

    fn start_trans(&self) -> OrmResult<()> {
        self.record(Call::Start);
        self.state.borrow_mut().smart_failed = false;
        Ok(())
    }

    fn fail_trans(&self) {
        self.record(Call::Fail);
        self.state.borrow_mut().smart_failed = true;
    }

    fn complete_trans(&self) -> OrmResult<bool> {
        self.record(Call::Complete);
        Ok(!self.state.borrow().smart_failed)
    }

    fn error_msg(&self) -> String {
        self.state.borrow().last_error.clone()
    }
}

/// Build a row from `(column, value)` pairs.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
