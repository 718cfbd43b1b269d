//! Shared database handle.

use crate::client::{Connection, WriteMode, auto_execute_statement};
use crate::condition::SqlFragment;
use crate::error::{OrmError, OrmResult};
use crate::monitor::{HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult};
use crate::query::{Query, interpolate};
use crate::row::Row;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// A named, cloneable handle to one [`Connection`].
///
/// Cloning is cheap and every clone shares the connection, the debug flag and the
/// registered hooks/monitors. Builders and records hold a `Db` for their terminal
/// operations.
///
/// A handle is single-threaded (`!Send`): the connection it wraps is a blocking,
/// stateful session.
#[derive(Clone)]
pub struct Db {
    inner: Rc<DbInner>,
    /// Attached to the context of every statement run through this handle.
    tag: Option<Rc<str>>,
}

struct DbInner {
    name: String,
    conn: Rc<dyn Connection>,
    debug: Cell<bool>,
    hooks: RefCell<Vec<Rc<dyn QueryHook>>>,
    monitors: RefCell<Vec<Rc<dyn QueryMonitor>>>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("name", &self.inner.name)
            .field("database_type", &self.inner.conn.database_type())
            .field("debug", &self.inner.debug.get())
            .finish()
    }
}

impl Db {
    /// Wrap a connection under `name`.
    pub fn new(name: impl Into<String>, conn: impl Connection + 'static) -> Self {
        Self::from_rc(name, Rc::new(conn))
    }

    /// Wrap an already shared connection.
    pub fn from_rc(name: impl Into<String>, conn: Rc<dyn Connection>) -> Self {
        Self {
            inner: Rc::new(DbInner {
                name: name.into(),
                conn,
                debug: Cell::new(false),
                hooks: RefCell::new(Vec::new()),
                monitors: RefCell::new(Vec::new()),
            }),
            tag: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The underlying connection, bypassing hooks and monitors.
    pub fn connection(&self) -> &dyn Connection {
        self.inner.conn.as_ref()
    }

    /// A handle on the same connection whose statements carry `tag` for hooks and
    /// monitors.
    pub fn tagged(&self, tag: impl Into<String>) -> Db {
        let tag: String = tag.into();
        Db {
            inner: Rc::clone(&self.inner),
            tag: Some(Rc::from(tag)),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub(crate) fn untagged(&self) -> Db {
        Db {
            inner: Rc::clone(&self.inner),
            tag: None,
        }
    }

    /// Whether two handles share the same connection.
    pub fn same_connection(&self, other: &Db) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Log every statement with its binds interpolated (target `adorm.sql`, level `DEBUG`).
    pub fn debug(&self, enabled: bool) -> &Self {
        self.inner.debug.set(enabled);
        self
    }

    pub fn is_debug(&self) -> bool {
        self.inner.debug.get()
    }

    pub fn add_hook(&self, hook: impl QueryHook + 'static) -> &Self {
        self.inner.hooks.borrow_mut().push(Rc::new(hook));
        self
    }

    pub fn add_monitor(&self, monitor: impl QueryMonitor + 'static) -> &Self {
        self.add_monitor_rc(Rc::new(monitor))
    }

    /// Register a monitor the caller keeps a handle to (e.g. to read stats).
    pub fn add_monitor_rc(&self, monitor: Rc<dyn QueryMonitor>) -> &Self {
        self.inner.monitors.borrow_mut().push(monitor);
        self
    }

    /// Run `f` with hooks, monitors and debug logging around it.
    fn instrument<T>(
        &self,
        sql: &str,
        binds: &[Value],
        f: impl FnOnce(&dyn Connection) -> OrmResult<T>,
        summarize: impl FnOnce(&T) -> QueryResult,
    ) -> OrmResult<T> {
        let mut ctx = QueryContext::new(sql, binds.len()).on_connection(self.name());
        if let Some(tag) = &self.tag {
            ctx = ctx.with_tag(tag.as_ref());
        }

        // Clone out of the RefCells so hooks may register further hooks.
        let hooks: Vec<Rc<dyn QueryHook>> = self.inner.hooks.borrow().clone();
        let monitors: Vec<Rc<dyn QueryMonitor>> = self.inner.monitors.borrow().clone();

        for hook in &hooks {
            if let HookAction::Abort(reason) = hook.before_query(&ctx) {
                return Err(OrmError::query(format!("statement aborted by hook: {reason}")));
            }
        }
        if self.is_debug() {
            tracing::debug!(
                target: "adorm.sql",
                connection = %self.name(),
                sql = %interpolate(sql, binds),
                "debug statement"
            );
        }
        for monitor in &monitors {
            monitor.on_query_start(&ctx);
        }

        let start = Instant::now();
        let outcome = f(self.connection());
        let duration = start.elapsed();

        let result = match &outcome {
            Ok(value) => summarize(value),
            Err(e) => QueryResult::error(e.to_string()),
        };
        if outcome.is_ok() {
            for hook in &hooks {
                hook.after_query(&ctx, duration, &result);
            }
        }
        for monitor in &monitors {
            monitor.on_query_complete(&ctx, duration, &result);
        }
        outcome
    }

    // ==================== Reads ====================

    pub fn get_all(&self, sql: &str, binds: &[Value]) -> OrmResult<Vec<Row>> {
        self.instrument(
            sql,
            binds,
            |c| c.get_all(sql, binds),
            |rows| QueryResult::Rows(rows.len()),
        )
    }

    pub fn get_row(&self, sql: &str, binds: &[Value]) -> OrmResult<Option<Row>> {
        self.instrument(
            sql,
            binds,
            |c| c.get_row(sql, binds),
            |row| QueryResult::OptionalRow(row.is_some()),
        )
    }

    pub fn get_one(&self, sql: &str, binds: &[Value]) -> OrmResult<Option<Value>> {
        self.instrument(
            sql,
            binds,
            |c| c.get_one(sql, binds),
            |v| QueryResult::OptionalRow(v.is_some()),
        )
    }

    pub fn get_col(&self, sql: &str, binds: &[Value]) -> OrmResult<Vec<Value>> {
        self.instrument(
            sql,
            binds,
            |c| c.get_col(sql, binds),
            |col| QueryResult::Rows(col.len()),
        )
    }

    pub fn get_assoc(&self, sql: &str, binds: &[Value]) -> OrmResult<BTreeMap<String, Row>> {
        self.instrument(
            sql,
            binds,
            |c| c.get_assoc(sql, binds),
            |rows| QueryResult::Rows(rows.len()),
        )
    }

    // ==================== Writes ====================

    pub fn execute(&self, sql: &str, binds: &[Value]) -> OrmResult<u64> {
        self.instrument(
            sql,
            binds,
            |c| c.execute(sql, binds),
            |n| QueryResult::Affected(*n),
        )
    }

    pub fn auto_execute(
        &self,
        table: &str,
        attributes: &Row,
        mode: WriteMode,
        condition: Option<&SqlFragment>,
    ) -> OrmResult<bool> {
        let described = auto_execute_statement(table, attributes, mode, condition)
            .unwrap_or_else(|| SqlFragment::new(format!("{} {table}", mode.as_str()), Vec::new()));
        self.instrument(
            &described.sql,
            &described.binds,
            |c| c.auto_execute(table, attributes, mode, condition),
            |ok| QueryResult::Done(*ok),
        )
    }

    /// Insert one row built from `attributes`.
    pub fn insert(&self, table: &str, attributes: &Row) -> OrmResult<bool> {
        self.auto_execute(table, attributes, WriteMode::Insert, None)
    }

    /// Update the rows of `table` matching the conditions of `query`.
    pub fn update(&self, table: &str, attributes: &Row, query: &Query) -> OrmResult<bool> {
        let condition = query.write_condition_fragment();
        self.auto_execute(table, attributes, WriteMode::Update, Some(&condition))
    }

    /// Delete the rows of `table` matching the conditions of `query`.
    ///
    /// A query without conditions deletes nothing and returns `Ok(false)`.
    pub fn delete(&self, table: &str, query: &Query) -> OrmResult<bool> {
        if !query.has_conditions() {
            return Ok(false);
        }
        let condition = query.write_condition_fragment();
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            crate::ident::quote_table(table),
            condition.sql
        );
        self.execute(&sql, &condition.binds).map(|_| true)
    }

    // ==================== Session ====================

    pub fn insert_id(&self, table: &str, column: &str) -> OrmResult<Value> {
        self.connection().insert_id(table, column)
    }

    pub fn affected_rows(&self) -> OrmResult<u64> {
        self.connection().affected_rows()
    }

    pub fn error_message(&self) -> String {
        self.connection().error_msg()
    }

    pub fn database_type(&self) -> String {
        self.connection().database_type().to_string()
    }
}
