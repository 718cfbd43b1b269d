//! Connection trait implemented by database drivers.

use crate::condition::SqlFragment;
use crate::error::OrmResult;
use crate::ident::{quote_ident, quote_table};
use crate::row::Row;
use crate::value::Value;
use std::collections::BTreeMap;

/// Statement kind for [`Connection::auto_execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Insert,
    Update,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::Insert => "INSERT",
            WriteMode::Update => "UPDATE",
        }
    }
}

/// A synchronous database connection.
///
/// This is the seam between the ORM and a concrete driver. Statements use `?`
/// placeholders and receive their binds positionally. Methods take `&self`; drivers
/// keep any mutable session state behind interior mutability so that one connection
/// can be shared by every builder and record created from it.
///
/// Statement failures are reported as `Err`. The exceptions are the write helpers
/// ([`auto_execute`](Connection::auto_execute), transaction control) which return
/// `Ok(false)` on a soft failure and leave the reason in [`error_msg`](Connection::error_msg).
pub trait Connection {
    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, binds: &[Value]) -> OrmResult<u64>;

    /// Execute a query and return all rows.
    fn get_all(&self, sql: &str, binds: &[Value]) -> OrmResult<Vec<Row>>;

    /// Execute a query and return the first row, if any.
    fn get_row(&self, sql: &str, binds: &[Value]) -> OrmResult<Option<Row>> {
        Ok(self.get_all(sql, binds)?.into_iter().next())
    }

    /// Execute a query and return the first column of the first row, if any.
    ///
    /// The default picks the first column in name order, which is exact for the
    /// single-column results this is meant for (aggregates, `SELECT 1`).
    fn get_one(&self, sql: &str, binds: &[Value]) -> OrmResult<Option<Value>> {
        Ok(self
            .get_row(sql, binds)?
            .and_then(|row| row.into_values().next()))
    }

    /// Execute a query and return the first column of every row.
    fn get_col(&self, sql: &str, binds: &[Value]) -> OrmResult<Vec<Value>> {
        Ok(self
            .get_all(sql, binds)?
            .into_iter()
            .filter_map(|row| row.into_values().next())
            .collect())
    }

    /// Execute a query and key every row by its first column.
    fn get_assoc(&self, sql: &str, binds: &[Value]) -> OrmResult<BTreeMap<String, Row>> {
        let mut out = BTreeMap::new();
        for mut row in self.get_all(sql, binds)? {
            if let Some(key) = row.keys().next().cloned() {
                if let Some(value) = row.remove(&key) {
                    out.insert(value.to_string(), row);
                }
            }
        }
        Ok(out)
    }

    /// Insert or update `attributes` in `table`.
    ///
    /// The default builds the statement with [`auto_execute_statement`] and runs it
    /// through [`execute`](Connection::execute).
    fn auto_execute(
        &self,
        table: &str,
        attributes: &Row,
        mode: WriteMode,
        condition: Option<&SqlFragment>,
    ) -> OrmResult<bool> {
        match auto_execute_statement(table, attributes, mode, condition) {
            Some(stmt) => self.execute(&stmt.sql, &stmt.binds).map(|_| true),
            None => Ok(false),
        }
    }

    /// Identifier generated by the last insert into `table`.
    fn insert_id(&self, table: &str, column: &str) -> OrmResult<Value>;

    /// Rows affected by the last statement.
    fn affected_rows(&self) -> OrmResult<u64>;

    /// Begin a strict transaction.
    fn begin_trans(&self) -> OrmResult<bool>;

    /// Commit the strict transaction.
    fn commit_trans(&self) -> OrmResult<bool>;

    /// Roll back the strict transaction.
    fn rollback_trans(&self) -> OrmResult<bool>;

    /// Begin a smart transaction (failures are flagged, not raised).
    fn start_trans(&self) -> OrmResult<()>;

    /// Flag the smart transaction for rollback.
    fn fail_trans(&self);

    /// Finish the smart transaction; returns `true` if it committed.
    fn complete_trans(&self) -> OrmResult<bool>;

    /// Last error message reported by the driver.
    fn error_msg(&self) -> String;

    /// Driver name.
    fn database_type(&self) -> &str {
        "mysqli"
    }
}

/// Build the statement [`Connection::auto_execute`] runs by default.
///
/// - INSERT: ``INSERT INTO `t` (`a`, `b`) VALUES (?, ?)``
/// - UPDATE: ``UPDATE `t` SET `a` = ?, `b` = ? WHERE <condition>``
///
/// Returns `None` when there is nothing to write, or for an UPDATE without a condition.
pub fn auto_execute_statement(
    table: &str,
    attributes: &Row,
    mode: WriteMode,
    condition: Option<&SqlFragment>,
) -> Option<SqlFragment> {
    if attributes.is_empty() {
        return None;
    }

    let columns: Vec<String> = attributes.keys().map(|c| quote_ident(c)).collect();
    let mut binds: Vec<Value> = attributes.values().cloned().collect();

    match mode {
        WriteMode::Insert => {
            let placeholders = vec!["?"; columns.len()].join(", ");
            Some(SqlFragment::new(
                format!(
                    "INSERT INTO {} ({}) VALUES ({placeholders})",
                    quote_table(table),
                    columns.join(", ")
                ),
                binds,
            ))
        }
        WriteMode::Update => {
            let condition = condition.filter(|c| !c.is_empty())?;
            let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = ?")).collect();
            binds.extend(condition.binds.iter().cloned());
            Some(SqlFragment::new(
                format!(
                    "UPDATE {} SET {} WHERE {}",
                    quote_table(table),
                    assignments.join(", "),
                    condition.sql
                ),
                binds,
            ))
        }
    }
}
