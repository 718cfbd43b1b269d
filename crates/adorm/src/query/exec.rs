use super::{Query, interpolate};
use crate::collection::Collection;
use crate::condition::SqlFragment;
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::record::{Model, Record};
use crate::row::{FromRow, Row};
use crate::value::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Aggregate function for [`Query::aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }

    pub(super) fn name(self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

impl Query {
    /// The bound connection, tagged when the query carries a tag.
    fn require_db(&self) -> OrmResult<Db> {
        let db = self.db.as_ref().ok_or_else(|| {
            OrmError::config(format!(
                "query on {} has no connection; bind one with on()",
                self.table_name().unwrap_or("<no table>")
            ))
        })?;
        Ok(match &self.tag {
            Some(tag) => db.tagged(tag.as_str()),
            None => db.clone(),
        })
    }

    /// The statement terminal reads send: SQL plus binds, or the interpolated SQL alone
    /// when `use_complete_sql` is on.
    fn statement(&self) -> SqlFragment {
        self.prepare(SqlFragment::new(self.to_sql(), self.binds()))
    }

    fn prepare(&self, stmt: SqlFragment) -> SqlFragment {
        if self.debug {
            tracing::debug!(
                target: "adorm.sql",
                table = self.table_name().unwrap_or_default(),
                sql = %interpolate(&stmt.sql, &stmt.binds),
                binds = stmt.binds.len(),
                "query debug"
            );
        }
        if self.complete_sql {
            SqlFragment::new(interpolate(&stmt.sql, &stmt.binds), Vec::new())
        } else {
            stmt
        }
    }

    // ==================== Reads ====================

    /// Fetch every matching row.
    pub fn find_all(&self) -> OrmResult<Vec<Row>> {
        let db = self.require_db()?;
        let stmt = self.statement();
        db.get_all(&stmt.sql, &stmt.binds)
    }

    /// Fetch the first matching row (`LIMIT 1` is applied).
    pub fn find_one(&self) -> OrmResult<Option<Row>> {
        let db = self.require_db()?;
        let stmt = self.clone().limit(1).statement();
        db.get_row(&stmt.sql, &stmt.binds)
    }

    /// Alias of [`Query::find_one`].
    pub fn first(&self) -> OrmResult<Option<Row>> {
        self.find_one()
    }

    pub fn find_all_as<T: FromRow>(&self) -> OrmResult<Vec<T>> {
        self.find_all()?.iter().map(T::from_row).collect()
    }

    pub fn find_one_as<T: FromRow>(&self) -> OrmResult<Option<T>> {
        self.find_one()?.as_ref().map(T::from_row).transpose()
    }

    /// First column of every matching row.
    pub fn find_column(&self) -> OrmResult<Vec<Value>> {
        let db = self.require_db()?;
        let stmt = self.statement();
        db.get_col(&stmt.sql, &stmt.binds)
    }

    /// First column of the first matching row.
    pub fn find_scalar(&self) -> OrmResult<Option<Value>> {
        let db = self.require_db()?;
        let stmt = self.clone().limit(1).statement();
        db.get_one(&stmt.sql, &stmt.binds)
    }

    /// Matching rows keyed by their first column.
    pub fn find_assoc(&self) -> OrmResult<BTreeMap<String, Row>> {
        let db = self.require_db()?;
        let stmt = self.statement();
        db.get_assoc(&stmt.sql, &stmt.binds)
    }

    /// Hydrate every matching row as a persisted record of `M`.
    ///
    /// Without a table, the query reads from the model's table.
    pub fn find_records<M: Model>(&self) -> OrmResult<Vec<Record<M>>> {
        let query = self.for_model::<M>();
        let db = query.require_db()?.untagged();
        Ok(query
            .find_all()?
            .into_iter()
            .map(|row| Record::hydrate(db.clone(), row))
            .collect())
    }

    /// Hydrate the first matching row as a persisted record of `M`.
    pub fn find_record<M: Model>(&self) -> OrmResult<Option<Record<M>>> {
        let query = self.for_model::<M>();
        let db = query.require_db()?.untagged();
        Ok(query.find_one()?.map(|row| Record::hydrate(db, row)))
    }

    fn for_model<M: Model>(&self) -> Cow<'_, Query> {
        if self.source.is_some() {
            Cow::Borrowed(self)
        } else {
            Cow::Owned(self.clone().from(&M::schema().table))
        }
    }

    // ==================== Writes ====================

    /// Update every row matching the conditions with `attributes`.
    ///
    /// Returns `Ok(false)` without contacting storage when the query has no conditions
    /// or `attributes` is empty.
    pub fn update_all(&self, attributes: &Row) -> OrmResult<bool> {
        let db = self.require_db()?;
        let table = self.write_target("update_all")?;
        if !self.has_conditions() {
            return Ok(false);
        }
        db.update(table, attributes, self)
    }

    /// Delete every row matching the conditions. Without conditions nothing is deleted.
    pub fn delete_all(&self) -> OrmResult<bool> {
        let db = self.require_db()?;
        let table = self.write_target("delete_all")?;
        db.delete(table, self)
    }

    fn write_target(&self, op: &str) -> OrmResult<&str> {
        self.table_name()
            .ok_or_else(|| OrmError::config(format!("{op}() needs a table; call from() first")))
    }

    // ==================== Aggregates ====================

    /// Run `FUNC(attr)` over the matching rows and return the scalar.
    ///
    /// `attr` may be `*`, a column, `DISTINCT column` or a `!`-prefixed raw expression.
    pub fn aggregate(&self, func: Aggregate, attr: &str, alias: Option<&str>) -> OrmResult<Value> {
        let db = self.require_db()?;
        let stmt = self.prepare(self.aggregate_statement(func, attr, alias)?);
        Ok(db.get_one(&stmt.sql, &stmt.binds)?.unwrap_or(Value::Null))
    }

    /// `COUNT(attr)`; a missing or non-numeric result counts as 0.
    pub fn count(&self, attr: &str) -> OrmResult<i64> {
        Ok(self
            .aggregate(Aggregate::Count, attr, None)?
            .as_i64()
            .unwrap_or(0))
    }

    pub fn sum(&self, attr: &str) -> OrmResult<Value> {
        self.aggregate(Aggregate::Sum, attr, None)
    }

    pub fn avg(&self, attr: &str) -> OrmResult<Value> {
        self.aggregate(Aggregate::Avg, attr, None)
    }

    pub fn min(&self, attr: &str) -> OrmResult<Value> {
        self.aggregate(Aggregate::Min, attr, None)
    }

    pub fn max(&self, attr: &str) -> OrmResult<Value> {
        self.aggregate(Aggregate::Max, attr, None)
    }

    /// Paginated iteration over the matching rows.
    pub fn collection(&self) -> Collection {
        Collection::new(self.clone())
    }
}
