//! Fluent SELECT builder with `?` placeholders and backtick-quoted identifiers.
//!
//! A [`Query`] accumulates projection, joins, conditions, grouping, ordering and
//! limits, and renders them into one SQL string plus the ordered bind list:
//!
//! ```ignore
//! use adorm::Query;
//!
//! let q = Query::table("user")
//!     .where_op("age", ">=", 25)
//!     .where_eq("name", "john");
//!
//! assert_eq!(
//!     q.to_sql(),
//!     "SELECT * FROM `user` WHERE `user`.`age` >= ? AND `user`.`name` = ?"
//! );
//! assert_eq!(q.binds(), vec![25.into(), "john".into()]);
//! ```
//!
//! Bare attribute names are qualified with the table alias at render time. Prefix an
//! attribute with `!` to pass it through untouched, or write `{t.col}` inside raw SQL to
//! have it qualified.
//!
//! Builders are consumed by each call and returned, so a `Query` has a single owner at
//! any time. Clone it to branch.

mod exec;
mod render;


pub use exec::Aggregate;
pub(crate) use render::interpolate;

use crate::condition::{ConditionList, Logic, Predicate, SqlFragment};
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::ident::{TableRef, field, qualify};
use crate::value::Value;
use std::cell::OnceCell;
use std::fmt;

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Join flavor for [`Query::join_as`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
    LeftOuter,
    RightOuter,
}

impl JoinKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Cross => "CROSS JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
            JoinKind::RightOuter => "RIGHT OUTER JOIN",
        }
    }
}

/// What the FROM clause reads.
#[derive(Debug, Clone, PartialEq)]
enum Source {
    Table(TableRef),
    Subquery {
        alias: String,
        sql: String,
        binds: Vec<Value>,
    },
}

/// Fluent SELECT builder.
#[derive(Debug, Clone, Default)]
pub struct Query {
    db: Option<Db>,
    source: Option<Source>,
    selects: Vec<String>,
    joins: Vec<String>,
    conditions: ConditionList,
    group_bys: Vec<String>,
    having: ConditionList,
    order_bys: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    /// Alias forced onto bare attributes inside `with_alias`.
    scope: Option<String>,
    condition_only: bool,
    complete_sql: bool,
    debug: bool,
    tag: Option<String>,
    /// Rendered SQL, cleared by every mutating call.
    rendered: OnceCell<String>,
}

impl Query {
    /// Create an empty builder (renders condition-only until a table is set).
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `Query::new().from(table)`.
    pub fn table(table: &str) -> Self {
        Self::new().from(table)
    }

    /// Bind the connection used by terminal operations.
    pub fn on(mut self, db: Db) -> Self {
        self.db = Some(db);
        self
    }

    /// Name the statements this query runs, for hooks and monitors.
    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    /// The bound connection, if any.
    pub fn db(&self) -> Option<&Db> {
        self.db.as_ref()
    }

    fn touch(&mut self) {
        self.rendered.take();
    }

    // ==================== FROM ====================

    /// Set the table: `"user"`, `"user u"` or `"user AS u"`.
    pub fn from(mut self, table: &str) -> Self {
        self.source = Some(Source::Table(TableRef::parse(table)));
        self.touch();
        self
    }

    /// Select from a sub-query: `(<sql>) AS alias`. Its binds precede all others.
    pub fn from_subquery(self, alias: &str, subquery: &Query) -> Self {
        self.from_raw(alias, subquery.to_sql(), subquery.binds())
    }

    /// Select from a raw sub-query string with its binds.
    pub fn from_raw(mut self, alias: &str, sql: impl Into<String>, binds: Vec<Value>) -> Self {
        self.source = Some(Source::Subquery {
            alias: alias.to_string(),
            sql: sql.into(),
            binds,
        });
        self.touch();
        self
    }

    // ==================== SELECT ====================

    /// Append columns to the projection; bare names are qualified.
    pub fn select(mut self, columns: &[&str]) -> Self {
        let scope = self.scope.clone();
        self.selects
            .extend(columns.iter().map(|c| field(c, scope.as_deref())));
        self.touch();
        self
    }

    /// Append a raw projection expression (`{attr}` placeholders are still qualified).
    pub fn select_raw(mut self, sql: &str) -> Self {
        self.selects.push(sql.to_string());
        self.touch();
        self
    }

    // ==================== JOIN ====================

    /// Add a join. `on` pairs are `(foreign, local)`: the foreign column belongs to the
    /// joined table, the local one is qualified like any other attribute.
    pub fn join_as(mut self, kind: JoinKind, table: &str, on: &[(&str, &str)]) -> Self {
        let joined = TableRef::parse(table);
        let mut clause = format!("{} {}", kind.as_str(), joined.to_sql());
        if !on.is_empty() {
            let predicates: Vec<String> = on
                .iter()
                .map(|(foreign, local)| {
                    format!(
                        "{} = {}",
                        qualify(Some(joined.qualifier()), foreign),
                        field(local, self.scope.as_deref())
                    )
                })
                .collect();
            clause.push_str(" ON ");
            clause.push_str(&predicates.join(" AND "));
        }
        self.joins.push(clause);
        self.touch();
        self
    }

    pub fn join(self, table: &str, on: &[(&str, &str)]) -> Self {
        self.join_as(JoinKind::Inner, table, on)
    }

    pub fn left_join(self, table: &str, on: &[(&str, &str)]) -> Self {
        self.join_as(JoinKind::Left, table, on)
    }

    pub fn right_join(self, table: &str, on: &[(&str, &str)]) -> Self {
        self.join_as(JoinKind::Right, table, on)
    }

    pub fn cross_join(self, table: &str) -> Self {
        self.join_as(JoinKind::Cross, table, &[])
    }

    pub fn left_outer_join(self, table: &str, on: &[(&str, &str)]) -> Self {
        self.join_as(JoinKind::LeftOuter, table, on)
    }

    pub fn right_outer_join(self, table: &str, on: &[(&str, &str)]) -> Self {
        self.join_as(JoinKind::RightOuter, table, on)
    }

    // ==================== WHERE ====================

    /// Add a predicate to the WHERE clause. No-op predicates add nothing.
    pub fn condition(mut self, predicate: Predicate, logic: Logic) -> Self {
        if let Some(fragment) = predicate.render(self.scope.as_deref()) {
            self.conditions.push(fragment, logic);
            self.touch();
        }
        self
    }

    /// `attr <op> ?`
    pub fn where_op(self, attr: &str, op: &str, value: impl Into<Value>) -> Self {
        self.condition(compare(attr, op, value), Logic::And)
    }

    pub fn or_where_op(self, attr: &str, op: &str, value: impl Into<Value>) -> Self {
        self.condition(compare(attr, op, value), Logic::Or)
    }

    /// `attr = ?`
    pub fn where_eq(self, attr: &str, value: impl Into<Value>) -> Self {
        self.where_op(attr, "=", value)
    }

    pub fn or_where_eq(self, attr: &str, value: impl Into<Value>) -> Self {
        self.or_where_op(attr, "=", value)
    }

    /// `attr != ?`
    pub fn not(self, attr: &str, value: impl Into<Value>) -> Self {
        self.where_op(attr, "!=", value)
    }

    pub fn or_not(self, attr: &str, value: impl Into<Value>) -> Self {
        self.or_where_op(attr, "!=", value)
    }

    /// Raw SQL with its binds, e.g. `where_raw("{age} > ? OR {vip} = 1", vec![18.into()])`.
    pub fn where_raw(self, sql: &str, binds: Vec<Value>) -> Self {
        self.condition(raw(sql, binds), Logic::And)
    }

    pub fn or_where_raw(self, sql: &str, binds: Vec<Value>) -> Self {
        self.condition(raw(sql, binds), Logic::Or)
    }

    /// `attr IN (?, ...)`; an empty list adds nothing.
    pub fn in_list<V: Into<Value>>(self, attr: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.condition(in_list(attr, values, false), Logic::And)
    }

    pub fn or_in_list<V: Into<Value>>(
        self,
        attr: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.condition(in_list(attr, values, false), Logic::Or)
    }

    /// `attr NOT IN (?, ...)`; an empty list adds nothing.
    pub fn not_in<V: Into<Value>>(self, attr: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.condition(in_list(attr, values, true), Logic::And)
    }

    pub fn or_not_in<V: Into<Value>>(self, attr: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.condition(in_list(attr, values, true), Logic::Or)
    }

    pub fn like(self, attr: &str, pattern: impl Into<Value>) -> Self {
        self.condition(like(attr, pattern, false), Logic::And)
    }

    pub fn or_like(self, attr: &str, pattern: impl Into<Value>) -> Self {
        self.condition(like(attr, pattern, false), Logic::Or)
    }

    pub fn not_like(self, attr: &str, pattern: impl Into<Value>) -> Self {
        self.condition(like(attr, pattern, true), Logic::And)
    }

    pub fn or_not_like(self, attr: &str, pattern: impl Into<Value>) -> Self {
        self.condition(like(attr, pattern, true), Logic::Or)
    }

    pub fn between(self, attr: &str, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        self.condition(between(attr, start, end, false), Logic::And)
    }

    pub fn or_between(self, attr: &str, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        self.condition(between(attr, start, end, false), Logic::Or)
    }

    pub fn not_between(self, attr: &str, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        self.condition(between(attr, start, end, true), Logic::And)
    }

    pub fn or_not_between(
        self,
        attr: &str,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        self.condition(between(attr, start, end, true), Logic::Or)
    }

    /// `attr >= start AND attr <= end`; a `None` bound drops its half, both `None` adds nothing.
    pub fn between_date(
        self,
        attr: &str,
        start: Option<impl Into<Value>>,
        end: Option<impl Into<Value>>,
    ) -> Self {
        self.condition(date_range(attr, start, end), Logic::And)
    }

    pub fn or_between_date(
        self,
        attr: &str,
        start: Option<impl Into<Value>>,
        end: Option<impl Into<Value>>,
    ) -> Self {
        self.condition(date_range(attr, start, end), Logic::Or)
    }

    /// `attr >= start AND attr < start + INTERVAL days DAY`
    pub fn between_date_interval(self, attr: &str, start: impl Into<Value>, days: i64) -> Self {
        self.condition(date_interval(attr, start, days, false), Logic::And)
    }

    pub fn or_between_date_interval(self, attr: &str, start: impl Into<Value>, days: i64) -> Self {
        self.condition(date_interval(attr, start, days, false), Logic::Or)
    }

    /// `attr < start AND attr >= start + INTERVAL days DAY`
    pub fn not_between_date_interval(self, attr: &str, start: impl Into<Value>, days: i64) -> Self {
        self.condition(date_interval(attr, start, days, true), Logic::And)
    }

    pub fn or_not_between_date_interval(
        self,
        attr: &str,
        start: impl Into<Value>,
        days: i64,
    ) -> Self {
        self.condition(date_interval(attr, start, days, true), Logic::Or)
    }

    pub fn is_null(self, attr: &str) -> Self {
        self.condition(null(attr, false), Logic::And)
    }

    pub fn or_is_null(self, attr: &str) -> Self {
        self.condition(null(attr, false), Logic::Or)
    }

    pub fn not_null(self, attr: &str) -> Self {
        self.condition(null(attr, true), Logic::And)
    }

    pub fn or_not_null(self, attr: &str) -> Self {
        self.condition(null(attr, true), Logic::Or)
    }

    /// `EXISTS (<subquery>)`; the sub-query's binds follow those already added.
    pub fn exists(self, subquery: &Query) -> Self {
        self.condition(exists(subquery, false), Logic::And)
    }

    pub fn or_exists(self, subquery: &Query) -> Self {
        self.condition(exists(subquery, false), Logic::Or)
    }

    pub fn not_exists(self, subquery: &Query) -> Self {
        self.condition(exists(subquery, true), Logic::And)
    }

    pub fn or_not_exists(self, subquery: &Query) -> Self {
        self.condition(exists(subquery, true), Logic::Or)
    }

    /// Parenthesize the conditions added by `f`, joined to the previous ones with AND.
    ///
    /// ```ignore
    /// Query::table("user")
    ///     .where_eq("active", 1)
    ///     .group(|q| q.where_eq("role", "admin").or_where_eq("role", "owner"));
    /// // ... WHERE `user`.`active` = ? AND (`user`.`role` = ? OR `user`.`role` = ?)
    /// ```
    pub fn group(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.group_with(Logic::And, f)
    }

    /// Parenthesize the conditions added by `f`, joined to the previous ones with OR.
    pub fn or_group(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.group_with(Logic::Or, f)
    }

    fn group_with(mut self, logic: Logic, f: impl FnOnce(Self) -> Self) -> Self {
        let mark = self.conditions.open(logic);
        let mut query = f(self);
        query.conditions.close(mark);
        query.touch();
        query
    }

    /// Qualify bare attributes written inside `f` with `alias` instead of the table alias.
    pub fn with_alias(mut self, alias: &str, f: impl FnOnce(Self) -> Self) -> Self {
        let saved = self.scope.replace(alias.to_string());
        let mut query = f(self);
        query.scope = saved;
        query
    }

    /// Let `f` add clauses from `data` (typically optional filter input).
    ///
    /// ```ignore
    /// let q = Query::table("user").apply(form.status.as_deref(), |q, status| match status {
    ///     Some(s) => q.where_eq("status", s),
    ///     None => q,
    /// });
    /// ```
    pub fn apply<T>(self, data: T, f: impl FnOnce(Self, T) -> Self) -> Self {
        f(self, data)
    }

    // ==================== GROUP BY / HAVING ====================

    pub fn group_by(mut self, columns: &[&str]) -> Self {
        let scope = self.scope.clone();
        self.group_bys
            .extend(columns.iter().map(|c| field(c, scope.as_deref())));
        self.touch();
        self
    }

    fn having_condition(mut self, predicate: Predicate, logic: Logic) -> Self {
        if let Some(fragment) = predicate.render(self.scope.as_deref()) {
            self.having.push(fragment, logic);
            self.touch();
        }
        self
    }

    pub fn having_op(self, attr: &str, op: &str, value: impl Into<Value>) -> Self {
        self.having_condition(compare(attr, op, value), Logic::And)
    }

    pub fn or_having_op(self, attr: &str, op: &str, value: impl Into<Value>) -> Self {
        self.having_condition(compare(attr, op, value), Logic::Or)
    }

    pub fn having_raw(self, sql: &str, binds: Vec<Value>) -> Self {
        self.having_condition(raw(sql, binds), Logic::And)
    }

    pub fn or_having_raw(self, sql: &str, binds: Vec<Value>) -> Self {
        self.having_condition(raw(sql, binds), Logic::Or)
    }

    // ==================== ORDER BY / LIMIT ====================

    pub fn order_by(mut self, attr: &str, order: Order) -> Self {
        let column = field(attr, self.scope.as_deref());
        self.order_bys.push(format!("{column} {}", order.as_str()));
        self.touch();
        self
    }

    /// Raw ORDER BY expression, e.g. `order_by_raw("FIELD({status}, 'new', 'open')")`.
    pub fn order_by_raw(mut self, sql: &str) -> Self {
        self.order_bys.push(sql.to_string());
        self.touch();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self.touch();
        self
    }

    /// Rows to skip; only rendered together with a limit.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self.touch();
        self
    }

    /// Limit to page `page` (1-based) of `limit` rows.
    pub fn limit_per_page(self, limit: u64, page: u64) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(limit);
        self.limit(limit).offset(offset)
    }

    // ==================== Merge ====================

    /// AND-merge the clauses of `other` into this query.
    ///
    /// Both queries must target the same table. Merging a query on a different table
    /// leaves this one unchanged and logs a warning; use [`Query::try_merge`] to get an
    /// error instead.
    pub fn merge(self, other: &Query) -> Self {
        self.merge_with(other, Logic::And)
    }

    /// OR-merge the clauses of `other` into this query. See [`Query::merge`].
    pub fn or_merge(self, other: &Query) -> Self {
        self.merge_with(other, Logic::Or)
    }

    /// Merge `other`, failing with [`OrmError::TableMismatch`] on different tables.
    pub fn try_merge(self, other: &Query, logic: Logic) -> OrmResult<Self> {
        if !self.same_table(other) {
            return Err(OrmError::TableMismatch {
                left: self.from_sql().unwrap_or_default(),
                right: other.from_sql().unwrap_or_default(),
            });
        }
        Ok(self.merge_unchecked(other, logic))
    }

    fn merge_with(self, other: &Query, logic: Logic) -> Self {
        if !self.same_table(other) {
            tracing::warn!(
                target: "adorm",
                left = %self.from_sql().unwrap_or_default(),
                right = %other.from_sql().unwrap_or_default(),
                "ignoring merge of queries on different tables"
            );
            return self;
        }
        self.merge_unchecked(other, logic)
    }

    fn same_table(&self, other: &Query) -> bool {
        self.from_sql() == other.from_sql()
    }

    fn merge_unchecked(mut self, other: &Query, logic: Logic) -> Self {
        self.selects.extend(other.selects.iter().cloned());
        self.joins.extend(other.joins.iter().cloned());
        self.conditions.merge(&other.conditions, logic);
        self.group_bys.extend(other.group_bys.iter().cloned());
        self.having.merge(&other.having, logic);
        self.order_bys.extend(other.order_bys.iter().cloned());
        self.touch();
        self
    }

    // ==================== Flags ====================

    /// Render only the clauses after FROM (no SELECT/FROM/JOIN, no `WHERE` keyword).
    pub fn condition_only(mut self, enabled: bool) -> Self {
        self.condition_only = enabled;
        self.touch();
        self
    }

    /// Execute terminal reads with the binds interpolated into the SQL text.
    ///
    /// Interpolation quotes strings without escaping. Never enable this for queries
    /// carrying untrusted input.
    pub fn use_complete_sql(mut self, enabled: bool) -> Self {
        self.complete_sql = enabled;
        self
    }

    /// Log the interpolated SQL before every terminal operation.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    // ==================== Inspection ====================

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// The table name (without alias) when selecting from a table.
    pub fn table_name(&self) -> Option<&str> {
        match &self.source {
            Some(Source::Table(table)) => Some(&table.name),
            _ => None,
        }
    }

    /// The alias bare attributes are qualified with.
    pub fn alias(&self) -> Option<&str> {
        match &self.source {
            Some(Source::Table(table)) => Some(table.qualifier()),
            Some(Source::Subquery { alias, .. }) => Some(alias),
            None => None,
        }
    }

    /// The rendered SQL, cached until the next mutating call.
    pub fn sql(&self) -> &str {
        self.rendered.get_or_init(|| self.build_sql(false))
    }

    pub fn to_sql(&self) -> String {
        self.sql().to_string()
    }

    /// Bind values in placeholder order for [`Query::sql`].
    pub fn binds(&self) -> Vec<Value> {
        self.binds_for(self.renders_condition_only(false))
    }

    /// Conditions and trailing clauses without `SELECT`/`FROM`/`WHERE`.
    pub fn condition_sql(&self) -> String {
        self.build_sql(true)
    }

    /// [`Query::condition_sql`] together with its binds.
    pub fn condition_fragment(&self) -> SqlFragment {
        SqlFragment::new(self.build_sql(true), self.binds_for(true))
    }

    /// Condition-only SQL for UPDATE/DELETE targets.
    ///
    /// Write statements name the bare table, so bare attributes qualify with the table
    /// name rather than its alias.
    pub fn write_condition_fragment(&self) -> SqlFragment {
        let qualifier = match &self.source {
            Some(Source::Table(table)) if !table.name.is_empty() => {
                Some(table.name.rsplit('.').next().unwrap_or(&table.name))
            }
            _ => self.alias(),
        };
        SqlFragment::new(self.build_sql_qualified(true, qualifier), self.binds_for(true))
    }

    /// The SQL with every `?` replaced by its bind value. For logs only: string values
    /// are quoted without escaping.
    pub fn complete_sql(&self) -> String {
        interpolate(self.sql(), &self.binds())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

// ==================== Predicate constructors ====================

fn compare(attr: &str, op: &str, value: impl Into<Value>) -> Predicate {
    Predicate::Compare {
        attr: attr.to_string(),
        op: op.to_string(),
        value: value.into(),
    }
}

fn raw(sql: &str, binds: Vec<Value>) -> Predicate {
    Predicate::Raw {
        sql: sql.to_string(),
        binds,
    }
}

fn in_list<V: Into<Value>>(
    attr: &str,
    values: impl IntoIterator<Item = V>,
    negated: bool,
) -> Predicate {
    Predicate::In {
        attr: attr.to_string(),
        values: values.into_iter().map(Into::into).collect(),
        negated,
    }
}

fn like(attr: &str, pattern: impl Into<Value>, negated: bool) -> Predicate {
    Predicate::Like {
        attr: attr.to_string(),
        pattern: pattern.into(),
        negated,
    }
}

fn between(attr: &str, start: impl Into<Value>, end: impl Into<Value>, negated: bool) -> Predicate {
    Predicate::Between {
        attr: attr.to_string(),
        start: start.into(),
        end: end.into(),
        negated,
    }
}

fn date_range(
    attr: &str,
    start: Option<impl Into<Value>>,
    end: Option<impl Into<Value>>,
) -> Predicate {
    Predicate::DateRange {
        attr: attr.to_string(),
        start: start.map(Into::into),
        end: end.map(Into::into),
    }
}

fn date_interval(attr: &str, start: impl Into<Value>, days: i64, negated: bool) -> Predicate {
    Predicate::DateInterval {
        attr: attr.to_string(),
        start: start.into(),
        days,
        negated,
    }
}

fn null(attr: &str, negated: bool) -> Predicate {
    Predicate::Null {
        attr: attr.to_string(),
        negated,
    }
}

fn exists(subquery: &Query, negated: bool) -> Predicate {
    Predicate::Exists {
        subquery: SqlFragment::new(subquery.to_sql(), subquery.binds()),
        negated,
    }
}
