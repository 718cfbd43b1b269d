use super::{Aggregate, Query, Source};
use crate::condition::SqlFragment;
use crate::error::{OrmError, OrmResult};
use crate::ident::{field, map_qualifiers, quote_ident};
use crate::value::Value;

impl Query {
    /// The FROM target, or `None` when no table is set.
    pub(super) fn from_sql(&self) -> Option<String> {
        match self.source.as_ref()? {
            Source::Table(table) if table.name.is_empty() => None,
            Source::Table(table) => Some(table.to_sql()),
            Source::Subquery { alias, sql, .. } => Some(format!("({sql}) AS {}", quote_ident(alias))),
        }
    }

    fn source_binds(&self) -> &[Value] {
        match &self.source {
            Some(Source::Subquery { binds, .. }) => binds,
            _ => &[],
        }
    }

    /// Whether a render skips SELECT/FROM/JOIN. Decided per render, never stored.
    pub(super) fn renders_condition_only(&self, forced: bool) -> bool {
        forced || self.condition_only || self.from_sql().is_none()
    }

    pub(super) fn binds_for(&self, condition_only: bool) -> Vec<Value> {
        let mut binds = Vec::new();
        if !condition_only {
            binds.extend_from_slice(self.source_binds());
        }
        binds.extend_from_slice(self.conditions.binds());
        binds.extend_from_slice(self.having.binds());
        binds
    }

    pub(super) fn build_sql(&self, force_condition_only: bool) -> String {
        self.build_sql_qualified(force_condition_only, self.alias())
    }

    pub(super) fn build_sql_qualified(
        &self,
        force_condition_only: bool,
        qualifier: Option<&str>,
    ) -> String {
        let condition_only = self.renders_condition_only(force_condition_only);
        let mut parts: Vec<String> = Vec::new();

        if !condition_only {
            if let Some(from) = self.from_sql() {
                let columns = if self.selects.is_empty() {
                    "*".to_string()
                } else {
                    self.selects.join(", ")
                };
                parts.push(format!("SELECT {columns} FROM {from}"));
            }
            if !self.joins.is_empty() {
                parts.push(self.joins.join(" "));
            }
        }

        if !self.conditions.is_empty() {
            let conditions = self.conditions.to_sql();
            if condition_only {
                parts.push(conditions);
            } else {
                parts.push(format!("WHERE {conditions}"));
            }
        }

        if !self.group_bys.is_empty() {
            parts.push(format!("GROUP BY {}", self.group_bys.join(", ")));
        }
        if !self.having.is_empty() {
            parts.push(format!("HAVING {}", self.having.to_sql()));
        }
        if !self.order_bys.is_empty() {
            parts.push(format!("ORDER BY {}", self.order_bys.join(", ")));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) if offset > 0 => {
                parts.push(format!("LIMIT {offset}, {limit}"));
            }
            (Some(limit), _) => parts.push(format!("LIMIT {limit}")),
            _ => {}
        }

        map_qualifiers(&parts.join(" "), qualifier)
    }

    /// `SELECT FUNC(attr) [AS alias] FROM ... [JOIN ...] [WHERE ...]`.
    ///
    /// Projection, grouping, ordering and limits of the builder are ignored.
    pub(super) fn aggregate_statement(
        &self,
        func: Aggregate,
        attr: &str,
        alias: Option<&str>,
    ) -> OrmResult<SqlFragment> {
        let from = self.from_sql().ok_or_else(|| {
            OrmError::config(format!("{}() needs a table; call from() first", func.name()))
        })?;

        let mut sql = format!(
            "SELECT {}({})",
            func.as_str(),
            aggregate_target(attr, self.scope.as_deref())
        );
        if let Some(alias) = alias {
            sql.push_str(" AS ");
            sql.push_str(&quote_ident(alias));
        }
        sql.push_str(" FROM ");
        sql.push_str(&from);
        if !self.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&self.joins.join(" "));
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.to_sql());
        }

        let mut binds = self.source_binds().to_vec();
        binds.extend_from_slice(self.conditions.binds());
        Ok(SqlFragment::new(map_qualifiers(&sql, self.alias()), binds))
    }
}

fn aggregate_target(attr: &str, scope: Option<&str>) -> String {
    let attr = attr.trim();
    if attr == "*" {
        return "*".to_string();
    }
    let distinct = attr
        .get(..9)
        .filter(|prefix| prefix.eq_ignore_ascii_case("DISTINCT "))
        .map(|_| attr[9..].trim_start());
    match distinct {
        Some(inner) => format!("DISTINCT {}", field(inner, scope)),
        None => field(attr, scope),
    }
}

/// Replace each `?` in `sql` with the next bind rendered as a literal.
///
/// For logs and debugging only: strings are wrapped in single quotes without any
/// escaping. Placeholders without a matching bind stay `?`; surplus binds are ignored.
pub(crate) fn interpolate(sql: &str, binds: &[Value]) -> String {
    if binds.is_empty() {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + binds.len() * 8);
    let mut values = binds.iter();
    for ch in sql.chars() {
        if ch == '?' {
            match values.next() {
                Some(value) => out.push_str(&value.debug_literal()),
                None => out.push('?'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}
