//! Condition rendering for WHERE/HAVING clauses.
//!
//! A [`Predicate`] renders to a SQL fragment plus the bind values for its `?`
//! placeholders. A [`ConditionList`] accumulates fragments as a flat token sequence
//! where order is precedence:
//!
//! ```text
//! [Fragment(a = ?)] [Connector(OR)] [Open] [Fragment(b = ?)] [Connector(AND)] [Fragment(c = ?)] [Close]
//! a = ? OR (b = ? AND c = ?)
//! ```
//!
//! A connector is only inserted between two operands: never first, never right after
//! an open parenthesis.

use crate::ident::field;
use crate::value::Value;
use std::fmt;

/// Placeholder used for every bind parameter.
pub const PLACEHOLDER: &str = "?";

/// Logical connector between two conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    pub fn as_str(self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a condition list.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Fragment(String),
    Connector(Logic),
    Open,
    Close,
}

/// A rendered predicate: SQL text and the values for its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// A typed predicate call.
///
/// Attributes are user names (`age`, `u.age`, `!RAW(expr)`); they are turned into
/// qualifier placeholders while rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `attr <op> ?`
    Compare {
        attr: String,
        op: String,
        value: Value,
    },
    /// Raw SQL with its own binds.
    Raw { sql: String, binds: Vec<Value> },
    /// `attr [NOT] IN (?, ...)`; an empty list renders nothing.
    In {
        attr: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// `attr [NOT] LIKE ?`
    Like {
        attr: String,
        pattern: Value,
        negated: bool,
    },
    /// `attr [NOT] BETWEEN ? AND ?`
    Between {
        attr: String,
        start: Value,
        end: Value,
        negated: bool,
    },
    /// `attr >= ?`, `attr <= ?` or both joined by `AND`; nothing when both bounds are absent.
    DateRange {
        attr: String,
        start: Option<Value>,
        end: Option<Value>,
    },
    /// `attr >= ? AND attr < ? + INTERVAL n DAY` (negated: `attr < ? AND attr >= ? + INTERVAL n DAY`).
    DateInterval {
        attr: String,
        start: Value,
        days: i64,
        negated: bool,
    },
    /// `attr IS [NOT] NULL`
    Null { attr: String, negated: bool },
    /// `[NOT ]EXISTS (subquery)`
    Exists { subquery: SqlFragment, negated: bool },
}

impl Predicate {
    /// Render the predicate. `scope` is the alias forced by `with_alias`, if any.
    ///
    /// Returns `None` when the predicate is a no-op (empty `IN` list, date range
    /// without bounds).
    pub fn render(self, scope: Option<&str>) -> Option<SqlFragment> {
        match self {
            Predicate::Compare { attr, op, value } => Some(SqlFragment::new(
                format!("{} {} {PLACEHOLDER}", field(&attr, scope), op.trim()),
                vec![value],
            )),
            Predicate::Raw { sql, binds } => Some(SqlFragment::new(sql, binds)),
            Predicate::In {
                attr,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return None;
                }
                let placeholders = vec![PLACEHOLDER; values.len()].join(", ");
                let not = if negated { "NOT " } else { "" };
                Some(SqlFragment::new(
                    format!("{} {not}IN ({placeholders})", field(&attr, scope)),
                    values,
                ))
            }
            Predicate::Like {
                attr,
                pattern,
                negated,
            } => {
                let not = if negated { "NOT " } else { "" };
                Some(SqlFragment::new(
                    format!("{} {not}LIKE {PLACEHOLDER}", field(&attr, scope)),
                    vec![pattern],
                ))
            }
            Predicate::Between {
                attr,
                start,
                end,
                negated,
            } => {
                let not = if negated { "NOT " } else { "" };
                Some(SqlFragment::new(
                    format!(
                        "{} {not}BETWEEN {PLACEHOLDER} AND {PLACEHOLDER}",
                        field(&attr, scope)
                    ),
                    vec![start, end],
                ))
            }
            Predicate::DateRange { attr, start, end } => {
                let attr = field(&attr, scope);
                match (start, end) {
                    (Some(start), Some(end)) => Some(SqlFragment::new(
                        format!("{attr} >= {PLACEHOLDER} AND {attr} <= {PLACEHOLDER}"),
                        vec![start, end],
                    )),
                    (Some(start), None) => Some(SqlFragment::new(
                        format!("{attr} >= {PLACEHOLDER}"),
                        vec![start],
                    )),
                    (None, Some(end)) => Some(SqlFragment::new(
                        format!("{attr} <= {PLACEHOLDER}"),
                        vec![end],
                    )),
                    (None, None) => None,
                }
            }
            Predicate::DateInterval {
                attr,
                start,
                days,
                negated,
            } => {
                let attr = field(&attr, scope);
                let sql = if negated {
                    format!(
                        "{attr} < {PLACEHOLDER} AND {attr} >= {PLACEHOLDER} + INTERVAL {days} DAY"
                    )
                } else {
                    format!(
                        "{attr} >= {PLACEHOLDER} AND {attr} < {PLACEHOLDER} + INTERVAL {days} DAY"
                    )
                };
                Some(SqlFragment::new(sql, vec![start.clone(), start]))
            }
            Predicate::Null { attr, negated } => {
                let not = if negated { "NOT " } else { "" };
                Some(SqlFragment::new(
                    format!("{} IS {not}NULL", field(&attr, scope)),
                    Vec::new(),
                ))
            }
            Predicate::Exists { subquery, negated } => {
                let not = if negated { "NOT " } else { "" };
                Some(SqlFragment::new(
                    format!("{not}EXISTS ({})", subquery.sql),
                    subquery.binds,
                ))
            }
        }
    }
}

/// An ordered token list plus the binds for its placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionList {
    tokens: Vec<Token>,
    binds: Vec<Value>,
}

/// Position inside a [`ConditionList`], used to roll back an empty group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mark {
    tokens: usize,
    binds: usize,
}

impl ConditionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn binds(&self) -> &[Value] {
        &self.binds
    }

    fn connect(&mut self, logic: Logic) {
        if !matches!(self.tokens.last(), None | Some(Token::Open)) {
            self.tokens.push(Token::Connector(logic));
        }
    }

    /// Append a rendered fragment, connected to the previous operand with `logic`.
    pub fn push(&mut self, fragment: SqlFragment, logic: Logic) {
        self.connect(logic);
        self.tokens.push(Token::Fragment(fragment.sql));
        self.binds.extend(fragment.binds);
    }

    pub(crate) fn mark(&self) -> Mark {
        Mark {
            tokens: self.tokens.len(),
            binds: self.binds.len(),
        }
    }

    /// Open a group; returns the position before the group (and its connector).
    pub(crate) fn open(&mut self, logic: Logic) -> Mark {
        let mark = self.mark();
        self.connect(logic);
        self.tokens.push(Token::Open);
        mark
    }

    /// Close the group opened at `mark`; a group that received no operands is removed.
    pub(crate) fn close(&mut self, mark: Mark) {
        if matches!(self.tokens.last(), Some(Token::Open)) {
            self.tokens.truncate(mark.tokens);
            self.binds.truncate(mark.binds);
        } else {
            self.tokens.push(Token::Close);
        }
    }

    /// Concatenate `other` onto this list, joined by `logic` when both sides are non-empty.
    pub fn merge(&mut self, other: &ConditionList, logic: Logic) {
        if other.is_empty() {
            return;
        }
        self.connect(logic);
        self.tokens.extend(other.tokens.iter().cloned());
        self.binds.extend(other.binds.iter().cloned());
    }

    /// Render the tokens with single spaces, without padding inside parentheses.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        let mut prev: Option<&Token> = None;
        for token in &self.tokens {
            let glued = matches!(prev, None | Some(Token::Open)) || matches!(token, Token::Close);
            if !glued {
                out.push(' ');
            }
            match token {
                Token::Fragment(sql) => out.push_str(sql),
                Token::Connector(logic) => out.push_str(logic.as_str()),
                Token::Open => out.push('('),
                Token::Close => out.push(')'),
            }
            prev = Some(token);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(attr: &str, op: &str, value: impl Into<Value>) -> SqlFragment {
        Predicate::Compare {
            attr: attr.into(),
            op: op.into(),
            value: value.into(),
        }
        .render(None)
        .unwrap()
    }

    #[test]
    fn compare_renders_placeholder() {
        let f = compare("age", ">=", 25);
        assert_eq!(f.sql, "{age} >= ?");
        assert_eq!(f.binds, vec![Value::Int(25)]);
    }

    #[test]
    fn in_list_placeholder_per_value() {
        let f = Predicate::In {
            attr: "id".into(),
            values: vec![1.into(), 2.into(), 3.into()],
            negated: true,
        }
        .render(None)
        .unwrap();
        assert_eq!(f.sql, "{id} NOT IN (?, ?, ?)");
        assert_eq!(f.binds.len(), 3);
    }

    #[test]
    fn empty_in_list_is_noop() {
        let f = Predicate::In {
            attr: "id".into(),
            values: vec![],
            negated: false,
        }
        .render(None);
        assert!(f.is_none());
    }

    #[test]
    fn date_range_omits_missing_bounds() {
        let only_start = Predicate::DateRange {
            attr: "created".into(),
            start: Some("2024-01-01".into()),
            end: None,
        }
        .render(None)
        .unwrap();
        assert_eq!(only_start.sql, "{created} >= ?");

        let only_end = Predicate::DateRange {
            attr: "created".into(),
            start: None,
            end: Some("2024-02-01".into()),
        }
        .render(None)
        .unwrap();
        assert_eq!(only_end.sql, "{created} <= ?");
    }

    #[test]
    fn date_interval_binds_start_twice() {
        let f = Predicate::DateInterval {
            attr: "created".into(),
            start: "2024-01-01".into(),
            days: 7,
            negated: false,
        }
        .render(None)
        .unwrap();
        assert_eq!(f.sql, "{created} >= ? AND {created} < ? + INTERVAL 7 DAY");
        assert_eq!(f.binds, vec![Value::from("2024-01-01"), Value::from("2024-01-01")]);
    }

    #[test]
    fn scope_qualifies_bare_attributes() {
        let f = Predicate::Null {
            attr: "deleted_at".into(),
            negated: true,
        }
        .render(Some("p"))
        .unwrap();
        assert_eq!(f.sql, "{p.deleted_at} IS NOT NULL");
    }

    #[test]
    fn no_connector_first_or_after_open() {
        let mut list = ConditionList::new();
        list.push(compare("a", "=", 1), Logic::Or);
        let mark = list.open(Logic::Or);
        list.push(compare("b", "=", 2), Logic::Or);
        list.push(compare("c", "=", 3), Logic::Or);
        list.close(mark);
        assert_eq!(list.to_sql(), "{a} = ? OR ({b} = ? OR {c} = ?)");
        assert_eq!(list.binds().len(), 3);
    }

    #[test]
    fn empty_group_rolls_back() {
        let mut list = ConditionList::new();
        list.push(compare("a", "=", 1), Logic::And);
        let mark = list.open(Logic::Or);
        list.close(mark);
        assert_eq!(list.to_sql(), "{a} = ?");
        assert_eq!(list.tokens().len(), 1);
    }

    #[test]
    fn merge_inserts_single_connector() {
        let mut left = ConditionList::new();
        left.push(compare("a", "=", 1), Logic::And);
        let mut right = ConditionList::new();
        right.push(compare("b", "=", 2), Logic::And);

        left.merge(&right, Logic::Or);
        assert_eq!(left.to_sql(), "{a} = ? OR {b} = ?");

        let mut empty = ConditionList::new();
        empty.merge(&right, Logic::Or);
        assert_eq!(empty.to_sql(), "{b} = ?");
    }
}
