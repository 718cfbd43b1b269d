use super::{Model, Record};
use crate::error::OrmResult;
use crate::row::Row;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Result of resolving a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Row>),
    Many(Vec<Row>),
    Scalar(Value),
}

impl Related {
    pub fn as_one(&self) -> Option<&Row> {
        match self {
            Related::One(row) => row.as_ref(),
            Related::Many(rows) => rows.first(),
            Related::Scalar(_) => None,
        }
    }

    pub fn as_many(&self) -> &[Row] {
        match self {
            Related::One(Some(row)) => std::slice::from_ref(row),
            Related::Many(rows) => rows,
            _ => &[],
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Related::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

type Resolver<M> = Box<dyn Fn(&Record<M>) -> OrmResult<Related>>;

/// Named relation resolvers of a model.
///
/// ```ignore
/// fn relations() -> Relations<Self> {
///     Relations::new()
///         .has_many("posts", "post", "user_id", "id")
///         .belongs_to("team", "team", "team_id", "id")
///         .relation("post_count", |user| {
///             user.related("post").where_eq("user_id", user.get("id")).count("*")
///                 .map(|n| Related::Scalar(n.into()))
///         })
/// }
/// ```
pub struct Relations<M: Model> {
    resolvers: BTreeMap<String, Resolver<M>>,
}

impl<M: Model> Default for Relations<M> {
    fn default() -> Self {
        Self {
            resolvers: BTreeMap::new(),
        }
    }
}

impl<M: Model> fmt::Debug for Relations<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.resolvers.keys()).finish()
    }
}

impl<M: Model> Relations<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom resolver.
    pub fn relation<F>(mut self, name: &str, resolver: F) -> Self
    where
        F: Fn(&Record<M>) -> OrmResult<Related> + 'static,
    {
        self.resolvers.insert(name.to_string(), Box::new(resolver));
        self
    }

    /// Rows of `table` whose `foreign_key` equals this record's `local_key`.
    pub fn has_many(self, name: &str, table: &str, foreign_key: &str, local_key: &str) -> Self {
        let (table, foreign_key, local_key) = owned(table, foreign_key, local_key);
        self.relation(name, move |record| {
            record
                .related(&table)
                .where_eq(&foreign_key, record.get(&local_key))
                .find_all()
                .map(Related::Many)
        })
    }

    /// The row of `table` whose `foreign_key` equals this record's `local_key`.
    pub fn has_one(self, name: &str, table: &str, foreign_key: &str, local_key: &str) -> Self {
        let (table, foreign_key, local_key) = owned(table, foreign_key, local_key);
        self.relation(name, move |record| {
            record
                .related(&table)
                .where_eq(&foreign_key, record.get(&local_key))
                .find_one()
                .map(Related::One)
        })
    }

    /// The row of `table` whose `owner_key` equals this record's `foreign_key`.
    pub fn belongs_to(self, name: &str, table: &str, foreign_key: &str, owner_key: &str) -> Self {
        let (table, foreign_key, owner_key) = owned(table, foreign_key, owner_key);
        self.relation(name, move |record| {
            record
                .related(&table)
                .where_eq(&owner_key, record.get(&foreign_key))
                .find_one()
                .map(Related::One)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }

    pub(crate) fn resolve(&self, name: &str, record: &Record<M>) -> Option<OrmResult<Related>> {
        self.resolvers.get(name).map(|resolver| resolver(record))
    }
}

fn owned(a: &str, b: &str, c: &str) -> (String, String, String) {
    (a.to_string(), b.to_string(), c.to_string())
}
