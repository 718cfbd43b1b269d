//! Entry point that resolves the connection and table for a builder.
//!
//! ```ignore
//! // Named connection, explicit table
//! let rows = QueryFacade::connection(&pool, "report").table("orders").find_all()?;
//!
//! // Connection and table taken from the model
//! let admins = QueryFacade::model::<User>(&pool)
//!     .build(|q| q.where_eq("role", "admin"))?
//!     .find_records::<User>()?;
//! ```

use crate::db::Db;
use crate::error::OrmResult;
use crate::pool::ConnectionPool;
use crate::query::Query;
use crate::record::Model;
use crate::row::Row;

#[derive(Debug, Clone)]
enum Target<'p> {
    Pool {
        pool: &'p ConnectionPool,
        name: Option<String>,
    },
    Db(Db),
}

/// Lazily resolves a connection (and optionally a table) into a bound [`Query`].
///
/// Nothing is connected until a builder is requested; resolution errors (unknown
/// connection name, failed connect) surface from that call.
#[derive(Debug, Clone)]
pub struct QueryFacade<'p> {
    target: Target<'p>,
    table: Option<String>,
}

impl<'p> QueryFacade<'p> {
    /// Use the pool's default connection.
    pub fn new(pool: &'p ConnectionPool) -> Self {
        Self {
            target: Target::Pool { pool, name: None },
            table: None,
        }
    }

    /// Use the named pool connection.
    pub fn connection(pool: &'p ConnectionPool, name: impl Into<String>) -> Self {
        Self {
            target: Target::Pool {
                pool,
                name: Some(name.into()),
            },
            table: None,
        }
    }

    /// Use the connection and table configured for `M`.
    pub fn model<M: Model>(pool: &'p ConnectionPool) -> Self {
        let schema = M::schema();
        Self {
            target: Target::Pool {
                pool,
                name: Some(schema.connection_name().to_string()),
            },
            table: Some(schema.table),
        }
    }

    /// Use an existing handle.
    pub fn with_db(db: Db) -> Self {
        Self {
            target: Target::Db(db),
            table: None,
        }
    }

    /// Set (or override) the initial table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Resolve the connection.
    pub fn db(&self) -> OrmResult<Db> {
        match &self.target {
            Target::Db(db) => Ok(db.clone()),
            Target::Pool { pool, name: Some(name) } => pool.get(name),
            Target::Pool { pool, name: None } => pool.default_connection(),
        }
    }

    /// A builder bound to the resolved connection, starting from the initial table.
    pub fn query(&self) -> OrmResult<Query> {
        let db = self.db()?;
        let query = match &self.table {
            Some(table) => Query::table(table),
            None => Query::new(),
        };
        Ok(query.on(db))
    }

    /// Resolve, then let `f` shape the builder.
    pub fn build(&self, f: impl FnOnce(Query) -> Query) -> OrmResult<Query> {
        Ok(f(self.query()?))
    }

    pub fn find_all(&self) -> OrmResult<Vec<Row>> {
        self.query()?.find_all()
    }

    pub fn find_one(&self) -> OrmResult<Option<Row>> {
        self.query()?.find_one()
    }

    pub fn count(&self) -> OrmResult<i64> {
        self.query()?.count("*")
    }
}
