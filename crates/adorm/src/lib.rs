//! # adorm
//!
//! An Active Record ORM with a fluent MySQL-style query builder.
//!
//! ## Features
//!
//! - **Placeholders only**: every value travels as a `?` bind, in SQL order
//! - **Lazy qualification**: bare attributes are qualified with the table alias at render time
//! - **Pluggable driver**: anything implementing [`Connection`] can back the ORM
//! - **Dirty tracking**: records write only the attributes that changed
//! - **Scoped transactions**: strict and smart styles, rolled back on failure or panic
//! - **Query monitoring**: hooks and monitors around every statement, `tracing` SQL logs
//! - **Validation helpers**: required/format checks for model hooks (email, URL and regex
//!   checks behind the default `validate` feature)
//!
//! ## Query builder
//!
//! ```ignore
//! use adorm::{Order, Query};
//!
//! let q = Query::table("user u")
//!     .left_join("profile p", &[("user_id", "id")])
//!     .where_op("age", ">=", 25)
//!     .group(|q| q.where_eq("role", "admin").or_where_eq("role", "owner"))
//!     .order_by("created", Order::Desc)
//!     .limit_per_page(20, 2);
//!
//! // SELECT * FROM `user` AS `u` LEFT JOIN `profile` AS `p` ON `p`.`user_id` = `u`.`id`
//! // WHERE `u`.`age` >= ? AND (`u`.`role` = ? OR `u`.`role` = ?)
//! // ORDER BY `u`.`created` DESC LIMIT 20, 20
//! let rows = q.on(db.clone()).find_all()?;
//! ```
//!
//! ## Active Record
//!
//! ```ignore
//! use adorm::{Cast, Model, ModelSchema, Record};
//!
//! struct User;
//!
//! impl Model for User {
//!     fn schema() -> ModelSchema {
//!         ModelSchema::new("user").cast("active", Cast::Bool)
//!     }
//! }
//!
//! let mut user = Record::<User>::new(db.clone());
//! user.fill([("name", "john"), ("email", "john@example.com")]);
//! user.save()?;
//! ```

pub mod client;
pub mod collection;
pub mod condition;
pub mod config;
pub mod db;
pub mod error;
pub mod facade;
pub mod ident;
pub mod monitor;
pub mod pool;
pub mod query;
pub mod record;
pub mod row;
pub mod transaction;
#[cfg(feature = "validate")]
pub mod validate;
pub mod validation;
pub mod value;

pub use client::{Connection, WriteMode, auto_execute_statement};
pub use collection::{Batches, Collection, Rows};
pub use condition::{ConditionList, Logic, Predicate, SqlFragment, Token};
pub use config::{ConnectionConfig, DEFAULT_CONNECTION, PoolConfig};
pub use db::Db;
pub use error::{OrmError, OrmResult};
pub use facade::QueryFacade;
pub use monitor::{
    HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult, QueryStats, QueryType,
    StatsMonitor, TracingSqlHook,
};
pub use pool::{ConnectionPool, Connector};
pub use query::{Aggregate, JoinKind, Order, Query};
pub use record::{Cast, Model, ModelSchema, Record, Related, Relations};
pub use row::{FromRow, Row, RowExt};
pub use validation::{ValidationCode, ValidationError, ValidationErrors};
pub use value::{FromValue, Value};
