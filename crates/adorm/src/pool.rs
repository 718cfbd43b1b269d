//! Named connection registry.
//!
//! A [`ConnectionPool`] owns the [`PoolConfig`] and a [`Connector`] that knows how to
//! open a driver connection. Handles are created on first use and cached by name, so
//! every builder and record asking for `"main"` shares one [`Db`].
//!
//! ```ignore
//! let pool = ConnectionPool::new(PoolConfig::load("db.toml")?, MysqlConnector::default());
//! let db = pool.get("main")?;
//! let rows = Query::table("user").on(db).find_all()?;
//! ```

use crate::client::Connection;
use crate::config::{ConnectionConfig, PoolConfig};
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Opens a driver connection for one configured name.
pub trait Connector {
    fn connect(&self, name: &str, config: &ConnectionConfig) -> OrmResult<Rc<dyn Connection>>;
}

impl<F> Connector for F
where
    F: Fn(&str, &ConnectionConfig) -> OrmResult<Rc<dyn Connection>>,
{
    fn connect(&self, name: &str, config: &ConnectionConfig) -> OrmResult<Rc<dyn Connection>> {
        self(name, config)
    }
}

/// Lazily connected, name-keyed connection handles.
pub struct ConnectionPool {
    config: PoolConfig,
    connector: Box<dyn Connector>,
    connections: RefCell<BTreeMap<String, Db>>,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("connected", &self.connections.borrow().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ConnectionPool {
    pub fn new(config: PoolConfig, connector: impl Connector + 'static) -> Self {
        Self {
            config,
            connector: Box::new(connector),
            connections: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// The handle for `name`, connecting on first use.
    ///
    /// After connecting, the configured `execute` statements run in order and the
    /// `debug` flag is applied. Unknown names are configuration errors.
    pub fn get(&self, name: &str) -> OrmResult<Db> {
        if let Some(db) = self.connections.borrow().get(name) {
            return Ok(db.clone());
        }

        let config = self.config.connection(name)?;
        let conn = self.connector.connect(name, config).map_err(|e| match e {
            OrmError::Connection(msg) => {
                OrmError::Connection(format!("connection '{name}' failed to connect: {msg}"))
            }
            other => other,
        })?;

        let db = Db::from_rc(name, conn);
        db.debug(config.debug);
        for sql in &config.execute {
            db.execute(sql, &[])?;
        }

        tracing::info!(
            target: "adorm",
            connection = %name,
            driver = %config.driver,
            host = %config.host,
            schema = %config.schema,
            "connected"
        );

        self.connections
            .borrow_mut()
            .insert(name.to_string(), db.clone());
        Ok(db)
    }

    /// The handle for the configured default connection.
    pub fn default_connection(&self) -> OrmResult<Db> {
        self.get(self.config.default_name())
    }

    /// Register an existing handle under `name`, replacing any cached one.
    pub fn register(&self, name: impl Into<String>, db: Db) {
        self.connections.borrow_mut().insert(name.into(), db);
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.connections.borrow().contains_key(name)
    }

    /// Drop the cached handle for `name`; the next `get` reconnects.
    pub fn disconnect(&self, name: &str) -> bool {
        self.connections.borrow_mut().remove(name).is_some()
    }
}
