//! Connection configuration.
//!
//! Connections are declared in TOML, one table per connection name:
//!
//! ```toml
//! default = "main"
//!
//! [connections.main]
//! driver = "mysqli"
//! host = "127.0.0.1"
//! user = "app"
//! pass = "${APP_DB_PASS}"
//! schema = "shop"
//! execute = ["SET NAMES utf8mb4"]
//! debug = false
//! ```
//!
//! `${VAR}` references in string fields are replaced from the environment when the
//! file is loaded.

use crate::error::{OrmError, OrmResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Name used when a model or facade does not name a connection.
pub const DEFAULT_CONNECTION: &str = "main";

/// Settings for one named connection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConnectionConfig {
    /// Driver name handed to the [`Connector`](crate::pool::Connector).
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: Option<String>,
    /// Database (schema) to select after connecting.
    #[serde(default)]
    pub schema: String,
    /// Statements run once, right after the connection is established.
    #[serde(default)]
    pub execute: Vec<String>,
    /// Log every statement with its binds interpolated.
    #[serde(default)]
    pub debug: bool,
}

fn default_driver() -> String {
    "mysqli".to_string()
}

impl ConnectionConfig {
    fn expand_env(&mut self) -> OrmResult<()> {
        self.driver = expand_env_vars(&self.driver)?;
        self.host = expand_env_vars(&self.host)?;
        self.user = expand_env_vars(&self.user)?;
        if let Some(pass) = &self.pass {
            self.pass = Some(expand_env_vars(pass)?);
        }
        self.schema = expand_env_vars(&self.schema)?;
        for sql in &mut self.execute {
            *sql = expand_env_vars(sql)?;
        }
        Ok(())
    }
}

/// All configured connections.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PoolConfig {
    /// Connection used when none is named; falls back to [`DEFAULT_CONNECTION`].
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a connection.
    pub fn with_connection(mut self, name: impl Into<String>, config: ConnectionConfig) -> Self {
        self.connections.insert(name.into(), config);
        self
    }

    /// Parse a TOML document and expand `${VAR}` references.
    pub fn from_toml_str(raw: &str) -> OrmResult<Self> {
        let mut config: PoolConfig = toml::from_str(raw)?;
        config.expand_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrmError::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            OrmError::Config(msg) => {
                OrmError::config(format!("invalid config file {}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// The name of the default connection.
    pub fn default_name(&self) -> &str {
        self.default.as_deref().unwrap_or(DEFAULT_CONNECTION)
    }

    /// Settings for `name`; a missing entry is a configuration error.
    pub fn connection(&self, name: &str) -> OrmResult<&ConnectionConfig> {
        self.connections
            .get(name)
            .ok_or_else(|| OrmError::config(format!("connection '{name}' missing config data")))
    }

    fn expand_env(&mut self) -> OrmResult<()> {
        if let Some(default) = &self.default {
            self.default = Some(expand_env_vars(default)?);
        }
        for conn in self.connections.values_mut() {
            conn.expand_env()?;
        }
        Ok(())
    }

    fn validate(&self) -> OrmResult<()> {
        if let Some(default) = &self.default {
            if !self.connections.contains_key(default) {
                return Err(OrmError::config(format!(
                    "default connection '{default}' is not declared under [connections]"
                )));
            }
        }
        for (name, conn) in &self.connections {
            if conn.driver.trim().is_empty() {
                return Err(OrmError::config(format!("connection '{name}': driver is empty")));
            }
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> OrmResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(OrmError::config(format!(
                    "unterminated env var reference: ${{{key}"
                )));
            }
            if key.is_empty() {
                return Err(OrmError::config("invalid env var reference: ${}"));
            }

            let v = std::env::var(&key).map_err(|_| {
                OrmError::config(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
