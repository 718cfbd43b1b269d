use super::{Record, Relations};
use crate::config::DEFAULT_CONNECTION;
use crate::error::OrmError;
use crate::value::{Value, leading_number};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Attribute type applied on write and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Int,
    Bool,
    Float,
    /// Text; byte values stay bytes.
    String,
    /// A JSON array (or object for keyed data).
    Array,
}

impl FromStr for Cast {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(Cast::Int),
            "bool" | "boolean" => Ok(Cast::Bool),
            "float" | "double" | "real" => Ok(Cast::Float),
            "string" | "binary" => Ok(Cast::String),
            "array" => Ok(Cast::Array),
            other => Err(OrmError::config(format!("unknown cast '{other}'"))),
        }
    }
}

impl Cast {
    /// Value returned for an attribute that has never been set.
    pub fn zero(self) -> Value {
        match self {
            Cast::Int => Value::Int(0),
            Cast::Bool => Value::Bool(false),
            Cast::Float => Value::Float(0.0),
            Cast::String => Value::Text(String::new()),
            Cast::Array => Value::Json(serde_json::Value::Array(Vec::new())),
        }
    }

    /// Convert `value` to this type.
    pub fn apply(self, value: Value) -> Value {
        match self {
            Cast::Int => Value::Int(to_int(&value)),
            Cast::Bool => Value::Bool(value.is_truthy()),
            Cast::Float => Value::Float(to_float(&value)),
            Cast::String => match value {
                Value::Text(_) | Value::Bytes(_) => value,
                other => Value::Text(other.to_string()),
            },
            Cast::Array => Value::Json(to_array(value)),
        }
    }

    /// Read-side conversion; a missing value yields [`Cast::zero`].
    pub fn read(self, value: Option<&Value>) -> Value {
        match value {
            Some(v) => self.apply(v.clone()),
            None => self.zero(),
        }
    }
}

fn to_int(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Bool(b) => i64::from(*b),
        Value::Int(i) => *i,
        Value::Float(f) => f.trunc() as i64,
        Value::Text(_) | Value::Bytes(_) | Value::Date(_) | Value::DateTime(_) => {
            leading_number(&value.to_string()).trunc() as i64
        }
        Value::Json(_) => i64::from(value.is_truthy()),
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Text(_) | Value::Bytes(_) | Value::Date(_) | Value::DateTime(_) => {
            leading_number(&value.to_string())
        }
        Value::Json(_) => f64::from(u8::from(value.is_truthy())),
    }
}

fn to_array(value: Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Array(Vec::new()),
        Value::Json(json @ (Json::Array(_) | Json::Object(_))) => json,
        Value::Json(Json::Null) => Json::Array(Vec::new()),
        Value::Json(other) => Json::Array(vec![other]),
        Value::Text(s) => match serde_json::from_str::<Json>(&s) {
            Ok(json @ (Json::Array(_) | Json::Object(_))) => json,
            _ => Json::Array(vec![Json::String(s)]),
        },
        other => Json::Array(vec![other.to_json()]),
    }
}

/// Table mapping and attribute rules of a model.
///
/// ```ignore
/// ModelSchema::new("user")
///     .connection("main")
///     .guarded(&["password_hash"])
///     .alias("mail", "email")
///     .cast("active", Cast::Bool)
///     .cast_named("tags", "array")
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    pub table: String,
    /// Pool connection name; `None` uses the pool default.
    pub connection: Option<String>,
    /// Primary key attribute(s), in order.
    pub primary_key: Vec<String>,
    /// Exclude the primary key from mass assignment.
    pub protect_pk: bool,
    pub guarded: Vec<String>,
    /// Allow-list for mass assignment; empty allows everything not guarded.
    pub fillable: Vec<String>,
    /// Alias name to real attribute name.
    pub aliases: BTreeMap<String, String>,
    pub casts: BTreeMap<String, Cast>,
}

impl ModelSchema {
    /// Schema for `table` with primary key `id`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            connection: None,
            primary_key: vec!["id".to_string()],
            protect_pk: true,
            guarded: Vec::new(),
            fillable: Vec::new(),
            aliases: BTreeMap::new(),
            casts: BTreeMap::new(),
        }
    }

    pub fn connection(mut self, name: impl Into<String>) -> Self {
        self.connection = Some(name.into());
        self
    }

    pub fn primary_key(mut self, key: &str) -> Self {
        self.primary_key = vec![key.to_string()];
        self
    }

    pub fn composite_key(mut self, keys: &[&str]) -> Self {
        self.primary_key = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn protect_pk(mut self, protect: bool) -> Self {
        self.protect_pk = protect;
        self
    }

    pub fn guarded(mut self, attributes: &[&str]) -> Self {
        self.guarded.extend(attributes.iter().map(|a| a.to_string()));
        self
    }

    pub fn fillable(mut self, attributes: &[&str]) -> Self {
        self.fillable.extend(attributes.iter().map(|a| a.to_string()));
        self
    }

    pub fn alias(mut self, alias: &str, attribute: &str) -> Self {
        self.aliases.insert(alias.to_string(), attribute.to_string());
        self
    }

    pub fn cast(mut self, attribute: &str, cast: Cast) -> Self {
        self.casts.insert(attribute.to_string(), cast);
        self
    }

    /// Declare a cast by name (`int`, `bool`, `float`, `string`, `array` and their
    /// synonyms).
    ///
    /// # Panics
    ///
    /// Panics on an unknown cast name. Use [`Cast::from_str`] to handle the error.
    pub fn cast_named(self, attribute: &str, cast: &str) -> Self {
        match cast.parse::<Cast>() {
            Ok(cast) => self.cast(attribute, cast),
            Err(e) => panic!("{}.{attribute}: {e}", self.table),
        }
    }

    /// Connection name in the pool.
    pub fn connection_name(&self) -> &str {
        self.connection.as_deref().unwrap_or(DEFAULT_CONNECTION)
    }

    pub fn is_primary_key(&self, attribute: &str) -> bool {
        self.primary_key.iter().any(|k| k == attribute)
    }

    pub fn is_composite(&self) -> bool {
        self.primary_key.len() > 1
    }

    /// Whether mass assignment skips `attribute`.
    pub fn is_guarded(&self, attribute: &str) -> bool {
        self.guarded.iter().any(|g| g == attribute)
            || (self.protect_pk && self.is_primary_key(attribute))
    }

    /// The real attribute behind `name` (itself unless it is an alias).
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// A database-backed model.
///
/// ```ignore
/// struct User;
///
/// impl Model for User {
///     fn schema() -> ModelSchema {
///         ModelSchema::new("user").cast("active", Cast::Bool)
///     }
///
///     fn validate(user: &mut Record<Self>) -> bool {
///         if user.get("email").is_null() {
///             user.add_error(ValidationError::new("email", ValidationCode::Required, "email is required"));
///         }
///         user.is_valid()
///     }
/// }
/// ```
pub trait Model: Sized + 'static {
    fn schema() -> ModelSchema;

    /// Named relations resolvable with [`Record::get_relation`].
    fn relations() -> Relations<Self> {
        Relations::new()
    }

    /// Runs before every `save` while validation is enabled; `false` aborts the save.
    fn validate(_record: &mut Record<Self>) -> bool {
        true
    }

    /// Runs before the write of `save`; `false` aborts the save.
    fn before_save(_record: &mut Record<Self>) -> bool {
        true
    }

    /// Runs after the write of `save` with its outcome.
    fn after_save(_record: &mut Record<Self>, _saved: bool) {}
}
