//! Active Record: one row with dirty tracking and persistence.
//!
//! A [`Record<M>`] is either *new* (not backed by a row yet) or *persisted*. It only
//! becomes persisted through a successful [`insert`](Record::insert) or by being
//! hydrated from a query result.
//!
//! Writes only send dirty attributes:
//!
//! - on a new record, every non-`NULL` write is dirty;
//! - on a persisted record, a write is dirty when the value differs (loosely, so `"25"`
//!   equals `25`) from the tracked one.
//!
//! ```ignore
//! let mut user = Record::<User>::new(db.clone());
//! user.set("name", "john").set("age", 25);
//! user.save()?;
//!
//! let mut user = Record::<User>::find_by_pk(&db, 1)?.ok_or_else(|| OrmError::not_found("user 1"))?;
//! user.set("age", 26);
//! user.update()?; // UPDATE `user` SET `age` = ? WHERE `id` = ?
//! ```

mod relation;
mod schema;


pub use relation::{Related, Relations};
pub use schema::{Cast, Model, ModelSchema};

use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::pool::ConnectionPool;
use crate::query::Query;
use crate::row::Row;
use crate::validation::{ValidationCode, ValidationError, ValidationErrors};
use crate::value::{FromValue, Value};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Persisted,
}

/// One row of model `M`.
pub struct Record<M: Model> {
    db: Db,
    schema: Rc<ModelSchema>,
    state: State,
    attributes: Row,
    dirty: BTreeSet<String>,
    /// Key values from before a key attribute was reassigned (unprotected keys only).
    previous_pk: Row,
    validation: bool,
    errors: ValidationErrors,
    scenario: Option<String>,
    relations: BTreeMap<String, Related>,
    _model: PhantomData<M>,
}

impl<M: Model> Clone for Record<M> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            schema: Rc::clone(&self.schema),
            state: self.state,
            attributes: self.attributes.clone(),
            dirty: self.dirty.clone(),
            previous_pk: self.previous_pk.clone(),
            validation: self.validation,
            errors: self.errors.clone(),
            scenario: self.scenario.clone(),
            relations: self.relations.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.schema.table)
            .field("state", &self.state)
            .field("attributes", &self.attributes)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl<M: Model> Serialize for Record<M> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.attributes().serialize(serializer)
    }
}

impl<M: Model> Record<M> {
    // ==================== Construction ====================

    /// A new record bound to `db`.
    pub fn new(db: Db) -> Self {
        Self {
            db,
            schema: Rc::new(M::schema()),
            state: State::New,
            attributes: Row::new(),
            dirty: BTreeSet::new(),
            previous_pk: Row::new(),
            validation: true,
            errors: ValidationErrors::default(),
            scenario: None,
            relations: BTreeMap::new(),
            _model: PhantomData,
        }
    }

    /// A new record on the model's configured connection.
    pub fn from_pool(pool: &ConnectionPool) -> OrmResult<Self> {
        let db = pool.get(M::schema().connection_name())?;
        Ok(Self::new(db))
    }

    /// A persisted record holding `row`.
    pub fn hydrate(db: Db, row: Row) -> Self {
        let mut record = Self::new(db);
        record.state = State::Persisted;
        record.attributes = row;
        record
    }

    /// A query on the model's table.
    pub fn query(db: &Db) -> Query {
        Query::table(&M::schema().table).on(db.clone())
    }

    /// Find by single-column primary key.
    pub fn find_by_pk(db: &Db, key: impl Into<Value>) -> OrmResult<Option<Self>> {
        let schema = M::schema();
        let [pk] = schema.primary_key.as_slice() else {
            return Err(OrmError::config(format!(
                "{} has a composite primary key; use find_by_key",
                schema.table
            )));
        };
        Self::query(db).where_eq(pk, key).find_record::<M>()
    }

    /// Find by (possibly composite) primary key; every key attribute must be present.
    pub fn find_by_key(db: &Db, key: &Row) -> OrmResult<Option<Self>> {
        let schema = M::schema();
        let mut query = Self::query(db);
        for pk in &schema.primary_key {
            let value = key.get(pk).ok_or_else(|| {
                OrmError::config(format!("{}: key is missing attribute '{pk}'", schema.table))
            })?;
            query = query.where_eq(pk, value);
        }
        query.find_record::<M>()
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    /// A query on `table` over this record's connection.
    pub fn related(&self, table: &str) -> Query {
        Query::table(table).on(self.db.clone())
    }

    // ==================== Attributes ====================

    /// Read an attribute: aliases are resolved, then the cast (if any) is applied.
    /// Unknown attributes read as `NULL`, or as the cast's zero value.
    pub fn get(&self, name: &str) -> Value {
        let name = self.schema.resolve(name);
        match self.schema.casts.get(name) {
            Some(cast) => cast.read(self.attributes.get(name)),
            None => self.attributes.get(name).cloned().unwrap_or_default(),
        }
    }

    /// Typed read of [`Record::get`].
    pub fn get_as<T: FromValue>(&self, name: &str) -> OrmResult<T> {
        T::from_value(&self.get(name)).map_err(|e| OrmError::decode(name, e))
    }

    /// Write an attribute, applying its cast and updating dirty tracking.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let name = self.schema.resolve(name).to_string();
        let mut value = value.into();
        let written_null = value.is_null();
        if let Some(cast) = self.schema.casts.get(&name) {
            value = cast.apply(value);
        }

        match self.state {
            State::New => {
                if !written_null {
                    self.dirty.insert(name.clone());
                }
            }
            State::Persisted => {
                let current = self.attributes.get(&name).unwrap_or(&Value::Null);
                if !current.loose_eq(&value) {
                    if !self.schema.protect_pk
                        && self.schema.is_primary_key(&name)
                        && !self.previous_pk.contains_key(&name)
                    {
                        self.previous_pk.insert(name.clone(), current.clone());
                    }
                    self.dirty.insert(name.clone());
                }
            }
        }

        self.attributes.insert(name, value);
        self
    }

    /// Mass assignment: aliases are rewritten, guarded attributes (and the primary key
    /// while protected) are dropped, and the fillable allow-list applies when set.
    pub fn fill<I, K, V>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in attributes {
            let name = self.schema.resolve(name.as_ref()).to_string();
            if self.schema.is_guarded(&name) {
                continue;
            }
            if !self.schema.fillable.is_empty() && !self.schema.fillable.contains(&name) {
                continue;
            }
            self.set(&name, value);
        }
        self
    }

    /// All attributes with casts applied.
    pub fn attributes(&self) -> Row {
        self.attributes
            .keys()
            .map(|name| (name.clone(), self.get(name)))
            .collect()
    }

    /// The stored attribute map.
    pub fn raw_attributes(&self) -> &Row {
        &self.attributes
    }

    /// Attributes changed since load or the last successful write.
    pub fn dirty_attributes(&self) -> Row {
        self.dirty
            .iter()
            .filter_map(|name| Some((name.clone(), self.attributes.get(name)?.clone())))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn is_attribute_dirty(&self, name: &str) -> bool {
        self.dirty.contains(self.schema.resolve(name))
    }

    pub fn is_new_record(&self) -> bool {
        self.state == State::New
    }

    /// The primary key value; a JSON object for composite keys, `None` while new.
    pub fn key(&self) -> Option<Value> {
        if self.is_new_record() {
            return None;
        }
        match self.schema.primary_key.as_slice() {
            [pk] => Some(self.get(pk)),
            keys => Some(Value::Json(serde_json::Value::Object(
                keys.iter()
                    .map(|k| (k.clone(), self.get(k).to_json()))
                    .collect(),
            ))),
        }
    }

    /// Condition locating the stored row: previous key values win over current ones.
    fn locate_query(&self) -> Query {
        let mut query = Query::new();
        for pk in &self.schema.primary_key {
            let value = self
                .previous_pk
                .get(pk)
                .or_else(|| self.attributes.get(pk))
                .cloned()
                .unwrap_or_default();
            query = query.where_eq(pk, value);
        }
        query
    }

    /// Condition on the current key values.
    fn key_query(&self) -> Query {
        let mut query = self.related(&self.schema.table);
        for pk in &self.schema.primary_key {
            query = query.where_eq(pk, self.attributes.get(pk).cloned().unwrap_or_default());
        }
        query
    }

    fn written(&mut self) {
        self.dirty.clear();
        self.previous_pk.clear();
        self.refresh();
    }

    fn write_failed(&mut self, op: &str) {
        let reason = self.db.error_message();
        let message = if reason.is_empty() {
            format!("{op} on {} failed", self.schema.table)
        } else {
            format!("{op} on {} failed: {reason}", self.schema.table)
        };
        self.add_error(ValidationError::new("", ValidationCode::Query, message));
    }

    // ==================== Persistence ====================

    /// Insert the dirty attributes as a new row.
    ///
    /// Succeeds without touching storage when nothing is dirty. After a successful
    /// write the record is persisted, a generated single-column key is fetched and the
    /// attributes are reloaded.
    pub fn insert(&mut self) -> OrmResult<bool> {
        let attributes = self.dirty_attributes();
        if attributes.is_empty() {
            return Ok(true);
        }
        if !self.db.insert(&self.schema.table, &attributes)? {
            self.write_failed("insert");
            return Ok(false);
        }

        self.state = State::Persisted;
        if let [pk] = self.schema.primary_key.as_slice() {
            if self.attributes.get(pk).is_none_or(Value::is_null) {
                match self.db.insert_id(&self.schema.table, pk) {
                    Ok(id) if !id.is_null() => {
                        self.attributes.insert(pk.clone(), id);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(
                        target: "adorm",
                        table = %self.schema.table,
                        error = %e,
                        "could not read generated key"
                    ),
                }
            }
        }

        self.written();
        Ok(true)
    }

    /// Write the dirty attributes to the stored row (inserts while new).
    pub fn update(&mut self) -> OrmResult<bool> {
        if self.is_new_record() {
            return self.insert();
        }
        let attributes = self.dirty_attributes();
        if attributes.is_empty() {
            return Ok(true);
        }
        if !self
            .db
            .update(&self.schema.table, &attributes, &self.locate_query())?
        {
            self.write_failed("update");
            return Ok(false);
        }
        self.written();
        Ok(true)
    }

    /// Delete the stored row. New records return `Ok(false)`.
    pub fn delete(&mut self) -> OrmResult<bool> {
        if self.is_new_record() {
            return Ok(false);
        }
        let deleted = self.db.delete(&self.schema.table, &self.locate_query())?;
        if !deleted {
            self.write_failed("delete");
        }
        Ok(deleted)
    }

    /// Reload the attributes by primary key.
    ///
    /// Best effort: failures are logged and leave the record unchanged. Returns whether
    /// the attributes were replaced.
    pub fn refresh(&mut self) -> bool {
        if self.is_new_record() {
            return false;
        }
        match self.key_query().find_one() {
            Ok(Some(row)) => {
                self.attributes = row;
                self.dirty.clear();
                self.relations.clear();
                true
            }
            Ok(None) => {
                tracing::warn!(
                    target: "adorm",
                    table = %self.schema.table,
                    key = ?self.key(),
                    "refresh found no row"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    target: "adorm",
                    table = %self.schema.table,
                    key = ?self.key(),
                    error = %e,
                    "refresh failed"
                );
                false
            }
        }
    }

    /// Validate, then insert or update, bracketed by the model's save hooks.
    pub fn save(&mut self) -> OrmResult<bool> {
        if self.validation && !M::validate(self) {
            return Ok(false);
        }
        if !M::before_save(self) {
            return Ok(false);
        }
        let saved = if self.is_new_record() {
            self.insert()
        } else {
            self.update()
        };
        match saved {
            Ok(saved) => {
                M::after_save(self, saved);
                Ok(saved)
            }
            Err(e) => {
                M::after_save(self, false);
                Err(e)
            }
        }
    }

    /// Whether no other row holds `value` in `attribute`.
    ///
    /// A duplicate adds a `unique` error; a failing query adds a `query` error and
    /// counts as not unique.
    pub fn unique(&mut self, attribute: &str, value: impl Into<Value>) -> bool {
        let attribute = self.schema.resolve(attribute).to_string();
        let attribute = attribute.as_str();
        let value = value.into();
        let mut query = self
            .related(&self.schema.table)
            .where_eq(attribute, value.clone());
        if !self.is_new_record() {
            let keys: Vec<(String, Value)> = self
                .schema
                .primary_key
                .iter()
                .map(|pk| (pk.clone(), self.attributes.get(pk).cloned().unwrap_or_default()))
                .collect();
            query = query.group(|mut q| {
                for (pk, v) in keys {
                    q = q.or_not(&pk, v);
                }
                q
            });
        }

        match query.count("*") {
            Ok(0) => true,
            Ok(_) => {
                self.add_error(
                    ValidationError::new(
                        attribute,
                        ValidationCode::Unique,
                        format!("{attribute} has already been taken"),
                    )
                    .with_metadata("value", value.to_json()),
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    target: "adorm",
                    table = %self.schema.table,
                    attribute = %attribute,
                    error = %e,
                    "uniqueness check failed"
                );
                self.add_error(ValidationError::new(
                    attribute,
                    ValidationCode::Query,
                    e.to_string(),
                ));
                false
            }
        }
    }

    /// Identifier generated by the last insert on this connection.
    pub fn last_insert_id(&self) -> OrmResult<Value> {
        let column = self
            .schema
            .primary_key
            .first()
            .map(String::as_str)
            .unwrap_or("id");
        self.db.insert_id(&self.schema.table, column)
    }

    /// Resolve a named relation, computing it at most once per record.
    pub fn get_relation(&mut self, name: &str) -> OrmResult<&Related> {
        if !self.relations.contains_key(name) {
            let related = M::relations().resolve(name, self).ok_or_else(|| {
                OrmError::config(format!("{} has no relation '{name}'", self.schema.table))
            })??;
            self.relations.insert(name.to_string(), related);
        }
        self.relations
            .get(name)
            .ok_or_else(|| OrmError::config(format!("relation '{name}' was not cached")))
    }

    /// Toggle the `validate` hook during `save`.
    pub fn validation(&mut self, enabled: bool) -> &mut Self {
        self.validation = enabled;
        self
    }

    // ==================== Validation helpers ====================

    /// Add a `required` error for each attribute that is `NULL` or blank text.
    pub fn require(&mut self, attributes: &[&str]) -> bool {
        let mut ok = true;
        for &attribute in attributes {
            let blank = match self.get(attribute) {
                Value::Null => true,
                Value::Text(s) => s.trim().is_empty(),
                _ => false,
            };
            if blank {
                ok = false;
                self.add_error(ValidationError::new(
                    attribute,
                    ValidationCode::Required,
                    format!("{attribute} is required"),
                ));
            }
        }
        ok
    }

    /// Add a `format` error unless the attribute is absent or `check` accepts its text.
    pub fn check_format(
        &mut self,
        attribute: &str,
        description: &str,
        check: impl FnOnce(&str) -> bool,
    ) -> bool {
        let value = self.get(attribute);
        if value.is_null() {
            return true;
        }
        let text = value.to_string();
        if text.is_empty() || check(&text) {
            return true;
        }
        self.add_error(
            ValidationError::new(
                attribute,
                ValidationCode::Format,
                format!("{attribute} is not a valid {description}"),
            )
            .with_metadata("value", text),
        );
        false
    }

    #[cfg(feature = "validate")]
    pub fn validate_email(&mut self, attribute: &str) -> bool {
        self.check_format(attribute, "email address", crate::validate::is_email)
    }

    #[cfg(feature = "validate")]
    pub fn validate_url(&mut self, attribute: &str) -> bool {
        self.check_format(attribute, "URL", crate::validate::is_url)
    }

    /// # Panics
    /// Panics if `pattern` is not a valid regex.
    #[cfg(feature = "validate")]
    pub fn validate_pattern(&mut self, attribute: &str, pattern: &'static str) -> bool {
        self.check_format(attribute, "value", |s| {
            crate::validate::matches_pattern(pattern, s)
        })
    }

    // ==================== Errors ====================

    pub fn add_error(&mut self, error: impl Into<ValidationError>) {
        self.errors.push(error);
    }

    pub fn add_errors<I>(&mut self, errors: I)
    where
        I: IntoIterator,
        I::Item: Into<ValidationError>,
    {
        for error in errors {
            self.errors.push(error);
        }
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_error(&self) -> bool {
        !self.is_valid()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    // ==================== Scenario ====================

    pub fn set_scenario(&mut self, scenario: impl Into<String>) -> &mut Self {
        self.scenario = Some(scenario.into());
        self
    }

    pub fn scenario(&self) -> Option<&str> {
        self.scenario.as_deref()
    }

    /// Whether the current scenario is one of `scenarios`.
    pub fn is_scenario(&self, scenarios: &[&str]) -> bool {
        self.scenario
            .as_deref()
            .is_some_and(|current| scenarios.contains(&current))
    }
}
