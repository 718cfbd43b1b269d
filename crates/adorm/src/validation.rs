//! Validation errors collected on records.
//!
//! Persistence and validation failures are accumulated as [`ValidationError`]s on the
//! record instead of being raised.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A machine-friendly validation code.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationCode {
    Required,
    /// Another row already holds the value.
    Unique,
    /// A statement run on behalf of the record failed.
    Query,
    /// The value does not have the expected shape (email, URL, pattern).
    Format,
    Custom(String),
}

impl ValidationCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::Unique => "unique",
            Self::Query => "query",
            Self::Format => "format",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl Serialize for ValidationCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A single validation error. `field` is empty for record-level messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub code: ValidationCode,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// A record-level message without a field.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("", ValidationCode::Custom("custom".to_string()), message)
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        Self::message(message)
    }
}

impl From<String> for ValidationError {
    fn from(message: String) -> Self {
        Self::message(message)
    }
}

/// A collection of validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub items: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn push(&mut self, err: impl Into<ValidationError>) {
        self.items.push(err.into());
    }

    pub fn extend(&mut self, other: Self) {
        self.items.extend(other.items);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.items.iter()
    }

    /// Errors attached to `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.items.iter().filter(move |e| e.field == field)
    }

    /// All messages, in insertion order.
    pub fn messages(&self) -> Vec<String> {
        self.items.iter().map(ToString::to_string).collect()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_and_filters() {
        let mut errors = ValidationErrors::default();
        errors.push("record is locked");
        errors.push(
            ValidationError::new("email", ValidationCode::Unique, "email already taken")
                .with_metadata("value", "a@b.c"),
        );

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.for_field("email").count(), 1);
        assert_eq!(
            errors.messages(),
            vec!["record is locked", "email: email already taken"]
        );
    }

    #[test]
    fn serializes_code_as_string() {
        let err = ValidationError::new("name", ValidationCode::Required, "name is required");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "required");
        assert!(json.get("metadata").is_none());
    }
}
