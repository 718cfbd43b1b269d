//! Row mapping traits and utilities

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Value};
use std::collections::BTreeMap;

/// A result row (or an attribute map): column name to value.
pub type Row = BTreeMap<String, Value>;

/// Trait for converting a database row into a Rust struct.
///
/// # Example
///
/// ```ignore
/// use adorm::{FromRow, OrmResult, Row, RowExt};
///
/// struct User {
///     id: i64,
///     username: String,
///     email: Option<String>,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &Row) -> OrmResult<Self> {
///         Ok(Self {
///             id: row.try_get_column("id")?,
///             username: row.try_get_column("username")?,
///             email: row.try_get_column("email")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> OrmResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.clone())
    }
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning OrmError::Decode on failure.
    ///
    /// A missing column decodes like `NULL`, so `Option<T>` targets yield `None`.
    fn try_get_column<T: FromValue>(&self, column: &str) -> OrmResult<T>;
}

impl RowExt for Row {
    fn try_get_column<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self.get(column).unwrap_or(&Value::Null);
        T::from_value(value).map_err(|e| OrmError::decode(column, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User {
        id: i64,
        email: Option<String>,
    }

    impl FromRow for User {
        fn from_row(row: &Row) -> OrmResult<Self> {
            Ok(Self {
                id: row.try_get_column("id")?,
                email: row.try_get_column("email")?,
            })
        }
    }

    #[test]
    fn from_row_maps_columns() {
        let mut row = Row::new();
        row.insert("id".into(), Value::from("7"));
        let user = User::from_row(&row).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.email, None);
    }

    #[test]
    fn decode_error_names_column() {
        let mut row = Row::new();
        row.insert("id".into(), Value::from("seven"));
        let err = User::from_row(&row).err().unwrap();
        assert!(matches!(err, OrmError::Decode { ref column, .. } if column == "id"));
    }
}
