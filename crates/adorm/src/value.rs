//! Tagged attribute and bind values.
//!
//! Every bind parameter, attribute and result cell is a [`Value`]. Conversions from the
//! common Rust scalars are provided through `From`, and typed extraction goes through
//! [`FromValue`].

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Structured data (arrays, objects); the storage form of the `array` cast.
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by the `bool` cast and loose comparisons.
    ///
    /// `NULL`, `false`, `0`, `0.0`, `""`, `"0"`, empty bytes and empty JSON
    /// arrays/objects are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !(s.is_empty() || s == "0"),
            Value::Bytes(b) => !(b.is_empty() || b.as_slice() == b"0"),
            Value::Date(_) | Value::DateTime(_) => true,
            Value::Json(j) => match j {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                serde_json::Value::String(s) => !(s.is_empty() || s == "0"),
                serde_json::Value::Array(a) => !a.is_empty(),
                serde_json::Value::Object(o) => !o.is_empty(),
            },
        }
    }

    /// Numeric view: ints, floats and fully numeric strings (`"25"`, `" 1.5e3"`).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => numeric_text(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok().and_then(numeric_text),
            _ => None,
        }
    }

    /// Whether the debug renderer would print this value unquoted.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Bool(_)) || self.as_number().is_some()
    }

    /// Integer view without coercion from non-numeric text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(f.trunc() as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(_) | Value::Bytes(_) => self.as_number().map(|f| f.trunc() as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => other.as_number(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Loose equality: numeric strings compare numerically, booleans compare by
    /// truthiness and `NULL` equals any empty/zero value.
    pub fn loose_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Null, Text(s)) | (Text(s), Null) => s.is_empty(),
            (Null, Bytes(b)) | (Bytes(b), Null) => b.is_empty(),
            (Null, v) | (v, Null) => !v.is_truthy(),
            (Bool(b), v) | (v, Bool(b)) => *b == v.is_truthy(),
            (Int(a), Int(b)) => a == b,
            (Int(_) | Float(_), Int(_) | Float(_)) => self.as_number() == other.as_number(),
            (Int(_) | Float(_), Text(s)) | (Text(s), Int(_) | Float(_)) => {
                let number = if matches!(self, Text(_)) { other } else { self };
                match numeric_text(s) {
                    Some(parsed) => number.as_number() == Some(parsed),
                    None => number.to_string() == *s,
                }
            }
            (Text(a), Text(b)) => match (numeric_text(a), numeric_text(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            (Bytes(a), Text(b)) | (Text(b), Bytes(a)) => a.as_slice() == b.as_bytes(),
            (Date(_) | DateTime(_), Text(s)) | (Text(s), Date(_) | DateTime(_)) => {
                let temporal = if matches!(self, Text(_)) { other } else { self };
                temporal.to_string() == *s
            }
            (Json(a), Json(b)) => a == b,
            (Json(j), v) | (v, Json(j)) => v.to_json() == *j,
            _ => self == other,
        }
    }

    /// Convert to a JSON value (used by the `array` cast and record serialization).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
            Value::Date(_) | Value::DateTime(_) => serde_json::Value::String(self.to_string()),
            Value::Json(j) => j.clone(),
        }
    }

    /// Literal form used when interpolating binds into debug SQL.
    ///
    /// Numeric values are printed bare and everything else is wrapped in single
    /// quotes **without escaping**. The output is for logs only and must never be
    /// executed with untrusted data.
    pub fn debug_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Value::Int(_) | Value::Float(_) => self.to_string(),
            Value::Text(s) if numeric_text(s).is_some() => s.clone(),
            other => format!("'{other}'"),
        }
    }
}

/// String form of the value (`NULL` and `false` render as the empty string).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => f.write_str(if *b { "1" } else { "" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Json(j) => write!(f, "{j}"),
        }
    }
}

/// Parse a string that is numeric in its entirety, allowing surrounding whitespace.
pub(crate) fn numeric_text(s: &str) -> Option<f64> {
    let t = s.trim();
    let len = numeric_prefix(t);
    if len == 0 || len != t.len() {
        return None;
    }
    t.parse::<f64>().ok()
}

/// Parse the leading numeric portion of a string (`"12abc"` → `12.0`, `"abc"` → `0.0`).
pub(crate) fn leading_number(s: &str) -> f64 {
    let t = s.trim_start();
    let len = numeric_prefix(t);
    if len == 0 {
        return 0.0;
    }
    t[..len].parse::<f64>().unwrap_or(0.0)
}

/// Length of the numeric prefix of `s` (sign, digits, fraction, exponent).
fn numeric_prefix(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    i
}

// ==================== From impls ====================

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Text(v.to_string()),
        }
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::from(v as u64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ==================== FromValue ====================

/// Typed extraction from a [`Value`].
///
/// Implementations are strict about the variant but accept the obvious numeric
/// widenings and numeric strings (drivers commonly hand back `DECIMAL`/`BIGINT`
/// columns as text).
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("expected integer, got text {s:?}")),
            other => Err(format!("expected integer, got {other:?}")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| format!("integer {wide} out of range for i32"))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::Text(s) => numeric_text(s).ok_or_else(|| format!("expected float, got text {s:?}")),
            other => Err(format!("expected float, got {other:?}")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Text(s) if s == "0" || s == "1" => Ok(s == "1"),
            other => Err(format!("expected bool, got {other:?}")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Err("expected string, got NULL".to_string()),
            Value::Json(_) => Err("expected string, got structured value".to_string()),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(format!("expected bytes, got {other:?}")),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            Value::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()),
            other => Err(format!("expected date, got {other:?}")),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Text(s) => {
                NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map_err(|e| e.to_string())
            }
            other => Err(format!("expected datetime, got {other:?}")),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| e.to_string()),
            other => Ok(other.to_json()),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
