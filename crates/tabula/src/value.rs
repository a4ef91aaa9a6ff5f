//! Dynamically typed SQL values and named parameter maps.

use crate::error::{OrmError, OrmResult};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

/// Named parameters, keyed without the leading `:`.
pub type Params = IndexMap<String, Value>;

/// A SQL value bound to a named parameter or read from a fetched record.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary value.
    Bytes(Vec<u8>),
    /// JSON document.
    Json(serde_json::Value),
    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),
    /// UUID value.
    Uuid(uuid::Uuid),
}

impl Value {
    /// Returns true for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
        }
    }

    /// Borrow the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload; numeric text (as returned by some drivers) is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert into a `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::from(b.clone()),
            Value::Json(j) => j.clone(),
            Value::Timestamp(ts) => {
                serde_json::Value::String(ts.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            Value::Uuid(u) => serde_json::Value::String(u.to_string()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

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

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
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

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Conversion from a borrowed [`Value`] into a Rust type.
pub trait FromValue: Sized {
    /// Convert `value`; `column` is only used for error reporting.
    fn from_value(value: &Value, column: &str) -> OrmResult<Self>;
}

fn mismatch(column: &str, expected: &str, value: &Value) -> OrmError {
    OrmError::decode(
        column,
        format!("expected {expected}, found {}", value.type_name()),
    )
}

impl FromValue for Value {
    fn from_value(value: &Value, _column: &str) -> OrmResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        value.as_i64().ok_or_else(|| mismatch(column, "int", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        let n = i64::from_value(value, column)?;
        i32::try_from(n).map_err(|_| OrmError::decode(column, format!("{n} out of range for i32")))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(n) => Ok(*n as f64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| mismatch(column, "float", value)),
            _ => Err(mismatch(column, "float", value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            _ => Err(mismatch(column, "bool", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Uuid(u) => Ok(u.to_string()),
            _ => Err(mismatch(column, "text", value)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(mismatch(column, "bytes", value)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value, _column: &str) -> OrmResult<Self> {
        Ok(value.to_json())
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map_err(|e| OrmError::decode(column, e.to_string())),
            _ => Err(mismatch(column, "timestamp", value)),
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => {
                uuid::Uuid::parse_str(s).map_err(|e| OrmError::decode(column, e.to_string()))
            }
            _ => Err(mismatch(column, "uuid", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            v => T::from_value(v, column).map(Some),
        }
    }
}

/// Build a [`Params`] map from `(name, value)` pairs.
///
/// ```ignore
/// let p = tabula::params([("id", 5)]);
/// ```
pub fn params<K, V, I>(pairs: I) -> Params
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(42_i32), Value::Int(42));
        assert_eq!(Value::from("x"), Value::Text("x".into()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(2.5_f64)), Value::Float(2.5));
    }

    #[test]
    fn numeric_text_decodes_as_int() {
        let v = Value::Text("17".into());
        assert_eq!(i64::from_value(&v, "n").unwrap(), 17);
        assert_eq!(i32::from_value(&v, "n").unwrap(), 17);
    }

    #[test]
    fn decode_mismatch_names_column() {
        let err = bool::from_value(&Value::Text("x".into()), "flag").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Decode error on column 'flag': expected bool, found text"
        );
    }

    #[test]
    fn option_decodes_null() {
        let v: Option<String> = FromValue::from_value(&Value::Null, "name").unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn serializes_as_plain_json() {
        let p = params([("id", Value::from(5)), ("name", Value::from("Ann"))]);
        assert_eq!(
            serde_json::to_string(&p).unwrap(),
            r#"{"id":5,"name":"Ann"}"#
        );
    }
}
