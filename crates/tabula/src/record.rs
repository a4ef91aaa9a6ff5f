//! Fetched records and the hydration traits.

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Value};
use indexmap::IndexMap;
use serde::Serialize;

/// One fetched database row: an ordered `column -> value` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    columns: IndexMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Insert or replace a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Chainable [`Record::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Whether the record has `column`.
    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Borrow a column value.
    ///
    /// Returns `OrmError::FieldMissing` when the column was not fetched.
    pub fn get(&self, column: &str) -> OrmResult<&Value> {
        self.columns
            .get(column)
            .ok_or_else(|| OrmError::field_missing("record", column))
    }

    /// Get a column value converted to `T`.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        T::from_value(self.get(column)?, column)
    }

    /// Value of the first column, if any.
    pub fn first_value(&self) -> Option<&Value> {
        self.columns.values().next()
    }

    /// Column names in fetch order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Iterate `(column, value)` pairs in fetch order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keep only the columns named `prefix_*`, renamed without the prefix.
    ///
    /// Used when joined tables were selected with aliased column names
    /// (`alias_columnname`).
    pub fn strip_prefix(&self, prefix: &str) -> Record {
        let lead = format!("{prefix}_");
        self.columns
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&lead).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }

    /// Consume into the underlying ordered map.
    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.columns
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl From<IndexMap<String, Value>> for Record {
    fn from(columns: IndexMap<String, Value>) -> Self {
        Self { columns }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Trait for types that can be hydrated from a fetched [`Record`].
pub trait FromRecord: Sized {
    /// Build `Self` from a record.
    fn from_record(record: &Record) -> OrmResult<Self>;

    /// Build `Self` from the `prefix_*` columns of a record.
    fn from_record_prefixed(record: &Record, prefix: &str) -> OrmResult<Self> {
        Self::from_record(&record.strip_prefix(prefix))
    }
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> OrmResult<Self> {
        Ok(record.clone())
    }
}
