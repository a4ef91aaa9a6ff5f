//! Active-record rows.
//!
//! A [`Row<T>`] holds the fields of one record of the table described by
//! the row type `T`, tracks which fields changed, and knows how to
//! retrieve, save and remove itself.
//!
//! ```ignore
//! let mut user = Row::<User>::new();
//! user.set("name", "Ann")?;
//! user.save(&conn, false).await?;          // INSERT, id from last_insert_id
//! user.set("name", "Anna")?;
//! user.save(&conn, false).await?;          // UPDATE ... WHERE id = :where_id
//! let tags = user.get_related::<Tag, _>(&conn, "tags", None, &[]).await?;
//! ```

mod fields;
mod meta;
mod persist;
mod related;


pub use fields::{Fields, HookFn, HookPoint, Hooks};
pub use meta::{Multiplicity, RelationDecl, RowMeta, RowType, meta};
pub use related::Related;

use crate::error::{OrmError, OrmResult};
use crate::record::{FromRecord, Record};
use crate::value::{FromValue, Params, Value};
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// One record of the table described by `T`.
pub struct Row<T: RowType> {
    fields: IndexMap<String, Value>,
    modified: IndexSet<String>,
    primary_key_value: Option<Params>,
    retrieved: bool,
    removed: bool,
    meta: Arc<RowMeta>,
    _type: PhantomData<fn() -> T>,
}

impl<T: RowType> fmt::Debug for Row<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("table", &self.meta.table_name())
            .field("fields", &self.fields)
            .field("modified", &self.modified)
            .field("primary_key_value", &self.primary_key_value)
            .field("retrieved", &self.retrieved)
            .field("removed", &self.removed)
            .finish()
    }
}

impl<T: RowType> Clone for Row<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            modified: self.modified.clone(),
            primary_key_value: self.primary_key_value.clone(),
            retrieved: self.retrieved,
            removed: self.removed,
            meta: Arc::clone(&self.meta),
            _type: PhantomData,
        }
    }
}

impl<T: RowType> Default for Row<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RowType> Row<T> {
    /// An empty, new row.
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
            modified: IndexSet::new(),
            primary_key_value: None,
            retrieved: false,
            removed: false,
            meta: meta::<T>(),
            _type: PhantomData,
        }
    }

    /// A new row with the given fields, all pending (modified).
    pub fn from_fields<K, V, I>(pairs: I) -> OrmResult<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Self::new();
        for (name, value) in pairs {
            Fields::set(&mut row, name.as_ref(), value.into())?;
        }
        Ok(row)
    }

    /// Metadata of the row type.
    pub fn meta(&self) -> &RowMeta {
        &self.meta
    }

    /// Table name.
    pub fn table_name(&self) -> &str {
        self.meta.table_name()
    }

    /// Whether the row exists in the database (retrieved or saved).
    pub fn is_retrieved(&self) -> bool {
        self.retrieved
    }

    /// Whether the row was deleted through [`Row::remove`].
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Whether `name` has a pending change.
    pub fn is_modified(&self, name: &str) -> bool {
        self.modified.contains(name)
    }

    /// Names of fields with pending changes.
    pub fn modified_fields(&self) -> Vec<&str> {
        self.modified.iter().map(String::as_str).collect()
    }

    /// Primary key values recorded when the row was loaded or inserted.
    pub fn primary_key_value(&self) -> Option<&Params> {
        self.primary_key_value.as_ref()
    }

    /// Borrow a field value.
    pub fn get(&self, name: &str) -> OrmResult<&Value> {
        Fields::get(self, name)
    }

    /// A field converted to `V`.
    pub fn try_get<V: FromValue>(&self, name: &str) -> OrmResult<V> {
        V::from_value(Fields::get(self, name)?, name)
    }

    /// Assign a field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> OrmResult<()> {
        Fields::set(self, name, value.into())
    }

    /// Fields as a record.
    pub fn to_record(&self) -> Record {
        Record::from(self.fields.clone())
    }

    // ==================== state helpers ====================

    fn ensure_live(&self) -> OrmResult<()> {
        if self.removed {
            return Err(OrmError::Removed(self.table_name().to_string()));
        }
        Ok(())
    }

    fn modified_params(&self) -> Params {
        self.modified
            .iter()
            .filter_map(|name| self.fields.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Primary key criteria from current field values.
    fn key_from_fields(&self) -> OrmResult<Params> {
        let key = self.meta.primary_key_columns();
        if key.is_empty() {
            return Err(OrmError::config(format!(
                "table {} declares no primary key",
                self.table_name()
            )));
        }
        key.iter()
            .map(|column| match self.fields.get(column) {
                Some(value) => Ok((column.clone(), value.clone())),
                None => Err(OrmError::config(format!(
                    "primary key field {column} is not set on {}",
                    self.table_name()
                ))),
            })
            .collect()
    }

    /// Stored primary key, falling back to current field values.
    fn key_criteria(&self) -> OrmResult<Params> {
        match &self.primary_key_value {
            Some(key) => Ok(key.clone()),
            None => self.key_from_fields(),
        }
    }

    /// Record the primary key from current fields, if all key fields are set.
    fn capture_primary_key(&mut self) {
        self.primary_key_value = self.key_from_fields().ok();
    }

    /// Merge fetched values; they are not pending changes.
    fn load(&mut self, record: Record) {
        for (name, value) in record {
            self.modified.shift_remove(&name);
            self.fields.insert(name, value);
        }
        self.retrieved = true;
        self.capture_primary_key();
    }
}

impl<T: RowType> Fields for Row<T> {
    fn table_name(&self) -> &str {
        self.meta.table_name()
    }

    fn get(&self, name: &str) -> OrmResult<&Value> {
        self.fields
            .get(name)
            .ok_or_else(|| OrmError::field_missing(self.meta.table_name(), name))
    }

    fn set(&mut self, name: &str, value: Value) -> OrmResult<()> {
        if !self.meta.allows(name) {
            return Err(OrmError::field_missing(self.meta.table_name(), name));
        }
        if self.fields.get(name) != Some(&value) {
            self.fields.insert(name.to_string(), value);
            self.modified.insert(name.to_string());
        }
        Ok(())
    }

    fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn unset(&mut self, name: &str) {
        self.fields.shift_remove(name);
        self.modified.shift_remove(name);
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }
}

impl<T: RowType> FromRecord for Row<T> {
    fn from_record(record: &Record) -> OrmResult<Self> {
        let mut row = Self::new();
        row.load(record.clone());
        if row.primary_key_value.is_none() && !row.meta.primary_key_columns().is_empty() {
            return Err(OrmError::config(format!(
                "{} record has no primary key values ({})",
                row.table_name(),
                row.meta.primary_key_columns().join(", ")
            )));
        }
        Ok(row)
    }
}
