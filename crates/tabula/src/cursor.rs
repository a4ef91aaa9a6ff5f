//! Forward-only cursor over an executed statement's rows.

use crate::error::OrmResult;
use crate::record::{FromRecord, Record};
use std::collections::VecDeque;

/// Result of executing a statement.
///
/// Row-returning statements yield their records one at a time; writes
/// report the number of affected rows.
#[derive(Debug, Clone, Default)]
pub struct ResultCursor {
    sql: String,
    rows: VecDeque<Record>,
    row_count: u64,
    cached: bool,
}

impl ResultCursor {
    /// Cursor over fetched rows.
    pub fn from_rows(sql: impl Into<String>, rows: Vec<Record>) -> Self {
        Self {
            sql: sql.into(),
            row_count: rows.len() as u64,
            rows: rows.into(),
            cached: false,
        }
    }

    /// Cursor for a write that affected `row_count` rows.
    pub fn from_affected(sql: impl Into<String>, row_count: u64) -> Self {
        Self {
            sql: sql.into(),
            rows: VecDeque::new(),
            row_count,
            cached: false,
        }
    }

    pub(crate) fn mark_cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// The executed SQL (with `:name` placeholders).
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Rows returned, or rows affected by a write.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Whether the rows were served from the query cache.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Next record, or `None` when the cursor is exhausted.
    pub fn fetch(&mut self) -> Option<Record> {
        self.rows.pop_front()
    }

    /// Next record hydrated as `T`.
    pub fn fetch_as<T: FromRecord>(&mut self) -> OrmResult<Option<T>> {
        self.fetch().map(|r| T::from_record(&r)).transpose()
    }

    /// Next record hydrated as `T` from its `prefix_*` columns.
    pub fn fetch_prefixed<T: FromRecord>(&mut self, prefix: &str) -> OrmResult<Option<T>> {
        self.fetch()
            .map(|r| T::from_record_prefixed(&r, prefix))
            .transpose()
    }

    /// All remaining records.
    pub fn fetch_all(&mut self) -> Vec<Record> {
        self.rows.drain(..).collect()
    }

    /// All remaining records hydrated as `T`.
    pub fn fetch_all_as<T: FromRecord>(&mut self) -> OrmResult<Vec<T>> {
        self.rows.drain(..).map(|r| T::from_record(&r)).collect()
    }
}

impl Iterator for ResultCursor {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.fetch()
    }
}
