//! Prepared statement handle.

use super::builder::{inline_params, referenced_params};
use crate::cache::QueryCache;
use crate::connection::Connection;
use crate::cursor::ResultCursor;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::value::{Params, Value};

/// A statement compiled once and executed many times with fresh bindings.
///
/// Execute it on the same connection that prepared it.
#[derive(Debug)]
pub struct PreparedQuery<S> {
    sql: String,
    statement: S,
    params: Params,
    reads_rows: bool,
    modifies_data: bool,
    dialect: Dialect,
}

impl<S> PreparedQuery<S> {
    /// `(reads, writes)`: whether the statement yields rows and whether it
    /// changes data.
    pub(crate) fn new(
        sql: String,
        statement: S,
        params: Params,
        (reads_rows, modifies_data): (bool, bool),
        dialect: Dialect,
    ) -> Self {
        Self {
            sql,
            statement,
            params,
            reads_rows,
            modifies_data,
            dialect,
        }
    }

    /// The compiled SQL with `:name` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Currently bound parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Bind (or rebind) parameters for the next execution.
    pub fn bind(&mut self, params: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        self.params.extend(params);
        self
    }

    /// SQL with the current bindings inlined, for display.
    pub fn to_sql(&self) -> String {
        inline_params(&self.sql, &self.params, |v| self.dialect.quote(v))
    }

    /// Run the statement with the current bindings.
    pub async fn execute<C>(&self, conn: &C) -> OrmResult<ResultCursor>
    where
        C: Connection<Statement = S>,
        S: Send + Sync,
    {
        let params = referenced_params(&self.sql, &self.params)?;
        tracing::debug!(
            target: "tabula.sql",
            connection = conn.name(),
            params = params.len(),
            sql = %self.sql,
            "execute prepared"
        );

        let result = if self.reads_rows {
            conn.query_prepared(&self.statement, &params)
                .await
                .map(|rows| {
                    if self.modifies_data {
                        QueryCache::global().invalidate_connection(conn.name());
                    }
                    ResultCursor::from_rows(self.sql.clone(), rows)
                })
        } else {
            conn.execute_prepared(&self.statement, &params)
                .await
                .map(|affected| {
                    QueryCache::global().invalidate_connection(conn.name());
                    ResultCursor::from_affected(self.sql.clone(), affected)
                })
        };
        result.map_err(|e| {
            let rendered = inline_params(&self.sql, &self.params, |v| conn.quote(v));
            OrmError::execution(rendered, e)
        })
    }
}
