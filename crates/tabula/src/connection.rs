//! The connection abstraction the core executes against.
//!
//! Opening, pooling and locking connections is left to the implementor;
//! the core only needs the narrow surface below. SQL handed to a
//! connection uses `:name` placeholders bound from a [`Params`] map.

use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::record::Record;
use crate::value::{Params, Value};

/// A database handle that can run parameterized statements.
///
/// Implementations must accept at most one in-flight statement at a time;
/// the core never issues concurrent calls on the same connection.
pub trait Connection: Send + Sync {
    /// Compiled statement handle returned by [`Connection::prepare`].
    type Statement: Send + Sync;

    /// Connection name, part of the query cache key.
    fn name(&self) -> &str;

    /// SQL dialect spoken by this connection.
    fn dialect(&self) -> Dialect;

    /// Table prefix substituted for the `{$prefix}` token before execution.
    fn table_prefix(&self) -> Option<&str> {
        None
    }

    /// Driver attribute lookup (e.g. `"server_version"`).
    fn attribute(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }

    /// Render `value` as a literal for this connection.
    fn quote(&self, value: &Value) -> String {
        self.dialect().quote(value)
    }

    /// Run a statement and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &Params,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &Params,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Compile a statement for repeated execution.
    fn prepare(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = OrmResult<Self::Statement>> + Send;

    /// Run a prepared statement and return all rows.
    fn query_prepared(
        &self,
        stmt: &Self::Statement,
        params: &Params,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Run a prepared statement and return the number of affected rows.
    fn execute_prepared(
        &self,
        stmt: &Self::Statement,
        params: &Params,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Identifier generated by the most recent INSERT, if the driver has one.
    fn last_insert_id(&self) -> impl std::future::Future<Output = OrmResult<Option<Value>>> + Send;
}
