//! tokio-postgres backed [`Connection`].
//!
//! ```ignore
//! let (client, connection) = tokio_postgres::connect(&url, NoTls).await?;
//! tokio::spawn(connection);
//!
//! let conn = PgConnection::with_config(client, PgConfig::new().name("main").table_prefix("app_"));
//! let users = tabula::query::select("*", "{$prefix}users").fetch_all(&conn).await?;
//! ```
//!
//! `:name` placeholders are rewritten to `$n` before the statement reaches
//! the server; a name used twice binds the same positional parameter.

mod value;


use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::query::to_positional;
use crate::record::Record;
use crate::value::{Params, Value};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row, Statement};

/// Settings for a [`PgConnection`].
#[derive(Debug, Clone)]
pub struct PgConfig {
    /// Connection name; scopes cached query results.
    pub name: String,
    /// Replaces `{$prefix}` in table names.
    pub table_prefix: Option<String>,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            table_prefix: None,
        }
    }
}

impl PgConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }
}

/// A server-side prepared statement plus the parameter names in `$n` order.
#[derive(Debug, Clone)]
pub struct PgStatement {
    statement: Statement,
    names: Vec<String>,
}

impl PgStatement {
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Parameter names, where index `i` binds `$i+1`.
    pub fn param_names(&self) -> &[String] {
        &self.names
    }
}

/// [`Connection`] over a `tokio_postgres::Client`.
///
/// Acquiring the client (and driving its connection task) is up to the caller.
pub struct PgConnection {
    client: Client,
    config: PgConfig,
}

impl PgConnection {
    pub fn new(client: Client) -> Self {
        Self::with_config(client, PgConfig::default())
    }

    pub fn with_config(client: Client, config: PgConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn into_inner(self) -> Client {
        self.client
    }
}

/// Values for `names`, in order.
pub(crate) fn bind_positional<'a>(names: &[String], params: &'a Params) -> OrmResult<Vec<&'a Value>> {
    names
        .iter()
        .map(|name| {
            params
                .get(name)
                .ok_or_else(|| OrmError::build(format!("no value bound for parameter :{name}")))
        })
        .collect()
}

fn as_sql_refs<'a>(values: &'a [&'a Value]) -> Vec<&'a (dyn ToSql + Sync)> {
    values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect()
}

fn driver_error(e: tokio_postgres::Error) -> OrmError {
    match e.as_db_error() {
        Some(db) => OrmError::driver(format!("{} (SQLSTATE {})", db.message(), db.code().code())),
        None => OrmError::driver(e.to_string()),
    }
}

pub(crate) fn decode_row(row: &Row) -> OrmResult<Record> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value: Value = row
            .try_get(index)
            .map_err(|e| OrmError::decode(column.name(), e.to_string()))?;
        record.insert(column.name(), value);
    }
    Ok(record)
}

fn decode_rows(rows: &[Row]) -> OrmResult<Vec<Record>> {
    rows.iter().map(decode_row).collect()
}

impl Connection for PgConnection {
    type Statement = PgStatement;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn table_prefix(&self) -> Option<&str> {
        self.config.table_prefix.as_deref()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "closed" => Some(self.client.is_closed().to_string()),
            _ => None,
        }
    }

    async fn query(&self, sql: &str, params: &Params) -> OrmResult<Vec<Record>> {
        let (sql, names) = to_positional(sql);
        let values = bind_positional(&names, params)?;
        let rows = self
            .client
            .query(&sql, &as_sql_refs(&values))
            .await
            .map_err(driver_error)?;
        decode_rows(&rows)
    }

    async fn execute(&self, sql: &str, params: &Params) -> OrmResult<u64> {
        let (sql, names) = to_positional(sql);
        let values = bind_positional(&names, params)?;
        self.client
            .execute(&sql, &as_sql_refs(&values))
            .await
            .map_err(driver_error)
    }

    async fn prepare(&self, sql: &str) -> OrmResult<PgStatement> {
        let (sql, names) = to_positional(sql);
        let statement = self.client.prepare(&sql).await.map_err(driver_error)?;
        Ok(PgStatement { statement, names })
    }

    async fn query_prepared(&self, stmt: &PgStatement, params: &Params) -> OrmResult<Vec<Record>> {
        let values = bind_positional(&stmt.names, params)?;
        let rows = self
            .client
            .query(&stmt.statement, &as_sql_refs(&values))
            .await
            .map_err(driver_error)?;
        decode_rows(&rows)
    }

    async fn execute_prepared(&self, stmt: &PgStatement, params: &Params) -> OrmResult<u64> {
        let values = bind_positional(&stmt.names, params)?;
        self.client
            .execute(&stmt.statement, &as_sql_refs(&values))
            .await
            .map_err(driver_error)
    }

    async fn last_insert_id(&self) -> OrmResult<Option<Value>> {
        match self.client.query_opt("SELECT lastval()", &[]).await {
            Ok(Some(row)) => Ok(decode_row(&row)?.first_value().cloned()),
            Ok(None) => Ok(None),
            // lastval is not yet defined in this session
            Err(e) if e.code() == Some(&SqlState::OBJECT_NOT_IN_PREREQUISITE_STATE) => Ok(None),
            Err(e) => Err(driver_error(e)),
        }
    }
}
