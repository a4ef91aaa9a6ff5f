//! Executing builders against a [`Connection`].

use super::builder::{QueryBuilder, row_param_name};
use super::builder::Clause;
use super::kind::{QueryKind, QueryType, returns_rows};
use super::prepared::PreparedQuery;
use crate::cache::{Operation, QueryCache};
use crate::connection::Connection;
use crate::cursor::ResultCursor;
use crate::error::{OrmError, OrmResult};
use crate::record::{FromRecord, Record};
use crate::value::{Params, Value};
use std::sync::Arc;

impl QueryBuilder {
    fn reads_rows(&self, sql: &str) -> bool {
        match self.kind() {
            QueryKind::Select => true,
            QueryKind::Raw => returns_rows(sql),
            _ => self.clause(Clause::Returning).is_some(),
        }
    }

    /// Whether running the statement may change table contents.
    fn modifies_data(&self, sql: &str) -> bool {
        match self.kind() {
            QueryKind::Select => false,
            QueryKind::Raw => matches!(
                QueryType::from_sql(sql),
                QueryType::Insert | QueryType::Update | QueryType::Delete
            ),
            _ => true,
        }
    }

    /// Execute with one-shot parameter binding.
    ///
    /// Row-returning statements yield a cursor over their records; writes
    /// yield the affected-row count. Anything that changes data (including
    /// writes with `RETURNING`) invalidates the connection's cached results.
    /// Failures carry the fully substituted SQL.
    pub async fn execute<C: Connection>(&self, conn: &C) -> OrmResult<ResultCursor> {
        let exec = self.for_connection(conn.dialect(), conn.table_prefix());
        let (sql, params) = exec.statement()?;
        let reads = exec.reads_rows(&sql);

        tracing::debug!(
            target: "tabula.sql",
            connection = conn.name(),
            kind = exec.kind().name(),
            params = params.len(),
            sql = %sql,
            "execute"
        );

        if reads {
            match conn.query(&sql, &params).await {
                Ok(rows) => {
                    if exec.modifies_data(&sql) {
                        QueryCache::global().invalidate_connection(conn.name());
                    }
                    Ok(ResultCursor::from_rows(sql, rows))
                }
                Err(e) => Err(exec.execution_error(conn, e)),
            }
        } else {
            match conn.execute(&sql, &params).await {
                Ok(affected) => {
                    QueryCache::global().invalidate_connection(conn.name());
                    Ok(ResultCursor::from_affected(sql, affected))
                }
                Err(e) => Err(exec.execution_error(conn, e)),
            }
        }
    }

    fn execution_error<C: Connection>(&self, conn: &C, source: OrmError) -> OrmError {
        let rendered = self
            .to_sql_with(|v| conn.quote(v))
            .unwrap_or_else(|e| e.to_string());
        tracing::warn!(target: "tabula.sql", connection = conn.name(), error = %source, sql = %rendered, "statement failed");
        OrmError::execution(rendered, source)
    }

    /// Compile the statement on `conn` for repeated execution.
    ///
    /// The returned handle keeps this builder's bound parameters; rebind
    /// with [`PreparedQuery::bind`] between executions.
    pub async fn prepare<C: Connection>(&self, conn: &C) -> OrmResult<PreparedQuery<C::Statement>> {
        let exec = self.for_connection(conn.dialect(), conn.table_prefix());
        let sql = exec.build()?;
        tracing::debug!(target: "tabula.sql", connection = conn.name(), sql = %sql, "prepare");
        let statement = match conn.prepare(&sql).await {
            Ok(stmt) => stmt,
            Err(e) => return Err(exec.execution_error(conn, e)),
        };
        let reads = exec.reads_rows(&sql);
        let writes = exec.modifies_data(&sql);
        Ok(PreparedQuery::new(
            sql,
            statement,
            exec.params().clone(),
            (reads, writes),
            exec.dialect(),
        ))
    }

    /// Rows for this statement and whether they came from the cache.
    ///
    /// Only plain reads are cached; statements that change data always run.
    async fn cached_records<C: Connection>(
        &self,
        conn: &C,
        operation: Operation,
    ) -> OrmResult<(Arc<Vec<Record>>, bool)> {
        let cache = QueryCache::global();
        let exec = self.for_connection(conn.dialect(), conn.table_prefix());
        let sql = exec.build()?;
        if !self.is_cacheable()
            || !cache.is_enabled()
            || !exec.reads_rows(&sql)
            || exec.modifies_data(&sql)
        {
            return Ok((Arc::new(self.execute(conn).await?.fetch_all()), false));
        }

        let key = exec.to_sql_with(|v| conn.quote(v))?;
        if let Some(rows) = cache.get(conn.name(), &key, operation) {
            return Ok((rows, true));
        }
        let rows = self.execute(conn).await?.fetch_all();
        Ok((cache.put(conn.name(), &key, operation, rows), false))
    }

    /// Like [`QueryBuilder::execute`], but reads are served from the query
    /// cache when possible. Shares cache entries with `fetch_all`.
    pub async fn fetch_cursor<C: Connection>(&self, conn: &C) -> OrmResult<ResultCursor> {
        let exec = self.for_connection(conn.dialect(), conn.table_prefix());
        let sql = exec.build()?;
        if !exec.reads_rows(&sql) {
            return self.execute(conn).await;
        }
        let (rows, hit) = self.cached_records(conn, Operation::FetchAll).await?;
        let cursor = ResultCursor::from_rows(sql, rows.as_ref().clone());
        Ok(if hit { cursor.mark_cached() } else { cursor })
    }

    /// Fetch every record, using the query cache unless disabled.
    pub async fn fetch_all<C: Connection>(&self, conn: &C) -> OrmResult<Vec<Record>> {
        let (rows, _) = self.cached_records(conn, Operation::FetchAll).await?;
        Ok(rows.as_ref().clone())
    }

    /// Fetch every record hydrated as `T`, using the query cache unless disabled.
    pub async fn fetch_rows<T: FromRecord, C: Connection>(&self, conn: &C) -> OrmResult<Vec<T>> {
        let (rows, _) = self.cached_records(conn, Operation::FetchRows).await?;
        rows.iter().map(T::from_record).collect()
    }

    /// Fetch the first record; no rows is [`OrmError::NotFound`]. Never cached.
    pub async fn fetch_one<C: Connection>(&self, conn: &C) -> OrmResult<Record> {
        let mut cursor = self.execute(conn).await?;
        cursor
            .fetch()
            .ok_or_else(|| OrmError::not_found(format!("no row for: {}", cursor.sql())))
    }

    /// Fetch the first record, if any. Never cached.
    pub async fn fetch_opt<C: Connection>(&self, conn: &C) -> OrmResult<Option<Record>> {
        Ok(self.execute(conn).await?.fetch())
    }

    /// Fetch the first column of the first record, if any. Never cached.
    pub async fn fetch_value<C: Connection>(&self, conn: &C) -> OrmResult<Option<Value>> {
        Ok(self
            .fetch_opt(conn)
            .await?
            .and_then(|r| r.first_value().cloned()))
    }
}

/// Insert `rows` in chunks of at most `chunk_size`, one prepared
/// multi-row INSERT per chunk size.
///
/// Every row must have the same columns. Returns the total affected-row
/// count. An empty `rows` slice is a no-op.
pub async fn insert_many_and_execute<C: Connection>(
    conn: &C,
    table: &str,
    rows: &[Params],
    chunk_size: usize,
) -> OrmResult<u64> {
    if chunk_size == 0 {
        return Err(OrmError::build("chunk size must be at least 1"));
    }
    if rows.is_empty() {
        return Ok(0);
    }

    let columns: Vec<String> = rows[0].keys().cloned().collect();
    if let Some(index) = rows
        .iter()
        .position(|row| row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(c)))
    {
        return Err(OrmError::build(format!(
            "row {index} has different columns than row 0"
        )));
    }

    let mut prepared: Option<(usize, PreparedQuery<C::Statement>)> = None;
    let mut affected = 0;

    for chunk in rows.chunks(chunk_size) {
        if prepared.as_ref().is_none_or(|(size, _)| *size != chunk.len()) {
            let stmt = QueryBuilder::insert(table).values_many(chunk).prepare(conn).await?;
            prepared = Some((chunk.len(), stmt));
        }
        let Some((_, stmt)) = prepared.as_mut() else {
            continue;
        };

        let mut params = Params::new();
        for (index, row) in chunk.iter().enumerate() {
            for column in &columns {
                params.insert(row_param_name(index, column), row[column.as_str()].clone());
            }
        }
        stmt.bind(params);
        affected += stmt.execute(conn).await?.row_count();
    }

    tracing::debug!(target: "tabula.sql", table, rows = rows.len(), affected, "insert_many");
    Ok(affected)
}
