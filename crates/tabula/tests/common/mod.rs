//! Scripted in-memory connection shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tabula::{Connection, Dialect, OrmError, OrmResult, Params, Record, Value};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Execute,
    QueryPrepared,
    ExecutePrepared,
}

/// One statement that reached the connection.
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub sql: String,
    pub params: Params,
}

#[derive(Debug, Clone)]
enum Response {
    Rows(Vec<Record>),
    Affected(u64),
    Fail(String),
}

/// Answers statements from scripted responses matched by SQL substring.
///
/// The most recently scripted match wins. Unmatched reads return no rows,
/// unmatched writes affect one row. Every instance gets a unique name so
/// cached results never leak between tests.
pub struct MockConnection {
    name: String,
    dialect: Dialect,
    prefix: Option<String>,
    calls: Mutex<Vec<Call>>,
    script: Mutex<Vec<(String, Response)>>,
    last_insert_id: Mutex<Option<Value>>,
    prepares: AtomicUsize,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::with_dialect(Dialect::MySql)
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            name: format!("mock-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            dialect,
            prefix: None,
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(Vec::new()),
            last_insert_id: Mutex::new(None),
            prepares: AtomicUsize::new(0),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn on_query(&self, pattern: &str, rows: Vec<Record>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push((pattern.to_string(), Response::Rows(rows)));
        self
    }

    pub fn on_execute(&self, pattern: &str, affected: u64) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push((pattern.to_string(), Response::Affected(affected)));
        self
    }

    pub fn fail_on(&self, pattern: &str, message: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push((pattern.to_string(), Response::Fail(message.to_string())));
        self
    }

    pub fn set_last_insert_id(&self, id: impl Into<Value>) {
        *self.last_insert_id.lock().unwrap() = Some(id.into());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn prepare_count(&self) -> usize {
        self.prepares.load(Ordering::Relaxed)
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn respond(&self, kind: CallKind, sql: &str, params: &Params) -> Option<Response> {
        self.calls.lock().unwrap().push(Call {
            kind,
            sql: sql.to_string(),
            params: params.clone(),
        });
        self.script
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
    }

    fn rows(&self, kind: CallKind, sql: &str, params: &Params) -> OrmResult<Vec<Record>> {
        match self.respond(kind, sql, params) {
            Some(Response::Rows(rows)) => Ok(rows),
            Some(Response::Fail(message)) => Err(OrmError::driver(message)),
            Some(Response::Affected(_)) | None => Ok(Vec::new()),
        }
    }

    fn affected(&self, kind: CallKind, sql: &str, params: &Params) -> OrmResult<u64> {
        match self.respond(kind, sql, params) {
            Some(Response::Affected(n)) => Ok(n),
            Some(Response::Fail(message)) => Err(OrmError::driver(message)),
            Some(Response::Rows(_)) | None => Ok(1),
        }
    }
}

impl Connection for MockConnection {
    type Statement = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn table_prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    async fn query(&self, sql: &str, params: &Params) -> OrmResult<Vec<Record>> {
        self.rows(CallKind::Query, sql, params)
    }

    async fn execute(&self, sql: &str, params: &Params) -> OrmResult<u64> {
        self.affected(CallKind::Execute, sql, params)
    }

    async fn prepare(&self, sql: &str) -> OrmResult<String> {
        self.prepares.fetch_add(1, Ordering::Relaxed);
        Ok(sql.to_string())
    }

    async fn query_prepared(&self, stmt: &String, params: &Params) -> OrmResult<Vec<Record>> {
        self.rows(CallKind::QueryPrepared, stmt, params)
    }

    async fn execute_prepared(&self, stmt: &String, params: &Params) -> OrmResult<u64> {
        self.affected(CallKind::ExecutePrepared, stmt, params)
    }

    async fn last_insert_id(&self) -> OrmResult<Option<Value>> {
        Ok(self.last_insert_id.lock().unwrap().clone())
    }
}
