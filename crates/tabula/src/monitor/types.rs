use crate::query::QueryType;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// A statement on its way to a connection.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// SQL as issued by the caller; used for stats aggregation.
    pub canonical_sql: String,
    /// SQL actually handed to the wrapped connection.
    pub exec_sql: String,
    /// Number of bound parameters.
    pub param_count: usize,
    /// Detected statement type.
    pub query_type: QueryType,
    /// Whether the statement runs through a prepared handle.
    pub prepared: bool,
    /// Optional tag identifying the caller.
    pub tag: Option<String>,
    /// Low-cardinality structured fields.
    pub fields: BTreeMap<String, String>,
}

impl QueryContext {
    pub fn new(sql: &str, param_count: usize) -> Self {
        Self {
            canonical_sql: sql.to_string(),
            exec_sql: sql.to_string(),
            param_count,
            query_type: QueryType::from_sql(sql),
            prepared: false,
            tag: None,
            fields: BTreeMap::new(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Add a structured field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

const MAX_ERROR_LEN: usize = 512;

/// Outcome of a statement, as reported to monitors.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows returned.
    Rows(usize),
    /// Rows affected by a write.
    Affected(u64),
    /// Statement failed; message truncated to 512 bytes.
    Error(String),
}

impl QueryResult {
    /// An error result with the message truncated.
    pub fn error(msg: String) -> Self {
        Self::Error(super::shorten_sql(&msg, Some(MAX_ERROR_LEN)))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Observes statement execution.
pub trait QueryMonitor: Send + Sync {
    /// Called before a statement runs.
    fn on_query_start(&self, _ctx: &QueryContext) {}

    /// Called after a statement completes, successfully or not.
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult);

    /// Called when a statement exceeds the slow query threshold.
    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}

/// What to do with a statement after a hook has seen it.
#[derive(Debug, Clone, PartialEq)]
pub enum HookAction {
    /// Run the statement unchanged.
    Continue,
    /// Run different SQL.
    ModifySql {
        /// SQL to hand to the connection.
        exec_sql: String,
        /// Replacement canonical SQL, if the statement's identity changes too.
        canonical_sql: Option<String>,
    },
    /// Refuse to run the statement; surfaces as [`OrmError::Aborted`](crate::OrmError::Aborted).
    Abort(String),
}

/// Intercepts statements before and after execution.
pub trait QueryHook: Send + Sync {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        let _ = ctx;
        HookAction::Continue
    }

    /// Called after completion, before monitors see the result.
    fn after_query(&self, _ctx: &QueryContext, _duration: Duration, _result: &QueryResult) {}
}
