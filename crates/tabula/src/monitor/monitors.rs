use super::shorten_sql;
use super::types::{HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult};
use crate::query::QueryType;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl QueryMonitor for NoopMonitor {
    fn on_query_complete(&self, _ctx: &QueryContext, _duration: Duration, _result: &QueryResult) {}
}

/// Reports completed statements as `tabula.sql` events.
///
/// Successes are INFO, failures and slow statements WARN.
#[derive(Debug, Clone)]
pub struct LoggingMonitor {
    /// Skip statements faster than this.
    pub min_duration: Option<Duration>,
    pub max_sql_length: Option<usize>,
    /// Label attached to every event.
    pub prefix: String,
}

impl Default for LoggingMonitor {
    fn default() -> Self {
        Self {
            min_duration: None,
            max_sql_length: Some(200),
            prefix: String::from("[tabula]"),
        }
    }
}

impl LoggingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_duration(self, duration: Duration) -> Self {
        Self {
            min_duration: Some(duration),
            ..self
        }
    }

    pub fn max_sql_length(self, len: usize) -> Self {
        Self {
            max_sql_length: Some(len),
            ..self
        }
    }

    pub fn prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self
        }
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        shorten_sql(sql, self.max_sql_length)
    }

    /// Canonical SQL, plus what actually ran when a hook rewrote it.
    fn statement(&self, ctx: &QueryContext) -> String {
        let canonical = self.truncate_sql(&ctx.canonical_sql);
        if ctx.exec_sql == ctx.canonical_sql {
            return canonical;
        }
        format!("{canonical} (ran as: {})", self.truncate_sql(&ctx.exec_sql))
    }
}

impl QueryMonitor for LoggingMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        if self.min_duration.is_some_and(|min| duration < min) {
            return;
        }
        let sql = self.statement(ctx);
        let tag = ctx.tag.as_deref().unwrap_or("-");
        if result.is_error() {
            tracing::warn!(target: "tabula.sql", prefix = %self.prefix, tag, ?duration, %result, %sql, "statement failed");
        } else {
            tracing::info!(target: "tabula.sql", prefix = %self.prefix, tag, ?duration, %result, %sql, "statement done");
        }
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        let sql = self.statement(ctx);
        tracing::warn!(target: "tabula.sql", prefix = %self.prefix, ?duration, %sql, "slow statement");
    }
}

/// Running totals kept by [`StatsMonitor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    pub total_queries: u64,
    pub failed_queries: u64,
    /// Statements run through a prepared handle.
    pub prepared_queries: u64,
    /// Capped at `u64::MAX` nanoseconds.
    pub total_duration: Duration,
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    /// Records returned by reads.
    pub rows_read: u64,
    /// Rows reported changed by writes.
    pub rows_affected: u64,
    pub max_duration: Duration,
    /// Canonical SQL of the slowest statement.
    pub slowest_query: Option<String>,
}

impl QueryStats {
    fn record(&mut self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        self.total_queries += 1;
        self.prepared_queries += u64::from(ctx.prepared);
        self.total_duration = self
            .total_duration
            .saturating_add(duration)
            .min(Duration::from_nanos(u64::MAX));

        match ctx.query_type {
            QueryType::Select => self.select_count += 1,
            QueryType::Insert => self.insert_count += 1,
            QueryType::Update => self.update_count += 1,
            QueryType::Delete => self.delete_count += 1,
            QueryType::Other => {}
        }
        match result {
            QueryResult::Rows(n) => self.rows_read += *n as u64,
            QueryResult::Affected(n) => self.rows_affected += n,
            QueryResult::Error(_) => self.failed_queries += 1,
        }

        if duration > self.max_duration {
            self.max_duration = duration;
            self.slowest_query = Some(ctx.canonical_sql.clone());
        }
    }
}

/// Counts statements by type and tracks timings.
#[derive(Debug, Default)]
pub struct StatsMonitor {
    totals: Mutex<QueryStats>,
}

impl StatsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the totals so far.
    pub fn stats(&self) -> QueryStats {
        self.totals.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn reset(&self) {
        *self.totals.lock().unwrap_or_else(PoisonError::into_inner) = QueryStats::default();
    }
}

impl QueryMonitor for StatsMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(ctx, duration, result);
    }
}

/// Forwards every event to each monitor in turn.
#[derive(Default)]
pub struct CompositeMonitor {
    monitors: Vec<Arc<dyn QueryMonitor>>,
}

impl CompositeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add<M: QueryMonitor + 'static>(self, monitor: M) -> Self {
        self.add_arc(Arc::new(monitor))
    }

    pub fn add_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitors.push(monitor);
        self
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl QueryMonitor for CompositeMonitor {
    fn on_query_start(&self, ctx: &QueryContext) {
        self.monitors.iter().for_each(|m| m.on_query_start(ctx));
    }

    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        self.monitors
            .iter()
            .for_each(|m| m.on_query_complete(ctx, duration, result));
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        self.monitors.iter().for_each(|m| m.on_slow_query(ctx, duration));
    }
}

/// Runs hooks in order; each sees the SQL left by the previous one.
///
/// The first `Abort` stops the chain.
#[derive(Default)]
pub struct CompositeHook {
    hooks: Vec<Arc<dyn QueryHook>>,
}

impl CompositeHook {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add<H: QueryHook + 'static>(self, hook: H) -> Self {
        self.add_arc(Arc::new(hook))
    }

    pub fn add_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hooks.push(hook);
        self
    }
}

impl QueryHook for CompositeHook {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        let mut exec_sql: Option<String> = None;
        let mut canonical_sql: Option<String> = None;
        let mut view = ctx.clone();

        for hook in &self.hooks {
            match hook.before_query(&view) {
                HookAction::Continue => continue,
                abort @ HookAction::Abort(_) => return abort,
                HookAction::ModifySql {
                    exec_sql: exec,
                    canonical_sql: canonical,
                } => {
                    view.exec_sql = exec.clone();
                    exec_sql = Some(exec);
                    if let Some(canonical) = canonical {
                        view.canonical_sql = canonical.clone();
                        view.query_type = QueryType::from_sql(&canonical);
                        canonical_sql = Some(canonical);
                    }
                }
            }
        }

        let canonical_sql = canonical_sql.filter(|c| *c != ctx.canonical_sql);
        match exec_sql {
            Some(exec_sql) if exec_sql != ctx.exec_sql || canonical_sql.is_some() => {
                HookAction::ModifySql {
                    exec_sql,
                    canonical_sql,
                }
            }
            _ => HookAction::Continue,
        }
    }

    fn after_query(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        self.hooks
            .iter()
            .for_each(|h| h.after_query(ctx, duration, result));
    }
}
