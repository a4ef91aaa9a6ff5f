use super::config::MonitorConfig;
use super::monitors::{CompositeHook, NoopMonitor};
use super::types::{HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult};
use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::query::QueryType;
use crate::record::Record;
use crate::value::{Params, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A [`Connection`] wrapper that runs hooks and reports to a monitor.
///
/// Every `query`, `execute` and prepared execution passes through the
/// hook first (which may rewrite or abort it) and is then timed and
/// reported. Monitoring must be enabled through [`MonitorConfig`].
pub struct InstrumentedConnection<C> {
    conn: C,
    monitor: Arc<dyn QueryMonitor>,
    hook: Option<Arc<dyn QueryHook>>,
    config: MonitorConfig,
    tag: Option<String>,
}

/// Prepared handle of an [`InstrumentedConnection`].
///
/// Carries the context the hook produced at prepare time.
#[derive(Debug)]
pub struct InstrumentedStatement<S> {
    ctx: QueryContext,
    inner: S,
}

impl<S> InstrumentedStatement<S> {
    /// SQL the wrapped connection compiled.
    pub fn exec_sql(&self) -> &str {
        &self.ctx.exec_sql
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<C: Connection> InstrumentedConnection<C> {
    /// Wrap `conn` with no monitor, no hook and monitoring disabled.
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            monitor: Arc::new(NoopMonitor),
            hook: None,
            config: MonitorConfig::default(),
            tag: None,
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_monitor<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Replace the hook.
    pub fn with_hook<H: QueryHook + 'static>(mut self, hook: H) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn with_hook_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Add a hook after any existing one.
    pub fn add_hook<H: QueryHook + 'static>(self, hook: H) -> Self {
        self.add_hook_arc(Arc::new(hook))
    }

    pub fn add_hook_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hook = Some(match self.hook.take() {
            None => hook,
            Some(existing) => Arc::new(CompositeHook::new().add_arc(existing).add_arc(hook)),
        });
        self
    }

    /// Tag attached to every context created by this connection.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn enable_monitoring(mut self) -> Self {
        self.config.monitoring_enabled = true;
        self
    }

    pub fn disable_monitoring(mut self) -> Self {
        self.config.monitoring_enabled = false;
        self
    }

    pub fn is_monitoring_enabled(&self) -> bool {
        self.config.monitoring_enabled
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn inner(&self) -> &C {
        &self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    fn context(&self, sql: &str, param_count: usize) -> QueryContext {
        let mut ctx = QueryContext::new(sql, param_count);
        ctx.tag.clone_from(&self.tag);
        ctx
    }

    fn apply_hook(&self, ctx: &mut QueryContext) -> OrmResult<()> {
        let Some(hook) = &self.hook else {
            return Ok(());
        };

        match hook.before_query(ctx) {
            HookAction::Continue => Ok(()),
            HookAction::ModifySql {
                exec_sql,
                canonical_sql,
            } => {
                ctx.exec_sql = exec_sql;
                if let Some(canonical_sql) = canonical_sql {
                    ctx.canonical_sql = canonical_sql;
                }
                ctx.query_type = QueryType::from_sql(&ctx.canonical_sql);
                Ok(())
            }
            HookAction::Abort(reason) => {
                tracing::warn!(
                    target: "tabula.sql",
                    connection = self.conn.name(),
                    %reason,
                    sql = %ctx.canonical_sql,
                    "statement aborted by hook"
                );
                Err(OrmError::Aborted(reason))
            }
        }
    }

    fn report_result(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        if !self.config.monitoring_enabled {
            return;
        }

        if let Some(hook) = &self.hook {
            hook.after_query(ctx, duration, result);
        }

        self.monitor.on_query_complete(ctx, duration, result);

        if self.config.is_slow(duration) {
            self.monitor.on_slow_query(ctx, duration);
        }
    }

    async fn observe<T, F>(
        &self,
        ctx: &QueryContext,
        future: F,
        summarize: impl Fn(&T) -> QueryResult,
    ) -> OrmResult<T>
    where
        F: Future<Output = OrmResult<T>>,
    {
        if self.config.monitoring_enabled {
            self.monitor.on_query_start(ctx);
        }

        let start = Instant::now();
        let result = future.await;
        let duration = start.elapsed();

        let query_result = match &result {
            Ok(value) => summarize(value),
            Err(e) => QueryResult::error(e.to_string()),
        };
        self.report_result(ctx, duration, &query_result);
        result
    }
}

impl<C: Connection> Connection for InstrumentedConnection<C> {
    type Statement = InstrumentedStatement<C::Statement>;

    fn name(&self) -> &str {
        self.conn.name()
    }

    fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    fn table_prefix(&self) -> Option<&str> {
        self.conn.table_prefix()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.conn.attribute(name)
    }

    fn quote(&self, value: &Value) -> String {
        self.conn.quote(value)
    }

    async fn query(&self, sql: &str, params: &Params) -> OrmResult<Vec<Record>> {
        let mut ctx = self.context(sql, params.len());
        self.apply_hook(&mut ctx)?;
        self.observe(&ctx, self.conn.query(&ctx.exec_sql, params), |rows: &Vec<Record>| {
            QueryResult::Rows(rows.len())
        })
        .await
    }

    async fn execute(&self, sql: &str, params: &Params) -> OrmResult<u64> {
        let mut ctx = self.context(sql, params.len());
        self.apply_hook(&mut ctx)?;
        self.observe(&ctx, self.conn.execute(&ctx.exec_sql, params), |n: &u64| {
            QueryResult::Affected(*n)
        })
        .await
    }

    async fn prepare(&self, sql: &str) -> OrmResult<Self::Statement> {
        let mut ctx = self.context(sql, 0);
        ctx.prepared = true;
        self.apply_hook(&mut ctx)?;
        let inner = self.conn.prepare(&ctx.exec_sql).await?;
        Ok(InstrumentedStatement { ctx, inner })
    }

    async fn query_prepared(&self, stmt: &Self::Statement, params: &Params) -> OrmResult<Vec<Record>> {
        let mut ctx = stmt.ctx.clone();
        ctx.param_count = params.len();
        self.observe(&ctx, self.conn.query_prepared(&stmt.inner, params), |rows: &Vec<Record>| {
            QueryResult::Rows(rows.len())
        })
        .await
    }

    async fn execute_prepared(&self, stmt: &Self::Statement, params: &Params) -> OrmResult<u64> {
        let mut ctx = stmt.ctx.clone();
        ctx.param_count = params.len();
        self.observe(&ctx, self.conn.execute_prepared(&stmt.inner, params), |n: &u64| {
            QueryResult::Affected(*n)
        })
        .await
    }

    async fn last_insert_id(&self) -> OrmResult<Option<Value>> {
        self.conn.last_insert_id().await
    }
}
