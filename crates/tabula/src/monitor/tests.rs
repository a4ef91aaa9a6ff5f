use super::*;
use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::query;
use crate::record::Record;
use crate::value::{Params, Value};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Shared DummyConnection for tests ──

#[derive(Default)]
struct DummyConnection {
    seen: Mutex<Vec<String>>,
    delay: Option<Duration>,
    fail: bool,
}

impl DummyConnection {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    async fn run(&self, sql: &str) -> OrmResult<()> {
        self.seen.lock().unwrap().push(sql.to_string());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(OrmError::driver("relation does not exist"));
        }
        Ok(())
    }
}

impl Connection for DummyConnection {
    type Statement = String;

    fn name(&self) -> &str {
        "dummy"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, _: &Params) -> OrmResult<Vec<Record>> {
        self.run(sql).await?;
        Ok(vec![Record::new().with("id", 1), Record::new().with("id", 2)])
    }

    async fn execute(&self, sql: &str, _: &Params) -> OrmResult<u64> {
        self.run(sql).await?;
        Ok(3)
    }

    async fn prepare(&self, sql: &str) -> OrmResult<String> {
        Ok(sql.to_string())
    }

    async fn query_prepared(&self, stmt: &String, params: &Params) -> OrmResult<Vec<Record>> {
        self.query(stmt, params).await
    }

    async fn execute_prepared(&self, stmt: &String, params: &Params) -> OrmResult<u64> {
        self.execute(stmt, params).await
    }

    async fn last_insert_id(&self) -> OrmResult<Option<Value>> {
        Ok(Some(Value::Int(42)))
    }
}

#[derive(Default)]
struct Recorder {
    completed: Mutex<Vec<(String, String, QueryResult)>>,
    slow: Mutex<Vec<String>>,
}

impl QueryMonitor for Recorder {
    fn on_query_complete(&self, ctx: &QueryContext, _: Duration, result: &QueryResult) {
        self.completed.lock().unwrap().push((
            ctx.canonical_sql.clone(),
            ctx.exec_sql.clone(),
            result.clone(),
        ));
    }

    fn on_slow_query(&self, ctx: &QueryContext, _: Duration) {
        self.slow.lock().unwrap().push(ctx.canonical_sql.clone());
    }
}

struct Rewrite(&'static str, &'static str);

impl QueryHook for Rewrite {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        HookAction::ModifySql {
            exec_sql: ctx.exec_sql.replace(self.0, self.1),
            canonical_sql: None,
        }
    }
}

struct DenyDeletes;

impl QueryHook for DenyDeletes {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        if ctx.query_type == QueryType::Delete {
            HookAction::Abort("deletes are disabled".into())
        } else {
            HookAction::Continue
        }
    }
}

#[test]
fn test_logging_monitor_truncation() {
    let monitor = LoggingMonitor::new().max_sql_length(10);
    assert_eq!(monitor.truncate_sql("SELECT * FROM users"), "SELECT * F...");
    assert_eq!(monitor.truncate_sql("SELECT 1"), "SELECT 1");
}

#[test]
fn tracing_hook_truncates_on_char_boundary() {
    let hook = TracingSqlHook::new().max_sql_length(8);
    assert_eq!(hook.truncate_sql("SELECT 'héllo'"), "SELECT '...");
    assert_eq!(hook.no_truncate().truncate_sql("SELECT 'héllo'"), "SELECT 'héllo'");
}

#[test]
fn tracing_hook_folds_builder_sql() {
    let sql = "SELECT id\nFROM users\nWHERE id = :where_id";
    let hook = TracingSqlHook::new();
    assert_eq!(hook.truncate_sql(sql), "SELECT id FROM users WHERE id = :where_id");
    assert_eq!(hook.clone().multi_line().truncate_sql(sql), sql);
    assert_eq!(hook.max_sql_length(9).truncate_sql(sql), "SELECT id...");
}

#[test]
fn tracing_hook_can_skip_reads() {
    let hook = TracingSqlHook::new().writes_only();
    assert!(hook.writes_only);
    for sql in ["SELECT 1", "DELETE FROM t"] {
        assert_eq!(hook.before_query(&QueryContext::new(sql, 0)), HookAction::Continue);
    }
}

#[test]
fn stats_monitor_counts_rows() {
    let monitor = StatsMonitor::new();
    monitor.on_query_complete(&QueryContext::new("SELECT * FROM t", 0), Duration::ZERO, &QueryResult::Rows(4));
    monitor.on_query_complete(&QueryContext::new("UPDATE t SET a = 1", 0), Duration::ZERO, &QueryResult::Affected(3));
    monitor.on_query_complete(&QueryContext::new("DELETE FROM t", 0), Duration::ZERO, &QueryResult::error("locked".into()));

    let stats = monitor.stats();
    assert_eq!(stats.rows_read, 4);
    assert_eq!(stats.rows_affected, 3);
    assert_eq!(stats.failed_queries, 1);
    assert_eq!(stats.slowest_query, None);
}

#[test]
fn query_result_error_is_capped() {
    let long = "é".repeat(400);
    match QueryResult::error(long) {
        QueryResult::Error(msg) => {
            assert!(msg.ends_with("..."));
            assert_eq!(msg.len(), 512 + 3);
        }
        other => panic!("unexpected result: {other}"),
    }
}

#[test]
fn stats_monitor_tracks_all_query_types() {
    let monitor = StatsMonitor::new();
    for sql in [
        "SELECT 1",
        "INSERT INTO t (a) VALUES (:a)",
        "UPDATE t SET a = :set_a",
        "DELETE FROM t",
        "CREATE TABLE t (a INT)",
    ] {
        monitor.on_query_complete(&QueryContext::new(sql, 0), Duration::from_millis(1), &QueryResult::Affected(1));
    }
    monitor.on_query_complete(
        &QueryContext::new("SELECT * FROM missing", 0),
        Duration::from_millis(1),
        &QueryResult::error("no such table".into()),
    );

    let stats = monitor.stats();
    assert_eq!(stats.total_queries, 6);
    assert_eq!(stats.select_count, 2);
    assert_eq!(stats.insert_count, 1);
    assert_eq!(stats.update_count, 1);
    assert_eq!(stats.delete_count, 1);
    assert_eq!(stats.failed_queries, 1);
    assert_eq!(stats.total_duration, Duration::from_millis(6));
}

#[test]
fn stats_monitor_tracks_slowest_query() {
    let monitor = StatsMonitor::new();
    let fast = QueryContext::new("SELECT 1", 0);
    let slow = QueryContext::new("SELECT pg_sleep(1)", 0);

    monitor.on_query_complete(&fast, Duration::from_millis(5), &QueryResult::Rows(1));
    monitor.on_query_complete(&slow, Duration::from_millis(50), &QueryResult::Rows(1));
    monitor.on_query_complete(&fast, Duration::from_millis(10), &QueryResult::Rows(1));

    let stats = monitor.stats();
    assert_eq!(stats.max_duration, Duration::from_millis(50));
    assert_eq!(stats.slowest_query.as_deref(), Some("SELECT pg_sleep(1)"));
}

#[test]
fn stats_monitor_reset_clears_all() {
    let monitor = StatsMonitor::new();
    let ctx = QueryContext::new("DELETE FROM t", 0);
    monitor.on_query_complete(&ctx, Duration::from_millis(5), &QueryResult::Affected(2));
    monitor.reset();
    assert_eq!(monitor.stats(), QueryStats::default());
}

#[test]
fn stats_monitor_duration_saturates_on_overflow() {
    let monitor = StatsMonitor::new();
    let ctx = QueryContext::new("SELECT 1", 0);
    monitor.on_query_complete(&ctx, Duration::from_nanos(u64::MAX - 1), &QueryResult::Rows(0));
    monitor.on_query_complete(&ctx, Duration::from_nanos(10), &QueryResult::Rows(0));
    assert_eq!(monitor.stats().total_duration, Duration::from_nanos(u64::MAX));
}

#[test]
fn composite_hook_chains_multiple_modifiers() {
    let hook = CompositeHook::new()
        .add(Rewrite("users", "app.users"))
        .add(Rewrite("SELECT", "SELECT /* traced */"));
    let ctx = QueryContext::new("SELECT * FROM users", 0);

    assert_eq!(
        hook.before_query(&ctx),
        HookAction::ModifySql {
            exec_sql: "SELECT /* traced */ * FROM app.users".into(),
            canonical_sql: None,
        }
    );
}

#[test]
fn composite_hook_abort_stops_chain() {
    let hook = CompositeHook::new()
        .add(DenyDeletes)
        .add(Rewrite("t", "never"));
    let ctx = QueryContext::new("DELETE FROM t", 0);
    assert_eq!(hook.before_query(&ctx), HookAction::Abort("deletes are disabled".into()));
}

#[test]
fn composite_hook_continue_only_returns_continue() {
    let hook = CompositeHook::new().add(DenyDeletes).add(TracingSqlHook::new());
    let ctx = QueryContext::new("SELECT 1", 0);
    assert_eq!(hook.before_query(&ctx), HookAction::Continue);
}

#[test]
fn composite_monitor_fans_out() {
    let a = Arc::new(StatsMonitor::new());
    let b = Arc::new(StatsMonitor::new());
    let monitor = CompositeMonitor::new()
        .add_arc(a.clone())
        .add_arc(b.clone())
        .add(NoopMonitor);
    assert_eq!(monitor.len(), 3);

    monitor.on_query_complete(&QueryContext::new("SELECT 1", 0), Duration::ZERO, &QueryResult::Rows(1));
    assert_eq!(a.stats().total_queries, 1);
    assert_eq!(b.stats().total_queries, 1);
}

#[test]
fn query_result_error_truncation() {
    let long = "x".repeat(600);
    let QueryResult::Error(msg) = QueryResult::error(long) else {
        panic!("expected an error result");
    };
    assert_eq!(msg.len(), 515);
    assert!(msg.ends_with("..."));
}

#[test]
fn query_result_display() {
    assert_eq!(QueryResult::Rows(2).to_string(), "2 rows");
    assert_eq!(QueryResult::Affected(1).to_string(), "1 affected");
    assert_eq!(QueryResult::Error("boom".into()).to_string(), "error: boom");
}

#[tokio::test]
async fn instrumented_hook_abort_prevents_execution() {
    let conn = InstrumentedConnection::new(DummyConnection::default()).with_hook(DenyDeletes);

    let err = conn.execute("DELETE FROM users", &Params::new()).await.unwrap_err();
    assert!(matches!(err, OrmError::Aborted(ref reason) if reason == "deletes are disabled"));
    assert!(conn.inner().seen().is_empty());
}

#[tokio::test]
async fn instrumented_hook_modifies_sql() {
    let recorder = Arc::new(Recorder::default());
    let conn = InstrumentedConnection::new(DummyConnection::default())
        .with_hook(Rewrite("users", "archive.users"))
        .with_monitor_arc(recorder.clone())
        .enable_monitoring();

    let rows = conn.query("SELECT * FROM users", &Params::new()).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(conn.inner().seen(), vec!["SELECT * FROM archive.users"]);
    assert_eq!(
        recorder.completed.lock().unwrap().clone(),
        vec![(
            "SELECT * FROM users".to_string(),
            "SELECT * FROM archive.users".to_string(),
            QueryResult::Rows(2),
        )]
    );
}

#[tokio::test]
async fn instrumented_monitoring_disabled_skips_monitor() {
    let recorder = Arc::new(Recorder::default());
    let conn = InstrumentedConnection::new(DummyConnection::default())
        .with_monitor_arc(recorder.clone());

    conn.execute("UPDATE t SET a = 1", &Params::new()).await.unwrap();
    assert!(!conn.is_monitoring_enabled());
    assert!(recorder.completed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn instrumented_slow_query_threshold() {
    let recorder = Arc::new(Recorder::default());
    let dummy = DummyConnection {
        delay: Some(Duration::from_millis(15)),
        ..Default::default()
    };
    let conn = InstrumentedConnection::new(dummy)
        .with_config(
            MonitorConfig::new()
                .with_slow_query_threshold(Duration::from_millis(5))
                .enable_monitoring(),
        )
        .with_monitor_arc(recorder.clone());

    conn.query("SELECT 1", &Params::new()).await.unwrap();
    assert_eq!(recorder.slow.lock().unwrap().clone(), vec!["SELECT 1"]);
}

#[tokio::test]
async fn instrumented_reports_errors() {
    let stats = Arc::new(StatsMonitor::new());
    let dummy = DummyConnection {
        fail: true,
        ..Default::default()
    };
    let conn = InstrumentedConnection::new(dummy)
        .with_monitor_arc(stats.clone())
        .enable_monitoring();

    assert!(conn.query("SELECT * FROM nope", &Params::new()).await.is_err());
    assert_eq!(stats.stats().failed_queries, 1);
}

#[tokio::test]
async fn instrumented_prepared_statements_are_hooked_once_and_counted() {
    let stats = Arc::new(StatsMonitor::new());
    let conn = InstrumentedConnection::new(DummyConnection::default())
        .with_hook(Rewrite("t", "t_2024"))
        .with_monitor_arc(stats.clone())
        .enable_monitoring()
        .with_tag("import");

    let stmt = conn.prepare("INSERT INTO t (a) VALUES (:a)").await.unwrap();
    assert_eq!(stmt.exec_sql(), "INSERT INTO t_2024 (a) VALUES (:a)");

    let params: Params = [("a".to_string(), Value::Int(1))].into_iter().collect();
    assert_eq!(conn.execute_prepared(&stmt, &params).await.unwrap(), 3);
    assert_eq!(conn.execute_prepared(&stmt, &params).await.unwrap(), 3);

    let snapshot = stats.stats();
    assert_eq!(snapshot.insert_count, 2);
    assert_eq!(snapshot.prepared_queries, 2);
    assert_eq!(conn.inner().seen().len(), 2);
}

#[tokio::test]
async fn builder_runs_through_instrumented_connection() {
    let stats = Arc::new(StatsMonitor::new());
    let conn = InstrumentedConnection::new(DummyConnection::default())
        .add_hook(TracingSqlHook::new())
        .add_hook(DenyDeletes)
        .with_monitor_arc(stats.clone())
        .enable_monitoring();

    let rows = query::select("id", "monitored_users")
        .no_cache()
        .fetch_all(&conn)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let err = query::delete("monitored_users").execute(&conn).await.unwrap_err();
    assert!(matches!(err, OrmError::Aborted(_)));
    assert!(err.sql().is_none());
    assert_eq!(stats.stats().select_count, 1);
    assert_eq!(conn.last_insert_id().await.unwrap(), Some(Value::Int(42)));
}

#[test]
fn config_flags_only_statements_over_the_threshold() {
    let config = MonitorConfig::new().with_slow_query_threshold(Duration::from_millis(10));
    assert!(!config.monitoring_enabled);
    assert!(!config.is_slow(Duration::from_millis(10)));
    assert!(config.is_slow(Duration::from_millis(11)));
    assert!(!MonitorConfig::new().is_slow(Duration::from_secs(60)));
    assert!(config.enable_monitoring().monitoring_enabled);
}
