use super::shorten_sql;
use super::types::{HookAction, QueryContext, QueryHook};
use crate::query::QueryType;
use tracing::Level;

/// Logs each statement under `tabula.sql` just before it reaches the
/// connection, so it works with monitoring switched off.
///
/// Builder SQL is rendered one clause per line; `single_line` folds it for
/// log lines. Long statements are cut at a char boundary.
#[derive(Debug, Clone)]
pub struct TracingSqlHook {
    pub level: Level,
    /// Byte limit for the logged SQL, `None` for no limit.
    pub max_sql_length: Option<usize>,
    /// Fold line breaks into single spaces.
    pub single_line: bool,
    /// Skip SELECT and other reads.
    pub writes_only: bool,
}

impl Default for TracingSqlHook {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
            single_line: true,
            writes_only: false,
        }
    }
}

impl TracingSqlHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(self, level: Level) -> Self {
        Self { level, ..self }
    }

    pub fn max_sql_length(self, len: usize) -> Self {
        Self {
            max_sql_length: Some(len),
            ..self
        }
    }

    pub fn no_truncate(self) -> Self {
        Self {
            max_sql_length: None,
            ..self
        }
    }

    /// Keep the builder's clause-per-line layout.
    pub fn multi_line(self) -> Self {
        Self {
            single_line: false,
            ..self
        }
    }

    /// Only log INSERT, UPDATE and DELETE statements.
    pub fn writes_only(self) -> Self {
        Self {
            writes_only: true,
            ..self
        }
    }

    fn wants(&self, query_type: QueryType) -> bool {
        !self.writes_only
            || matches!(query_type, QueryType::Insert | QueryType::Update | QueryType::Delete)
    }

    /// The SQL as it will appear in the event.
    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        let folded;
        let sql = if self.single_line && sql.contains('\n') {
            folded = sql.split_whitespace().collect::<Vec<_>>().join(" ");
            folded.as_str()
        } else {
            sql
        };
        shorten_sql(sql, self.max_sql_length)
    }
}

impl QueryHook for TracingSqlHook {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        if !self.wants(ctx.query_type) {
            return HookAction::Continue;
        }
        let sql = self.truncate_sql(&ctx.exec_sql);
        let tag = ctx.tag.as_deref().unwrap_or("-");

        // event macros need the level at compile time
        macro_rules! log_statement {
            ($event:ident) => {
                tracing::$event!(
                    target: "tabula.sql",
                    query_type = ?ctx.query_type,
                    tag,
                    params = ctx.param_count,
                    prepared = ctx.prepared,
                    fields = ?ctx.fields,
                    sql = %sql,
                )
            };
        }
        match self.level {
            Level::TRACE => log_statement!(trace),
            Level::DEBUG => log_statement!(debug),
            Level::INFO => log_statement!(info),
            Level::WARN => log_statement!(warn),
            _ => log_statement!(error),
        }
        HookAction::Continue
    }
}
