//! Immutable clause-map query builder.

use super::kind::QueryKind;
use super::render::{placeholders, sanitize_param_name, substitute};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::expr::{Criteria, Operand};
use crate::value::{Params, Value};
use indexmap::IndexMap;

/// Token replaced with the connection's table prefix before execution.
pub const PREFIX_TOKEN: &str = "{$prefix}";

/// A named clause of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Select,
    Insert,
    Update,
    Delete,
    From,
    Using,
    Join,
    Columns,
    Values,
    Set,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Upsert,
    Returning,
    Raw,
}

impl Clause {
    /// Leading keyword emitted before the clause text.
    pub fn keyword(&self) -> &'static str {
        match self {
            Clause::Select => "SELECT",
            Clause::Insert => "INSERT INTO",
            Clause::Update => "UPDATE",
            Clause::Delete => "DELETE FROM",
            Clause::From => "FROM",
            Clause::Using => "USING",
            Clause::Values => "VALUES",
            Clause::Set => "SET",
            Clause::Where => "WHERE",
            Clause::GroupBy => "GROUP BY",
            Clause::Having => "HAVING",
            Clause::OrderBy => "ORDER BY",
            Clause::Limit => "LIMIT",
            Clause::Returning => "RETURNING",
            Clause::Join | Clause::Columns | Clause::Upsert | Clause::Raw => "",
        }
    }
}

impl QueryKind {
    /// Clauses this statement kind accepts, in render order.
    pub fn clause_order(&self) -> &'static [Clause] {
        match self {
            QueryKind::Select => &[
                Clause::Select,
                Clause::From,
                Clause::Join,
                Clause::Where,
                Clause::GroupBy,
                Clause::Having,
                Clause::OrderBy,
                Clause::Limit,
            ],
            QueryKind::Insert => &[
                Clause::Insert,
                Clause::Columns,
                Clause::Values,
                Clause::Upsert,
                Clause::Returning,
            ],
            QueryKind::Update => &[
                Clause::Update,
                Clause::Join,
                Clause::Set,
                Clause::Where,
                Clause::OrderBy,
                Clause::Limit,
                Clause::Returning,
            ],
            QueryKind::Delete => &[
                Clause::Delete,
                Clause::Using,
                Clause::Join,
                Clause::Where,
                Clause::OrderBy,
                Clause::Limit,
                Clause::Returning,
            ],
            QueryKind::Raw => &[Clause::Raw],
        }
    }
}

/// JOIN flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinType {
    /// SQL keyword for this join.
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
        }
    }
}

/// Immutable SQL statement builder.
///
/// Every method takes `&self` and returns a new builder, so a partially
/// built query can be reused as a template. Structural mistakes (a clause
/// on the wrong statement kind, `or_where` before `where_clause`, a second
/// `limit`, ...) are recorded and reported by [`QueryBuilder::build`].
///
/// Values given through criteria maps are bound as `:name` parameters;
/// [`Expression`](crate::Expression) operands are emitted verbatim.
///
/// # Example
///
/// ```ignore
/// use tabula::QueryBuilder;
///
/// let q = QueryBuilder::select("id, name", "users")
///     .where_clause([("id", 5)])
///     .limit(1);
/// assert_eq!(q.build()?, "SELECT id, name\nFROM users\nWHERE id = :where_id\nLIMIT 1");
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    kind: QueryKind,
    dialect: Dialect,
    /// Fully formed clause text, without the leading keyword.
    clauses: IndexMap<Clause, String>,
    params: Params,
    replacements: IndexMap<String, String>,
    insert_columns: Vec<String>,
    insert_rows: Vec<Vec<String>>,
    conflict_columns: Vec<String>,
    no_cache: bool,
    build_error: Option<String>,
}

impl QueryBuilder {
    fn with_kind(kind: QueryKind, clause: Clause, text: String) -> Self {
        let mut clauses = IndexMap::new();
        clauses.insert(clause, text);
        Self {
            kind,
            dialect: Dialect::default(),
            clauses,
            params: Params::new(),
            replacements: IndexMap::new(),
            insert_columns: Vec::new(),
            insert_rows: Vec::new(),
            conflict_columns: Vec::new(),
            no_cache: false,
            build_error: None,
        }
    }

    /// `SELECT columns FROM tables`. Empty `columns` selects `*`.
    pub fn select(columns: &str, tables: &str) -> Self {
        let columns = if columns.trim().is_empty() {
            "*"
        } else {
            columns.trim()
        };
        let mut qb = Self::with_kind(QueryKind::Select, Clause::Select, columns.to_string());
        qb.clauses.insert(Clause::From, tables.trim().to_string());
        qb
    }

    /// `INSERT INTO table`
    pub fn insert(table: &str) -> Self {
        Self::with_kind(QueryKind::Insert, Clause::Insert, table.trim().to_string())
    }

    /// `UPDATE table`
    pub fn update(table: &str) -> Self {
        Self::with_kind(QueryKind::Update, Clause::Update, table.trim().to_string())
    }

    /// `DELETE FROM table`
    pub fn delete(table: &str) -> Self {
        Self::with_kind(QueryKind::Delete, Clause::Delete, table.trim().to_string())
    }

    /// Caller-supplied SQL with `:name` placeholders.
    pub fn raw(sql: impl Into<String>, params: Params) -> Self {
        let mut qb = Self::with_kind(QueryKind::Raw, Clause::Raw, sql.into());
        qb.params = params;
        qb
    }

    // ==================== accessors ====================

    /// Statement kind.
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Dialect used to render upserts and display literals.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Bound parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Text of a clause, if set.
    pub fn clause(&self, clause: Clause) -> Option<&str> {
        self.clauses.get(&clause).map(String::as_str)
    }

    /// Whether results may be served from the query cache.
    pub fn is_cacheable(&self) -> bool {
        !self.no_cache
    }

    /// The first recorded structural error, if any.
    pub fn error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    // ==================== internals ====================

    /// Clone, apply `f`, and keep the first error instead of the change.
    fn derive(&self, f: impl FnOnce(&mut Self) -> Result<(), String>) -> Self {
        if self.build_error.is_some() {
            return self.clone();
        }
        let mut next = self.clone();
        match f(&mut next) {
            Ok(()) => next,
            Err(message) => {
                let mut failed = self.clone();
                failed.build_error = Some(message);
                failed
            }
        }
    }

    fn require(&self, method: &str, allowed: &[QueryKind]) -> Result<(), String> {
        if allowed.contains(&self.kind) {
            Ok(())
        } else {
            Err(format!(
                "`{method}` is not valid on a {} query",
                self.kind.name()
            ))
        }
    }

    fn param_name(&self, base: &str) -> String {
        let base = sanitize_param_name(base);
        if !self.params.contains_key(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.params.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn merge_params(&mut self, params: &Params) -> Result<(), String> {
        for (name, value) in params {
            match self.params.get(name) {
                Some(existing) if existing != value => {
                    return Err(format!(
                        "parameter :{name} is bound twice with different values"
                    ));
                }
                _ => {
                    self.params.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    fn bind_operand(&mut self, base: &str, operand: &Operand) -> Result<String, String> {
        match operand {
            Operand::Value(value) => {
                let name = self.param_name(base);
                self.params.insert(name.clone(), value.clone());
                Ok(format!(":{name}"))
            }
            Operand::Expr(expr) => {
                self.merge_params(expr.params())?;
                Ok(expr.text().to_string())
            }
        }
    }

    /// Render a condition; `None` when the criteria is empty.
    fn render_condition(
        &mut self,
        prefix: &str,
        criteria: &Criteria,
    ) -> Result<Option<String>, String> {
        if criteria.is_empty() {
            return Ok(None);
        }
        let text = match criteria {
            Criteria::Map(map) => {
                let mut parts = Vec::with_capacity(map.len());
                for (column, operand) in map {
                    match operand {
                        Operand::Value(Value::Null) => parts.push(format!("{column} IS NULL")),
                        _ => {
                            let rhs = self.bind_operand(&format!("{prefix}_{column}"), operand)?;
                            parts.push(format!("{column} = {rhs}"));
                        }
                    }
                }
                parts.join(" AND ")
            }
            Criteria::Expr(expr) => {
                self.merge_params(expr.params())?;
                expr.text().to_string()
            }
            Criteria::Raw(sql) => sql.clone(),
        };
        Ok(Some(text))
    }

    fn render_assignments(&mut self, prefix: &str, criteria: &Criteria) -> Result<String, String> {
        match criteria {
            Criteria::Map(map) => {
                let mut parts = Vec::with_capacity(map.len());
                for (column, operand) in map {
                    let rhs = self.bind_operand(&format!("{prefix}_{column}"), operand)?;
                    parts.push(format!("{column} = {rhs}"));
                }
                Ok(parts.join(", "))
            }
            Criteria::Expr(expr) => {
                self.merge_params(expr.params())?;
                Ok(expr.text().to_string())
            }
            Criteria::Raw(sql) => Ok(sql.clone()),
        }
    }

    fn append(&mut self, clause: Clause, text: &str, separator: &str) {
        match self.clauses.get_mut(&clause) {
            Some(existing) if !existing.is_empty() => {
                existing.push_str(separator);
                existing.push_str(text);
            }
            _ => {
                self.clauses.insert(clause, text.to_string());
            }
        }
    }

    fn combine(&mut self, clause: Clause, condition: String, operator: &str) {
        let combined = match self.clauses.get(&clause) {
            Some(existing) => format!("({existing}) {operator} ({condition})"),
            None => condition,
        };
        self.clauses.insert(clause, combined);
    }

    fn refresh_insert_clauses(&mut self) {
        self.clauses
            .insert(Clause::Columns, format!("({})", self.insert_columns.join(", ")));
        let rows: Vec<String> = self
            .insert_rows
            .iter()
            .map(|row| format!("({})", row.join(", ")))
            .collect();
        self.clauses.insert(Clause::Values, rows.join(", "));
    }

    // ==================== SELECT ====================

    /// `SELECT DISTINCT`
    pub fn distinct(&self) -> Self {
        self.derive(|qb| {
            qb.require("distinct", &[QueryKind::Select])?;
            if let Some(cols) = qb.clauses.get_mut(&Clause::Select) {
                if !cols.starts_with("DISTINCT ") {
                    cols.insert_str(0, "DISTINCT ");
                }
            }
            Ok(())
        })
    }

    /// Add more tables to FROM.
    pub fn from(&self, tables: &str) -> Self {
        self.derive(|qb| {
            qb.require("from", &[QueryKind::Select])?;
            qb.append(Clause::From, tables.trim(), ", ");
            Ok(())
        })
    }

    // ==================== JOIN / USING ====================

    /// Add a JOIN.
    ///
    /// Valid on SELECT and UPDATE, and on DELETE once `using` was given.
    pub fn join(&self, table: &str, on: impl Into<Criteria>, join_type: JoinType) -> Self {
        let on = on.into();
        self.derive(|qb| {
            qb.require("join", &[QueryKind::Select, QueryKind::Update, QueryKind::Delete])?;
            if qb.kind == QueryKind::Delete && !qb.clauses.contains_key(&Clause::Using) {
                return Err("`join` on a DELETE query requires `using`".to_string());
            }
            let condition = qb
                .render_condition("join", &on)?
                .ok_or_else(|| format!("join on {table} has an empty condition"))?;
            let line = format!("{} {} ON {}", join_type.keyword(), table.trim(), condition);
            qb.append(Clause::Join, &line, "\n");
            Ok(())
        })
    }

    /// `INNER JOIN table ON ...`
    pub fn inner_join(&self, table: &str, on: impl Into<Criteria>) -> Self {
        self.join(table, on, JoinType::Inner)
    }

    /// `LEFT JOIN table ON ...`
    pub fn left_join(&self, table: &str, on: impl Into<Criteria>) -> Self {
        self.join(table, on, JoinType::Left)
    }

    /// `RIGHT JOIN table ON ...`
    pub fn right_join(&self, table: &str, on: impl Into<Criteria>) -> Self {
        self.join(table, on, JoinType::Right)
    }

    /// `DELETE FROM t USING tables`
    pub fn using(&self, tables: &str) -> Self {
        self.derive(|qb| {
            qb.require("using", &[QueryKind::Delete])?;
            qb.append(Clause::Using, tables.trim(), ", ");
            Ok(())
        })
    }

    // ==================== WHERE / HAVING ====================

    /// Add a WHERE condition, AND-ed with any existing one.
    ///
    /// Map entries become `column = :where_column` (`IS NULL` for null
    /// values). Empty criteria leave the builder unchanged.
    pub fn where_clause(&self, criteria: impl Into<Criteria>) -> Self {
        let criteria = criteria.into();
        self.derive(|qb| {
            qb.require(
                "where",
                &[QueryKind::Select, QueryKind::Update, QueryKind::Delete],
            )?;
            if let Some(condition) = qb.render_condition("where", &criteria)? {
                qb.combine(Clause::Where, condition, "AND");
            }
            Ok(())
        })
    }

    /// AND another WHERE condition. Requires an existing WHERE.
    pub fn and_where(&self, criteria: impl Into<Criteria>) -> Self {
        self.extend_condition("and_where", Clause::Where, "where", "AND", criteria.into())
    }

    /// OR another WHERE condition. Requires an existing WHERE.
    pub fn or_where(&self, criteria: impl Into<Criteria>) -> Self {
        self.extend_condition("or_where", Clause::Where, "where", "OR", criteria.into())
    }

    fn extend_condition(
        &self,
        method: &str,
        clause: Clause,
        prefix: &str,
        operator: &str,
        criteria: Criteria,
    ) -> Self {
        self.derive(|qb| {
            qb.require(method, &[QueryKind::Select, QueryKind::Update, QueryKind::Delete])?;
            if !qb.clauses.contains_key(&clause) {
                return Err(format!(
                    "`{method}` called before `{}`",
                    if clause == Clause::Where { "where_clause" } else { "having" }
                ));
            }
            if let Some(condition) = qb.render_condition(prefix, &criteria)? {
                qb.combine(clause, condition, operator);
            }
            Ok(())
        })
    }

    /// Add a GROUP BY expression.
    pub fn group_by(&self, expr: &str) -> Self {
        self.derive(|qb| {
            qb.require("group_by", &[QueryKind::Select])?;
            qb.append(Clause::GroupBy, expr.trim(), ", ");
            Ok(())
        })
    }

    /// Add a HAVING condition. Requires GROUP BY.
    pub fn having(&self, criteria: impl Into<Criteria>) -> Self {
        let criteria = criteria.into();
        self.derive(|qb| {
            qb.require("having", &[QueryKind::Select])?;
            if !qb.clauses.contains_key(&Clause::GroupBy) {
                return Err("`having` requires `group_by`".to_string());
            }
            if let Some(condition) = qb.render_condition("having", &criteria)? {
                qb.combine(Clause::Having, condition, "AND");
            }
            Ok(())
        })
    }

    /// AND another HAVING condition. Requires an existing HAVING.
    pub fn and_having(&self, criteria: impl Into<Criteria>) -> Self {
        self.extend_condition("and_having", Clause::Having, "having", "AND", criteria.into())
    }

    /// OR another HAVING condition. Requires an existing HAVING.
    pub fn or_having(&self, criteria: impl Into<Criteria>) -> Self {
        self.extend_condition("or_having", Clause::Having, "having", "OR", criteria.into())
    }

    // ==================== ORDER BY / LIMIT ====================

    /// Add an ORDER BY expression (e.g. `"name"` or `"created_at DESC"`).
    pub fn order_by(&self, expr: &str) -> Self {
        self.derive(|qb| {
            qb.require(
                "order_by",
                &[QueryKind::Select, QueryKind::Update, QueryKind::Delete],
            )?;
            qb.append(Clause::OrderBy, expr.trim(), ", ");
            Ok(())
        })
    }

    /// `ORDER BY column DESC`
    pub fn order_by_desc(&self, column: &str) -> Self {
        self.order_by(&format!("{} DESC", column.trim()))
    }

    /// `LIMIT n`. May be given once.
    pub fn limit(&self, n: u64) -> Self {
        self.derive(|qb| {
            qb.require("limit", &[QueryKind::Select, QueryKind::Update, QueryKind::Delete])?;
            if qb.clauses.contains_key(&Clause::Limit) {
                return Err("`limit` given twice".to_string());
            }
            qb.clauses.insert(Clause::Limit, n.to_string());
            Ok(())
        })
    }

    /// `LIMIT n OFFSET offset`. SELECT only.
    pub fn limit_offset(&self, n: u64, offset: u64) -> Self {
        self.derive(|qb| {
            if qb.kind != QueryKind::Select {
                return Err(format!(
                    "OFFSET is not valid on a {} query",
                    qb.kind.name()
                ));
            }
            if qb.clauses.contains_key(&Clause::Limit) {
                return Err("`limit` given twice".to_string());
            }
            qb.clauses.insert(Clause::Limit, format!("{n} OFFSET {offset}"));
            Ok(())
        })
    }

    // ==================== SET / VALUES / upsert ====================

    /// Assign columns.
    ///
    /// On UPDATE this extends SET. On INSERT it adds columns to the single
    /// row being inserted and only accepts a column map.
    pub fn set(&self, updates: impl Into<Criteria>) -> Self {
        let updates = updates.into();
        self.derive(|qb| {
            qb.require("set", &[QueryKind::Insert, QueryKind::Update])?;
            if updates.is_empty() {
                return Ok(());
            }
            if qb.kind == QueryKind::Update {
                let text = qb.render_assignments("set", &updates)?;
                qb.append(Clause::Set, &text, ", ");
                return Ok(());
            }

            let Criteria::Map(map) = &updates else {
                return Err("INSERT `set` requires a column map".to_string());
            };
            if qb.insert_rows.len() > 1 {
                return Err("`set` cannot extend a multi-row INSERT".to_string());
            }
            if qb.insert_rows.is_empty() {
                qb.insert_rows.push(Vec::new());
            }
            for (column, operand) in map {
                if qb.insert_columns.iter().any(|c| c == column) {
                    return Err(format!("column {column} is set twice"));
                }
                let placeholder = qb.bind_operand(column, operand)?;
                qb.insert_columns.push(column.clone());
                qb.insert_rows[0].push(placeholder);
            }
            qb.refresh_insert_clauses();
            Ok(())
        })
    }

    /// Insert several rows at once. Every row must have the same columns.
    pub fn values_many(&self, rows: &[Params]) -> Self {
        self.derive(|qb| {
            qb.require("values_many", &[QueryKind::Insert])?;
            if !qb.insert_rows.is_empty() {
                return Err("`values_many` cannot be combined with `set`".to_string());
            }
            let Some(first) = rows.first() else {
                return Err("`values_many` requires at least one row".to_string());
            };
            let columns: Vec<String> = first.keys().cloned().collect();
            for (index, row) in rows.iter().enumerate() {
                if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(c)) {
                    return Err(format!("row {index} has different columns than row 0"));
                }
                let mut placeholders = Vec::with_capacity(columns.len());
                for column in &columns {
                    let name = row_param_name(index, column);
                    qb.params.insert(name.clone(), row[column.as_str()].clone());
                    placeholders.push(format!(":{name}"));
                }
                qb.insert_rows.push(placeholders);
            }
            qb.insert_columns = columns;
            qb.refresh_insert_clauses();
            Ok(())
        })
    }

    /// Upsert assignments (`ON DUPLICATE KEY UPDATE` / `ON CONFLICT DO UPDATE`).
    pub fn on_duplicate_key_update(&self, updates: impl Into<Criteria>) -> Self {
        let updates = updates.into();
        self.derive(|qb| {
            qb.require("on_duplicate_key_update", &[QueryKind::Insert])?;
            if updates.is_empty() {
                return Err("upsert requires at least one assignment".to_string());
            }
            let text = qb.render_assignments("upd", &updates)?;
            qb.append(Clause::Upsert, &text, ", ");
            Ok(())
        })
    }

    /// Conflict target columns for `ON CONFLICT (...)` dialects.
    pub fn on_conflict(&self, columns: &[&str]) -> Self {
        self.derive(|qb| {
            qb.require("on_conflict", &[QueryKind::Insert])?;
            qb.conflict_columns = columns.iter().map(|c| c.to_string()).collect();
            Ok(())
        })
    }

    /// `RETURNING columns` on a write. Postgres and SQLite only; checked at build.
    pub fn returning(&self, columns: &str) -> Self {
        self.derive(|qb| {
            qb.require("returning", &[QueryKind::Insert, QueryKind::Update, QueryKind::Delete])?;
            if columns.trim().is_empty() {
                return Err("`returning` needs at least one column".to_string());
            }
            qb.append(Clause::Returning, columns.trim(), ", ");
            Ok(())
        })
    }

    // ==================== misc ====================

    /// Bind (or rebind) named parameters.
    pub fn bind(&self, params: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.derive(|qb| {
            qb.params.extend(params);
            Ok(())
        })
    }

    /// Replace `token` with `text` in the rendered SQL.
    pub fn replace(&self, token: &str, text: &str) -> Self {
        self.derive(|qb| {
            qb.replacements.insert(token.to_string(), text.to_string());
            Ok(())
        })
    }

    /// Render with a different dialect.
    pub fn with_dialect(&self, dialect: Dialect) -> Self {
        let mut next = self.clone();
        next.dialect = dialect;
        next
    }

    /// Bypass the query cache for this builder's fetches.
    pub fn no_cache(&self) -> Self {
        let mut next = self.clone();
        next.no_cache = true;
        next
    }

    /// Prepare for execution on a connection: adopt its dialect and table prefix.
    pub(crate) fn for_connection(&self, dialect: Dialect, prefix: Option<&str>) -> Self {
        let mut next = self.with_dialect(dialect);
        next.replacements
            .entry(PREFIX_TOKEN.to_string())
            .or_insert_with(|| prefix.unwrap_or_default().to_string());
        next
    }

    // ==================== rendering ====================

    fn check_complete(&self) -> OrmResult<()> {
        let missing = match self.kind {
            QueryKind::Select if self.clause(Clause::From).is_none_or(str::is_empty) => {
                Some("SELECT requires at least one table")
            }
            QueryKind::Insert if self.insert_rows.is_empty() => {
                Some("INSERT requires values (call `set` or `values_many`)")
            }
            QueryKind::Update if !self.clauses.contains_key(&Clause::Set) => {
                Some("UPDATE requires `set`")
            }
            QueryKind::Raw if self.clause(Clause::Raw).is_none_or(|s| s.trim().is_empty()) => {
                Some("raw query has no SQL")
            }
            _ => None,
        };
        match missing {
            Some(message) => Err(OrmError::build(message)),
            None => Ok(()),
        }
    }

    /// Render the statement with `:name` placeholders.
    pub fn build(&self) -> OrmResult<String> {
        if let Some(message) = &self.build_error {
            return Err(OrmError::build(message.clone()));
        }
        self.check_complete()?;

        let mut lines: Vec<String> = Vec::new();
        for clause in self.kind.clause_order() {
            let Some(text) = self.clauses.get(clause) else {
                continue;
            };
            match clause {
                Clause::Columns => {
                    if let Some(last) = lines.last_mut() {
                        last.push(' ');
                        last.push_str(text);
                    }
                }
                Clause::Upsert => lines.push(self.dialect.upsert_clause(&self.conflict_columns, text)?),
                Clause::Returning if !self.dialect.supports_returning() => {
                    return Err(OrmError::Unsupported(format!(
                        "RETURNING is not available on {}",
                        self.dialect.name()
                    )));
                }
                Clause::Join | Clause::Raw => lines.push(text.clone()),
                other => lines.push(format!("{} {}", other.keyword(), text)),
            }
        }

        let mut sql = lines.join("\n");
        for (token, text) in &self.replacements {
            sql = sql.replace(token.as_str(), text);
        }
        Ok(sql)
    }

    /// Render with every bound parameter inlined as a quoted literal.
    ///
    /// For display and logging only; execution always binds.
    pub fn to_sql(&self) -> OrmResult<String> {
        self.to_sql_with(|v| self.dialect.quote(v))
    }

    pub(crate) fn to_sql_with(&self, quote: impl Fn(&Value) -> String) -> OrmResult<String> {
        let sql = self.build()?;
        Ok(inline_params(&sql, &self.params, quote))
    }

    /// Rendered SQL plus exactly the parameters it references.
    ///
    /// Fails when a placeholder has no bound value.
    pub fn statement(&self) -> OrmResult<(String, Params)> {
        let sql = self.build()?;
        let bound = referenced_params(&sql, &self.params)?;
        Ok((sql, bound))
    }
}

/// Parameter name for `column` in row `index` of a multi-row insert.
pub(crate) fn row_param_name(index: usize, column: &str) -> String {
    format!("{}_{index}", sanitize_param_name(column))
}

/// Inline known parameters as literals; unknown placeholders stay as-is.
pub(crate) fn inline_params(sql: &str, params: &Params, quote: impl Fn(&Value) -> String) -> String {
    substitute(sql, |name| params.get(name).map(&quote))
}

/// Select the parameters `sql` references, failing on unbound ones.
pub(crate) fn referenced_params(sql: &str, params: &Params) -> OrmResult<Params> {
    let mut bound = Params::new();
    for ph in placeholders(sql) {
        if bound.contains_key(ph.name) {
            continue;
        }
        match params.get(ph.name) {
            Some(value) => {
                bound.insert(ph.name.to_string(), value.clone());
            }
            None => {
                return Err(OrmError::build(format!(
                    "no value bound for parameter :{}",
                    ph.name
                )));
            }
        }
    }
    Ok(bound)
}
