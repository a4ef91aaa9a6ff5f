//! Statement kinds and SQL keyword detection.

/// The statement a [`QueryBuilder`](super::QueryBuilder) produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Caller-supplied SQL.
    Raw,
}

impl QueryKind {
    /// Statement name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            QueryKind::Select => "SELECT",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
            QueryKind::Delete => "DELETE",
            QueryKind::Raw => "raw",
        }
    }
}

/// Type of SQL statement, detected from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// SELECT query
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// Other SQL (e.g., DDL, SHOW, custom)
    Other,
}

impl QueryType {
    /// Detect the statement type from SQL text.
    ///
    /// For CTEs (`WITH ...`), looks past the CTE definitions to find the
    /// actual DML keyword.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = strip_sql_prefix(sql);
        if starts_with_keyword(trimmed, "SELECT") {
            QueryType::Select
        } else if starts_with_keyword(trimmed, "INSERT") || starts_with_keyword(trimmed, "REPLACE")
        {
            QueryType::Insert
        } else if starts_with_keyword(trimmed, "UPDATE") {
            QueryType::Update
        } else if starts_with_keyword(trimmed, "DELETE") {
            QueryType::Delete
        } else if starts_with_keyword(trimmed, "WITH") {
            detect_cte_dml(trimmed)
        } else {
            QueryType::Other
        }
    }
}

/// Whether executing `sql` yields a result set rather than an affected-row count.
pub(crate) fn returns_rows(sql: &str) -> bool {
    let trimmed = strip_sql_prefix(sql);
    match QueryType::from_sql(sql) {
        QueryType::Select => true,
        QueryType::Insert | QueryType::Update | QueryType::Delete => {
            contains_keyword(trimmed, "RETURNING")
        }
        QueryType::Other => ["SHOW", "DESCRIBE", "EXPLAIN", "PRAGMA", "VALUES", "TABLE"]
            .iter()
            .any(|kw| starts_with_keyword(trimmed, kw)),
    }
}

/// Strip leading whitespace, comments and parentheses to reach the first keyword.
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") {
            match s.find('\n') {
                Some(pos) => {
                    s = &s[pos + 1..];
                    continue;
                }
                None => return "",
            }
        }
        if s.starts_with("/*") {
            match s.find("*/") {
                Some(pos) => {
                    s = &s[pos + 2..];
                    continue;
                }
                None => return "",
            }
        }
        if let Some(rest) = s.strip_prefix('(') {
            s = rest;
            continue;
        }
        if s == before {
            break;
        }
    }
    s
}

pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) => {
            prefix.eq_ignore_ascii_case(keyword)
                && !s[keyword.len()..]
                    .bytes()
                    .next()
                    .is_some_and(|b| b == b'_' || b.is_ascii_alphanumeric())
        }
        None => false,
    }
}

fn contains_keyword(s: &str, keyword: &str) -> bool {
    s.split(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
        .any(|word| word.eq_ignore_ascii_case(keyword))
}

fn detect_cte_dml(sql: &str) -> QueryType {
    // The final statement follows the last top-level closing paren.
    let mut depth: i32 = 0;
    let mut last_top_level = 0;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    last_top_level = i + 1;
                }
            }
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let remainder = sql[last_top_level..].trim_start();
    if starts_with_keyword(remainder, "INSERT") {
        QueryType::Insert
    } else if starts_with_keyword(remainder, "UPDATE") {
        QueryType::Update
    } else if starts_with_keyword(remainder, "DELETE") {
        QueryType::Delete
    } else {
        QueryType::Select
    }
}
