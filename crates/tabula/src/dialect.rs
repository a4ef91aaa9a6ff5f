//! SQL dialect differences that affect rendered statements.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// Target SQL dialect.
///
/// The dialect decides literal quoting (used by `to_sql()` for display and
/// by the default `Connection::quote`), identifier quoting and upsert syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// MySQL / MariaDB
    #[default]
    MySql,
    /// PostgreSQL
    Postgres,
    /// SQLite
    Sqlite,
}

impl Dialect {
    /// Dialect name.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Identifier quote character.
    pub fn identifier_quote(&self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Postgres | Dialect::Sqlite => '"',
        }
    }

    /// Quote an identifier, doubling embedded quote characters.
    pub fn quote_identifier(&self, name: &str) -> String {
        let q = self.identifier_quote();
        let escaped = name.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Render `value` as an escaped SQL literal.
    ///
    /// Only used for display and logging; execution binds parameters.
    pub fn quote(&self, value: &Value) -> String {
        match value {
            Value::Null => String::from("NULL"),
            Value::Bool(b) => match (self, b) {
                (Dialect::MySql, true) | (Dialect::Sqlite, true) => String::from("1"),
                (Dialect::MySql, false) | (Dialect::Sqlite, false) => String::from("0"),
                (Dialect::Postgres, true) => String::from("TRUE"),
                (Dialect::Postgres, false) => String::from("FALSE"),
            },
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => self.quote_str(s),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                match self {
                    Dialect::Postgres => format!("'\\x{hex}'"),
                    _ => format!("X'{hex}'"),
                }
            }
            Value::Json(j) => self.quote_str(&j.to_string()),
            Value::Timestamp(ts) => self.quote_str(&ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            Value::Uuid(u) => self.quote_str(&u.to_string()),
        }
    }

    fn quote_str(&self, s: &str) -> String {
        let escaped = match self {
            Dialect::MySql => s.replace('\\', "\\\\").replace('\'', "''"),
            Dialect::Postgres | Dialect::Sqlite => s.replace('\'', "''"),
        };
        format!("'{escaped}'")
    }

    /// Whether an upsert may wrap the auto-increment column as
    /// `col = LAST_INSERT_ID(col)` so the connection reports the existing id.
    pub fn supports_last_insert_id_wrap(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Whether writes accept a `RETURNING` clause.
    pub fn supports_returning(&self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }

    /// Render the upsert clause appended to an INSERT.
    pub fn upsert_clause(&self, conflict_columns: &[String], assignments: &str) -> OrmResult<String> {
        match self {
            Dialect::MySql => Ok(format!("ON DUPLICATE KEY UPDATE {assignments}")),
            Dialect::Postgres | Dialect::Sqlite => {
                if conflict_columns.is_empty() {
                    return Err(OrmError::build(format!(
                        "{} upsert requires conflict columns (use on_conflict)",
                        self.name()
                    )));
                }
                Ok(format!(
                    "ON CONFLICT ({}) DO UPDATE SET {assignments}",
                    conflict_columns.join(", ")
                ))
            }
        }
    }
}
