//! Immutable SQL query builder.
//!
//! ```ignore
//! use tabula::query;
//!
//! let users = query::select("id, name", "users")
//!     .where_clause([("status", "active")])
//!     .order_by("name")
//!     .limit(10)
//!     .fetch_all(&conn)
//!     .await?;
//!
//! query::update("users")
//!     .set([("status", "inactive")])
//!     .where_clause([("id", 5)])
//!     .execute(&conn)
//!     .await?;
//! ```

mod builder;
mod execute;
mod kind;
mod prepared;
mod render;

#[cfg(test)]
mod tests;

pub use builder::{Clause, JoinType, PREFIX_TOKEN, QueryBuilder};
pub use execute::insert_many_and_execute;
pub use kind::{QueryKind, QueryType};
pub use prepared::PreparedQuery;
pub use render::to_positional;

pub(crate) use render::sanitize_param_name;

use crate::value::Params;

/// `SELECT columns FROM tables`
pub fn select(columns: &str, tables: &str) -> QueryBuilder {
    QueryBuilder::select(columns, tables)
}

/// `INSERT INTO table`
pub fn insert(table: &str) -> QueryBuilder {
    QueryBuilder::insert(table)
}

/// `UPDATE table`
pub fn update(table: &str) -> QueryBuilder {
    QueryBuilder::update(table)
}

/// `DELETE FROM table`
pub fn delete(table: &str) -> QueryBuilder {
    QueryBuilder::delete(table)
}

/// Caller-supplied SQL with `:name` placeholders.
pub fn raw(sql: impl Into<String>, params: Params) -> QueryBuilder {
    QueryBuilder::raw(sql, params)
}
