//! # tabula
//!
//! A data-access layer for relational databases.
//!
//! ## Features
//!
//! - **Immutable query builder**: every builder method returns a new builder;
//!   values are bound as `:name` parameters, never spliced into SQL
//! - **Relation graphs**: declared foreign-key associations compile into
//!   ordered joins from a single root table
//! - **Active-record rows**: dirty tracking, primary-key bookkeeping and
//!   lifecycle hooks around retrieve / save / remove
//! - **Result cache**: fetched result sets are cached per connection and
//!   invalidated by writes
//! - **Interceptors**: hooks and monitors around every statement
//!
//! ## Query Builder
//!
//! ```ignore
//! use tabula::query;
//!
//! // SELECT
//! let users = query::select("id, name", "users")
//!     .where_clause([("status", "active")])
//!     .order_by("created_at DESC")
//!     .limit(10)
//!     .fetch_all(&conn)
//!     .await?;
//!
//! // INSERT
//! query::insert("users")
//!     .set([("username", "alice"), ("email", "alice@example.com")])
//!     .execute(&conn)
//!     .await?;
//!
//! // UPDATE
//! query::update("users")
//!     .set([("status", "inactive")])
//!     .where_clause([("id", user_id)])
//!     .execute(&conn)
//!     .await?;
//!
//! // DELETE
//! query::delete("users")
//!     .where_clause([("id", user_id)])
//!     .execute(&conn)
//!     .await?;
//! ```
//!
//! ## Rows
//!
//! ```ignore
//! struct User;
//!
//! impl RowType for User {
//!     fn setup(meta: &mut RowMeta) {
//!         meta.table("users").primary_key(["id"]).auto_increment("id");
//!     }
//! }
//!
//! let mut user = Row::<User>::from_fields([("name", "Ann")])?;
//! user.save(&conn, false).await?;
//! ```

pub mod cache;
pub mod connection;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod graph;
pub mod monitor;
pub mod prelude;
pub mod query;
pub mod record;
pub mod row;
pub mod value;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use cache::{CacheConfig, Operation, QueryCache};
pub use connection::Connection;
pub use cursor::ResultCursor;
pub use dialect::Dialect;
pub use error::{GraphError, OrmError, OrmResult};
pub use expr::{Assignments, Criteria, Expression, Operand};
pub use graph::{CompiledGraph, Relation, RelationGraph};
pub use monitor::{
    CompositeHook, CompositeMonitor, HookAction, InstrumentedConnection, LoggingMonitor,
    MonitorConfig, NoopMonitor, QueryContext, QueryHook, QueryMonitor, QueryResult, QueryStats,
    StatsMonitor, TracingSqlHook,
};
pub use query::{
    JoinType, PreparedQuery, QueryBuilder, QueryKind, QueryType, insert_many_and_execute,
};
pub use record::{FromRecord, Record};
pub use row::{Fields, HookPoint, Multiplicity, Related, Row, RowMeta, RowType};
pub use value::{FromValue, Params, Value, params};

#[cfg(feature = "postgres")]
pub use postgres::{PgConfig, PgConnection};

// Re-exported so downstream crates can name driver types without a direct dependency.
#[cfg(feature = "postgres")]
pub use tokio_postgres;
