//! Convenient imports for typical `tabula` usage.
//!
//! ```ignore
//! use tabula::prelude::*;
//! ```

pub use crate::query::{self, QueryBuilder};
pub use crate::{
    Connection, Criteria, Expression, FromRecord, FromValue, JoinType, OrmError, OrmResult,
    Params, Record, Relation, RelationGraph, Row, RowMeta, RowType, Value, params,
};

#[cfg(feature = "postgres")]
pub use crate::{PgConfig, PgConnection};
