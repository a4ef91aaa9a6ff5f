//! Error types for tabula

use thiserror::Error;

/// Result type alias for tabula operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Relation graph configuration errors.
///
/// These describe a defect in the declared associations, never a transient
/// failure, so they are `Clone` and memoized alongside a compiled graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The graph has no relations at all.
    #[error("relation graph is empty")]
    Empty,

    /// Every foreign table is also a local table (the graph is cyclic).
    #[error("relation graph has no root table (cyclic graph)")]
    NoRoot,

    /// More than one foreign table is never used as a local table.
    #[error("relation graph has {} root tables ({}), expected exactly one", .0.len(), .0.join(", "))]
    AmbiguousRoot(Vec<String>),

    /// Leveling did not converge.
    #[error("relation graph leveling exceeded {0} iterations (cycle)")]
    Cycle(usize),

    /// Some tables are not reachable from the root table.
    #[error("relation graph tables not reachable from the root: {}", .0.join(", "))]
    Disconnected(Vec<String>),
}

/// Error types for query building, relation setup and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// Structural query error (missing clause, clause used on the wrong statement kind, ...)
    #[error("Build error: {0}")]
    Build(String),

    /// Relation graph configuration error
    #[error("Relation graph error: {0}")]
    Graph(#[from] GraphError),

    /// Row type / relation configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query expected to return a row returned none
    #[error("Not found: {0}")]
    NotFound(String),

    /// A named field was read or written but never populated
    #[error("Field '{field}' is missing on '{table}'")]
    FieldMissing { table: String, field: String },

    /// Statement execution failed; `sql` is the fully rendered statement
    #[error("Execution error: {source} [SQL: {sql}]")]
    Execution {
        sql: String,
        #[source]
        source: Box<OrmError>,
    },

    /// Error reported by a `Connection` implementation
    #[error("Driver error: {0}")]
    Driver(String),

    /// Value decode/conversion error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A query hook aborted the statement
    #[error("Query aborted by hook: {0}")]
    Aborted(String),

    /// Operation on a row that has already been deleted
    #[error("Row was removed: {0}")]
    Removed(String),

    /// Unsupported configuration or dialect feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl OrmError {
    /// Create a structural build error
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn field_missing(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldMissing {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Wrap an execution failure with the SQL that caused it.
    ///
    /// Errors that are already wrapped, and hook aborts (the statement never
    /// ran), are returned unchanged.
    pub fn execution(sql: impl Into<String>, source: OrmError) -> Self {
        match source {
            unchanged @ (Self::Execution { .. } | Self::Aborted(_)) => unchanged,
            source => Self::Execution {
                sql: sql.into(),
                source: Box::new(source),
            },
        }
    }

    /// Check if this is a structural build error
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// Check if this is a configuration error (including graph errors)
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Graph(_))
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a missing field error
    pub fn is_field_missing(&self) -> bool {
        matches!(self, Self::FieldMissing { .. })
    }

    /// Check if this is a wrapped execution error
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// The SQL attached to an execution error.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Execution { sql, .. } => Some(sql),
            _ => None,
        }
    }
}
