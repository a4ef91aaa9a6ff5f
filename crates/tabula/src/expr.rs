//! Raw SQL expressions, operands and criteria arguments.

use crate::value::{Params, Value};
use indexmap::IndexMap;

/// A raw SQL fragment with its own bound parameters.
///
/// Expressions bypass parameter substitution: their text is emitted verbatim
/// (e.g. `CURRENT_TIMESTAMP`, `LAST_INSERT_ID(id)`), and their parameters are
/// merged into the enclosing builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    params: Params,
}

impl Expression {
    /// Create an expression without parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Params::new(),
        }
    }

    /// Create an expression whose text references the given named parameters.
    pub fn with_params(text: impl Into<String>, params: Params) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// `CURRENT_TIMESTAMP`
    pub fn current_timestamp() -> Self {
        Self::new("CURRENT_TIMESTAMP")
    }

    /// `LAST_INSERT_ID(column)`
    pub fn last_insert_id(column: &str) -> Self {
        Self::new(format!("LAST_INSERT_ID({column})"))
    }

    /// The raw SQL text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bound parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Right-hand side of a criteria or assignment entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A value bound through a generated parameter.
    Value(Value),
    /// A raw expression emitted verbatim.
    Expr(Expression),
}

macro_rules! impl_operand_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

impl_operand_from!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    bool,
    f32,
    f64,
    String,
    &str,
    &String,
    Vec<u8>,
    serde_json::Value,
    chrono::NaiveDateTime,
    uuid::Uuid
);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<&Value> for Operand {
    fn from(v: &Value) -> Self {
        Operand::Value(v.clone())
    }
}

impl From<Expression> for Operand {
    fn from(e: Expression) -> Self {
        Operand::Expr(e)
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(Value::from(v))
    }
}

/// Ordered `column -> operand` mapping.
pub type Assignments = IndexMap<String, Operand>;

/// Argument accepted by `where_clause`, `having`, `set` and friends.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// Flat mapping; each value becomes a parameter placeholder.
    Map(Assignments),
    /// Raw expression with its own parameters.
    Expr(Expression),
    /// Literal SQL used verbatim; the caller binds matching parameters.
    Raw(String),
}

impl Criteria {
    /// Whether the criteria would render to nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Criteria::Map(m) => m.is_empty(),
            Criteria::Expr(e) => e.text().trim().is_empty(),
            Criteria::Raw(s) => s.trim().is_empty(),
        }
    }
}

impl From<Expression> for Criteria {
    fn from(e: Expression) -> Self {
        Criteria::Expr(e)
    }
}

impl From<&str> for Criteria {
    fn from(s: &str) -> Self {
        Criteria::Raw(s.to_string())
    }
}

impl From<String> for Criteria {
    fn from(s: String) -> Self {
        Criteria::Raw(s)
    }
}

impl From<Assignments> for Criteria {
    fn from(m: Assignments) -> Self {
        Criteria::Map(m)
    }
}

impl From<Params> for Criteria {
    fn from(p: Params) -> Self {
        Criteria::Map(p.into_iter().map(|(k, v)| (k, Operand::Value(v))).collect())
    }
}

impl<K: Into<String>, V: Into<Operand>, const N: usize> From<[(K, V); N]> for Criteria {
    fn from(pairs: [(K, V); N]) -> Self {
        Criteria::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Operand>> From<Vec<(K, V)>> for Criteria {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Criteria::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
