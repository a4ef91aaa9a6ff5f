//! Per-type row metadata and its process-wide registry.

use super::fields::{Fields, HookFn, HookPoint, Hooks};
use crate::error::{OrmError, OrmResult};
use crate::graph::RelationGraph;
use indexmap::IndexMap;
use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A row type: a marker describing one table.
///
/// `setup` runs once per type, the first time the type is used.
///
/// ```ignore
/// struct User;
///
/// impl RowType for User {
///     fn setup(meta: &mut RowMeta) {
///         meta.table("user")
///             .primary_key(["id"])
///             .auto_increment("id")
///             .has_many::<Tag>("tags", tag_graph());
///     }
/// }
/// ```
pub trait RowType: Send + Sync + 'static {
    fn setup(meta: &mut RowMeta);
}

/// Whether a relation yields one row or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    One,
    Many,
}

/// A named relation declared on a row type.
#[derive(Debug, Clone)]
pub struct RelationDecl {
    pub graph: RelationGraph,
    pub multiplicity: Multiplicity,
    pub target: TypeId,
    pub target_name: &'static str,
    /// Column alias prefix used when selecting the target's columns.
    pub alias: Option<String>,
}

/// Metadata for one row type.
#[derive(Debug, Clone)]
pub struct RowMeta {
    type_name: &'static str,
    table: String,
    primary_key: Vec<String>,
    auto_increment: Option<String>,
    columns: Option<Vec<String>>,
    relations: IndexMap<String, RelationDecl>,
    hooks: Hooks,
    errors: Vec<String>,
}

impl RowMeta {
    /// Empty metadata for the type named `type_name`.
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            table: String::new(),
            primary_key: Vec::new(),
            auto_increment: None,
            columns: None,
            relations: IndexMap::new(),
            hooks: Hooks::default(),
            errors: Vec::new(),
        }
    }

    // ==================== setup ====================

    /// Table name.
    pub fn table(&mut self, table: &str) -> &mut Self {
        self.table = table.to_string();
        self
    }

    /// Primary key columns.
    pub fn primary_key<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Auto-increment column filled from the connection after INSERT.
    pub fn auto_increment(&mut self, column: &str) -> &mut Self {
        self.auto_increment = Some(column.to_string());
        self
    }

    /// Restrict fields to a known column list.
    pub fn columns<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Declare a single-valued relation to row type `U`.
    pub fn has_one<U: RowType>(&mut self, name: &str, graph: RelationGraph) -> &mut Self {
        self.relation::<U>(name, graph, Multiplicity::One)
    }

    /// Declare a multi-valued relation to row type `U`.
    pub fn has_many<U: RowType>(&mut self, name: &str, graph: RelationGraph) -> &mut Self {
        self.relation::<U>(name, graph, Multiplicity::Many)
    }

    fn relation<U: RowType>(
        &mut self,
        name: &str,
        graph: RelationGraph,
        multiplicity: Multiplicity,
    ) -> &mut Self {
        self.relations.insert(
            name.to_string(),
            RelationDecl {
                graph,
                multiplicity,
                target: TypeId::of::<U>(),
                target_name: type_name::<U>(),
                alias: None,
            },
        );
        self
    }

    /// Select a relation's columns as `alias_column`.
    pub fn alias(&mut self, relation: &str, alias: &str) -> &mut Self {
        match self.relations.get_mut(relation) {
            Some(decl) => decl.alias = Some(alias.to_string()),
            None => self
                .errors
                .push(format!("alias given for undeclared relation `{relation}`")),
        }
        self
    }

    /// Register a lifecycle hook.
    pub fn hook<F>(&mut self, point: HookPoint, hook: F) -> &mut Self
    where
        F: Fn(&mut dyn Fields) -> OrmResult<()> + Send + Sync + 'static,
    {
        let hook: HookFn = Arc::new(hook);
        self.hooks.add(point, hook);
        self
    }

    // ==================== accessors ====================

    /// Rust type name of the row type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Table name.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Primary key columns.
    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key
    }

    /// Auto-increment column, if any.
    pub fn auto_increment_column(&self) -> Option<&str> {
        self.auto_increment.as_deref()
    }

    /// Declared column list, if any.
    pub fn column_list(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Whether `name` is an allowed field.
    pub fn allows(&self, name: &str) -> bool {
        self.columns
            .as_ref()
            .is_none_or(|cols| cols.iter().any(|c| c == name))
    }

    /// Declared relation by name.
    pub fn relation_decl(&self, name: &str) -> Option<&RelationDecl> {
        self.relations.get(name)
    }

    /// Registered hooks.
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Fail on incomplete or inconsistent setup.
    pub fn check(&self) -> OrmResult<()> {
        if self.table.is_empty() {
            return Err(OrmError::config(format!(
                "row type {} declares no table",
                self.type_name
            )));
        }
        if let Some(message) = self.errors.first() {
            return Err(OrmError::config(format!("{}: {message}", self.type_name)));
        }
        Ok(())
    }
}

type Registry = RwLock<HashMap<TypeId, Arc<RowMeta>>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::default)
}

/// Metadata for row type `T`, running `T::setup` on first use.
pub fn meta<T: RowType>() -> Arc<RowMeta> {
    let id = TypeId::of::<T>();
    if let Some(meta) = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
    {
        return Arc::clone(meta);
    }

    // Setup runs outside the lock; it may look up other row types.
    let mut meta = RowMeta::new(type_name::<T>());
    T::setup(&mut meta);
    tracing::debug!(
        target: "tabula.row",
        row_type = meta.type_name,
        table = %meta.table,
        relations = meta.relations.len(),
        "row type registered"
    );

    let mut map = registry().write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(map.entry(id).or_insert_with(|| Arc::new(meta)))
}
