//! Named field access and lifecycle hooks.

use crate::error::OrmResult;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Named access to a row's fields.
///
/// Hooks receive rows through this trait, and `get_related` accepts it for
/// rows of other types that supply join keys.
pub trait Fields {
    /// Table the fields belong to.
    fn table_name(&self) -> &str;

    /// Borrow a field value; `FieldMissing` when never populated.
    fn get(&self, name: &str) -> OrmResult<&Value>;

    /// Assign a field, marking it modified when new or changed.
    fn set(&mut self, name: &str, value: Value) -> OrmResult<()>;

    /// Whether the field is populated.
    fn has(&self, name: &str) -> bool;

    /// Drop a field.
    fn unset(&mut self, name: &str);

    /// Populated field names, in insertion order.
    fn field_names(&self) -> Vec<&str>;
}

/// Points in a row's lifecycle where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeSave,
    AfterSave,
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    AfterRetrieve,
    BeforeRemove,
    AfterRemove,
}

/// A lifecycle hook. Returning an error from a `Before*` hook aborts the
/// operation before any SQL runs.
pub type HookFn = Arc<dyn Fn(&mut dyn Fields) -> OrmResult<()> + Send + Sync>;

/// Hooks registered for one row type.
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: HashMap<HookPoint, Vec<HookFn>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(HookPoint, usize)> =
            self.hooks.iter().map(|(p, v)| (*p, v.len())).collect();
        counts.sort_by_key(|(p, _)| format!("{p:?}"));
        f.debug_struct("Hooks").field("registered", &counts).finish()
    }
}

impl Hooks {
    /// Register a hook; hooks at the same point run in registration order.
    pub fn add(&mut self, point: HookPoint, hook: HookFn) {
        self.hooks.entry(point).or_default().push(hook);
    }

    /// Number of hooks at `point`.
    pub fn count(&self, point: HookPoint) -> usize {
        self.hooks.get(&point).map_or(0, Vec::len)
    }

    /// Run every hook at `point`, stopping at the first error.
    pub fn run(&self, point: HookPoint, fields: &mut dyn Fields) -> OrmResult<()> {
        let Some(hooks) = self.hooks.get(&point) else {
            return Ok(());
        };
        for hook in hooks {
            if let Err(e) = hook(fields) {
                tracing::debug!(
                    target: "tabula.row",
                    table = fields.table_name(),
                    ?point,
                    error = %e,
                    "hook failed"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}
