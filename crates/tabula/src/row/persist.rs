//! retrieve / save / remove.

use super::fields::HookPoint;
use super::meta::RowType;
use super::Row;
use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::expr::{Assignments, Criteria, Expression, Operand};
use crate::query;
use crate::value::{Params, Value};
use std::sync::Arc;

impl<T: RowType> Row<T> {
    fn run_hooks(&mut self, point: HookPoint) -> OrmResult<()> {
        let meta = Arc::clone(&self.meta);
        meta.hooks().run(point, self)
    }

    /// Load the matching row from the database.
    ///
    /// Matches on the primary key when `use_primary_key` is set, otherwise
    /// on the currently modified fields. Selects `fields` (all columns when
    /// `None`), limited to one row. Returns `false` when nothing matched.
    /// Never served from the query cache.
    pub async fn retrieve<C: Connection>(
        &mut self,
        conn: &C,
        fields: Option<&[&str]>,
        use_primary_key: bool,
    ) -> OrmResult<bool> {
        self.ensure_live()?;
        self.meta.check()?;

        let criteria = if use_primary_key {
            self.key_from_fields()?
        } else {
            let modified = self.modified_params();
            if modified.is_empty() {
                return Err(OrmError::build(format!(
                    "retrieve on {} needs modified fields or the primary key",
                    self.table_name()
                )));
            }
            modified
        };
        let columns = fields.map_or_else(|| "*".to_string(), |f| f.join(", "));

        let record = query::select(&columns, self.table_name())
            .where_clause(criteria)
            .limit(1)
            .no_cache()
            .fetch_opt(conn)
            .await?;

        let Some(record) = record else {
            tracing::debug!(target: "tabula.row", table = self.table_name(), "retrieve: no match");
            return Ok(false);
        };
        self.load(record);
        if self.primary_key_value.is_none() && !self.meta.primary_key_columns().is_empty() {
            return Err(OrmError::config(format!(
                "retrieved {} row has no primary key values",
                self.table_name()
            )));
        }
        self.run_hooks(HookPoint::AfterRetrieve)?;
        Ok(true)
    }

    /// Write pending changes.
    ///
    /// New rows are inserted (as an upsert when `on_duplicate_key_update`
    /// is set); persisted rows are updated by their stored primary key.
    /// Returns `false` without touching the database when nothing changed.
    pub async fn save<C: Connection>(
        &mut self,
        conn: &C,
        on_duplicate_key_update: bool,
    ) -> OrmResult<bool> {
        self.ensure_live()?;
        self.meta.check()?;
        if self.modified.is_empty() {
            return Ok(false);
        }

        self.run_hooks(HookPoint::BeforeSave)?;
        if self.retrieved {
            self.update(conn).await?;
        } else {
            self.insert(conn, on_duplicate_key_update).await?;
        }
        self.modified.clear();
        self.run_hooks(HookPoint::AfterSave)?;
        Ok(true)
    }

    async fn insert<C: Connection>(&mut self, conn: &C, upsert: bool) -> OrmResult<()> {
        self.run_hooks(HookPoint::BeforeInsert)?;

        let changes = self.modified_params();
        let mut qb = query::insert(self.table_name()).set(changes.clone());
        if upsert {
            qb = self.with_upsert(qb, conn, &changes)?;
        }

        // A supplied id is authoritative; only a missing one is generated.
        let generated = self
            .meta
            .auto_increment_column()
            .filter(|column| self.fields.get(*column).is_none_or(Value::is_null))
            .map(str::to_string);
        let returning = generated.is_some() && conn.dialect().supports_returning();
        if let (Some(column), true) = (&generated, returning) {
            qb = qb.returning(column);
        }
        let mut cursor = qb.execute(conn).await?;

        if let Some(column) = generated {
            let id = if returning {
                cursor.fetch().and_then(|row| row.get(&column).ok().cloned())
            } else {
                conn.last_insert_id().await?
            };
            match id {
                Some(id) if !id.is_null() && id != Value::Int(0) => {
                    self.fields.insert(column, id);
                }
                _ => {}
            }
        }

        self.retrieved = true;
        self.capture_primary_key();
        tracing::debug!(
            target: "tabula.row",
            table = self.table_name(),
            key = ?self.primary_key_value,
            "inserted"
        );
        self.run_hooks(HookPoint::AfterInsert)
    }

    fn with_upsert<C: Connection>(
        &self,
        qb: query::QueryBuilder,
        conn: &C,
        changes: &Params,
    ) -> OrmResult<query::QueryBuilder> {
        let key = self.meta.primary_key_columns();
        let auto_increment = self.meta.auto_increment_column();
        if auto_increment.is_some() && key.len() > 1 {
            return Err(OrmError::Unsupported(format!(
                "upsert on {} with a composite auto-increment key",
                self.table_name()
            )));
        }

        let dialect = conn.dialect();
        let mut assignments = Assignments::new();
        for (column, value) in changes {
            if Some(column.as_str()) == auto_increment || key.contains(column) {
                continue;
            }
            assignments.insert(column.clone(), Operand::Value(value.clone()));
        }
        if let Some(column) = auto_increment {
            if dialect.supports_last_insert_id_wrap() {
                assignments.insert(
                    column.to_string(),
                    Operand::Expr(Expression::last_insert_id(column)),
                );
            }
        }
        if assignments.is_empty() {
            let Some(first) = key.first() else {
                return Err(OrmError::config(format!(
                    "upsert on {} needs a primary key",
                    self.table_name()
                )));
            };
            let keep = match dialect {
                Dialect::MySql => first.clone(),
                Dialect::Postgres | Dialect::Sqlite => format!("EXCLUDED.{first}"),
            };
            assignments.insert(first.clone(), Operand::Expr(Expression::new(keep)));
        }

        let conflict: Vec<&str> = key.iter().map(String::as_str).collect();
        Ok(qb
            .with_dialect(dialect)
            .on_conflict(&conflict)
            .on_duplicate_key_update(assignments))
    }

    async fn update<C: Connection>(&mut self, conn: &C) -> OrmResult<()> {
        self.run_hooks(HookPoint::BeforeUpdate)?;

        let Some(key) = self.primary_key_value.clone() else {
            return Err(OrmError::config(format!(
                "cannot update {} row without a stored primary key",
                self.table_name()
            )));
        };
        let changes = self.modified_params();
        query::update(self.table_name())
            .set(changes)
            .where_clause(key)
            .execute(conn)
            .await?;

        // A changed key column moves the stored key.
        if self
            .meta
            .primary_key_columns()
            .iter()
            .any(|c| self.modified.contains(c))
        {
            self.capture_primary_key();
        }
        self.run_hooks(HookPoint::AfterUpdate)
    }

    /// Delete rows.
    ///
    /// Matches `criteria` when given, else the primary key (when
    /// `use_primary_key` is set or the row is persisted), else the
    /// modified fields. Deleting this row by key makes it removed; any
    /// later retrieve, save or remove fails.
    pub async fn remove<C: Connection>(
        &mut self,
        conn: &C,
        criteria: Option<Criteria>,
        use_primary_key: bool,
    ) -> OrmResult<u64> {
        self.ensure_live()?;
        self.meta.check()?;

        let (criteria, by_key) = match criteria {
            Some(criteria) if !criteria.is_empty() => (criteria, false),
            _ if use_primary_key || self.retrieved => (Criteria::from(self.key_criteria()?), true),
            _ => {
                let modified = self.modified_params();
                if modified.is_empty() {
                    return Err(OrmError::build(format!(
                        "remove on {} needs criteria, a primary key or modified fields",
                        self.table_name()
                    )));
                }
                (Criteria::from(modified), false)
            }
        };

        self.run_hooks(HookPoint::BeforeRemove)?;
        let affected = query::delete(self.table_name())
            .where_clause(criteria)
            .execute(conn)
            .await?
            .row_count();

        if by_key && affected > 0 {
            self.removed = true;
        }
        self.run_hooks(HookPoint::AfterRemove)?;
        Ok(affected)
    }
}
