//! Loading related rows through a relation graph.

use super::fields::Fields;
use super::meta::{Multiplicity, RowType, meta};
use super::Row;
use crate::connection::Connection;
use crate::error::{OrmError, OrmResult};
use crate::expr::Expression;
use crate::graph::Relation;
use crate::query::{self, QueryBuilder, sanitize_param_name};
use crate::record::FromRecord;
use crate::value::Params;
use indexmap::IndexMap;
use std::any::TypeId;
use std::fmt;

/// Rows loaded by [`Row::get_related`].
pub enum Related<U: RowType> {
    /// Single-valued relation.
    One(Option<Row<U>>),
    /// Multi-valued relation.
    Many(Vec<Row<U>>),
}

impl<U: RowType> fmt::Debug for Related<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Related::One(row) => f.debug_tuple("One").field(row).finish(),
            Related::Many(rows) => f.debug_tuple("Many").field(rows).finish(),
        }
    }
}

impl<U: RowType> Clone for Related<U> {
    fn clone(&self) -> Self {
        match self {
            Related::One(row) => Related::One(row.clone()),
            Related::Many(rows) => Related::Many(rows.clone()),
        }
    }
}

impl<U: RowType> Related<U> {
    /// The single row (the first row of a multi-valued relation).
    pub fn into_one(self) -> Option<Row<U>> {
        match self {
            Related::One(row) => row,
            Related::Many(rows) => rows.into_iter().next(),
        }
    }

    /// All rows.
    pub fn into_many(self) -> Vec<Row<U>> {
        match self {
            Related::One(row) => row.into_iter().collect(),
            Related::Many(rows) => rows,
        }
    }

    /// Number of rows loaded.
    pub fn len(&self) -> usize {
        match self {
            Related::One(row) => usize::from(row.is_some()),
            Related::Many(rows) => rows.len(),
        }
    }

    /// Whether nothing was loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tables whose rows are already in hand, keyed by table name.
type Supplied<'a> = IndexMap<&'a str, &'a (dyn Fields + Sync)>;

#[derive(Debug)]
pub(super) struct RelatedQuery {
    pub(super) query: QueryBuilder,
    pub(super) prefix: Option<String>,
    pub(super) multiplicity: Multiplicity,
}

/// `table.column`, or a bound parameter when the table is supplied.
fn side(
    supplied: &Supplied<'_>,
    params: &mut Params,
    table: &str,
    column: &str,
) -> OrmResult<String> {
    match supplied.get(table) {
        Some(row) => {
            let name = sanitize_param_name(&format!("rel_{table}_{column}"));
            params.insert(name.clone(), row.get(column)?.clone());
            Ok(format!(":{name}"))
        }
        None => Ok(format!("{table}.{column}")),
    }
}

fn condition(supplied: &Supplied<'_>, relation: &Relation) -> OrmResult<Expression> {
    let mut params = Params::new();
    let mut parts = Vec::with_capacity(relation.key_map.len());
    for (local, foreign) in &relation.key_map {
        let left = side(supplied, &mut params, &relation.local_table, local)?;
        let right = side(supplied, &mut params, &relation.foreign_table, foreign)?;
        parts.push(format!("{left} = {right}"));
    }
    Ok(Expression::with_params(parts.join(" AND "), params))
}

impl<T: RowType> Row<T> {
    /// Load rows of type `U` through the relation declared as `name`.
    ///
    /// Selects from the relation graph's root table and joins each level
    /// in order. Tables supplied by this row or by `inputs` are not
    /// joined; their key values are bound as constraints instead.
    /// `fields` limits the selected root columns.
    pub async fn get_related<U: RowType, C: Connection>(
        &self,
        conn: &C,
        name: &str,
        fields: Option<&[&str]>,
        inputs: &[&(dyn Fields + Sync)],
    ) -> OrmResult<Related<U>> {
        self.ensure_live()?;
        let plan = self.related_query::<U>(name, fields, inputs)?;

        let records = plan.query.fetch_all(conn).await?;
        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            let row = match &plan.prefix {
                Some(prefix) => Row::<U>::from_record_prefixed(record, prefix)?,
                None => Row::<U>::from_record(record)?,
            };
            rows.push(row);
        }

        Ok(match plan.multiplicity {
            Multiplicity::One => Related::One(rows.into_iter().next()),
            Multiplicity::Many => Related::Many(rows),
        })
    }

    /// Build the SELECT behind [`Row::get_related`].
    pub(super) fn related_query<U: RowType>(
        &self,
        name: &str,
        fields: Option<&[&str]>,
        inputs: &[&(dyn Fields + Sync)],
    ) -> OrmResult<RelatedQuery> {
        self.meta.check()?;
        let decl = self.meta.relation_decl(name).ok_or_else(|| {
            OrmError::config(format!(
                "{} declares no relation named `{name}`",
                self.meta.type_name()
            ))
        })?;
        if decl.target != TypeId::of::<U>() {
            return Err(OrmError::config(format!(
                "relation `{name}` targets {}, not {}",
                decl.target_name,
                std::any::type_name::<U>()
            )));
        }
        let target = meta::<U>();
        target.check()?;

        let compiled = decl.graph.compile()?;
        let root = compiled.root();
        if target.table_name() != root {
            return Err(OrmError::config(format!(
                "relation `{name}` resolves to table {root}, but {} uses {}",
                target.type_name(),
                target.table_name()
            )));
        }

        let mut supplied: Supplied<'_> = IndexMap::new();
        supplied.insert(self.table_name(), self);
        for input in inputs {
            supplied.insert(input.table_name(), *input);
        }

        let columns: Option<Vec<String>> = fields
            .map(|f| f.iter().map(|c| c.to_string()).collect())
            .or_else(|| {
                decl.alias
                    .as_ref()
                    .and(target.column_list().map(<[String]>::to_vec))
            });
        let (select_list, prefix) = match (columns, &decl.alias) {
            (Some(cols), Some(alias)) => (
                cols.iter()
                    .map(|c| format!("{root}.{c} AS {alias}_{c}"))
                    .collect::<Vec<_>>()
                    .join(", "),
                Some(alias.clone()),
            ),
            (Some(cols), None) => (
                cols.iter()
                    .map(|c| format!("{root}.{c}"))
                    .collect::<Vec<_>>()
                    .join(", "),
                None,
            ),
            (None, _) => (format!("{root}.*"), None),
        };

        let mut qb = query::select(&select_list, root);
        let mut constraints = Vec::new();
        for relation in compiled.join_order() {
            let on = condition(&supplied, relation)?;
            if supplied.contains_key(relation.local_table.as_str()) {
                constraints.push(on);
            } else {
                qb = qb.join(&relation.local_table, on, relation.join_type);
            }
        }
        for relation in compiled.residual() {
            constraints.push(condition(&supplied, relation)?);
        }
        for constraint in constraints {
            qb = qb.where_clause(constraint);
        }
        if decl.multiplicity == Multiplicity::One {
            qb = qb.limit(1);
        }

        tracing::debug!(
            target: "tabula.row",
            table = self.table_name(),
            relation = name,
            root,
            levels = compiled.levels().len(),
            "get_related"
        );

        Ok(RelatedQuery {
            query: qb,
            prefix,
            multiplicity: decl.multiplicity,
        })
    }
}
