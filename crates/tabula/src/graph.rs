//! Relation graphs: declared table links compiled into join order.
//!
//! A graph is a set of [`Relation`]s, each saying that `local_table` joins
//! `foreign_table` on some key columns. Compiling finds the single root
//! table (a foreign table that is never local) and groups relations into
//! levels by breadth-first distance from it. Relations whose local table
//! was already placed through another path are kept as residual join
//! conditions.

use crate::error::{GraphError, OrmError, OrmResult};
use crate::query::JoinType;
use indexmap::{IndexMap, IndexSet};
use std::sync::OnceLock;

/// One declared link between two tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Table being joined in.
    pub local_table: String,
    /// `local column -> foreign column`
    pub key_map: IndexMap<String, String>,
    /// Table already present in the join.
    pub foreign_table: String,
    pub join_type: JoinType,
}

impl Relation {
    /// Declare that `local_table` joins `foreign_table` on `keys`.
    pub fn new<K, V, I>(local_table: &str, keys: I, foreign_table: &str, join_type: JoinType) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            local_table: local_table.to_string(),
            key_map: keys.into_iter().map(|(l, f)| (l.into(), f.into())).collect(),
            foreign_table: foreign_table.to_string(),
            join_type,
        }
    }

    /// `local.a = foreign.b AND ...`
    pub fn condition(&self) -> String {
        self.key_map
            .iter()
            .map(|(local, foreign)| {
                format!(
                    "{}.{} = {}.{}",
                    self.local_table, local, self.foreign_table, foreign
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Compiled join order of a [`RelationGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGraph {
    root: String,
    levels: Vec<Vec<Relation>>,
    residual: Vec<Relation>,
}

impl CompiledGraph {
    /// The table every other table is joined onto.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Relation levels; `levels()[0]` joins directly onto the root.
    pub fn levels(&self) -> &[Vec<Relation>] {
        &self.levels
    }

    /// Relations at 1-based join depth `depth`.
    pub fn level(&self, depth: usize) -> Option<&[Relation]> {
        depth
            .checked_sub(1)
            .and_then(|i| self.levels.get(i))
            .map(Vec::as_slice)
    }

    /// Relations between already placed tables, applied as extra conditions.
    pub fn residual(&self) -> &[Relation] {
        &self.residual
    }

    /// Relations in join order.
    pub fn join_order(&self) -> impl Iterator<Item = &Relation> {
        self.levels.iter().flatten()
    }

    /// Root first, then each joined table in join order.
    pub fn tables(&self) -> Vec<&str> {
        std::iter::once(self.root.as_str())
            .chain(self.join_order().map(|r| r.local_table.as_str()))
            .collect()
    }
}

/// A set of relations compiled lazily, once.
#[derive(Debug, Default)]
pub struct RelationGraph {
    relations: Vec<Relation>,
    compiled: OnceLock<Result<CompiledGraph, GraphError>>,
}

impl Clone for RelationGraph {
    fn clone(&self) -> Self {
        let compiled = OnceLock::new();
        if let Some(result) = self.compiled.get() {
            let _ = compiled.set(result.clone());
        }
        Self {
            relations: self.relations.clone(),
            compiled,
        }
    }
}

impl RelationGraph {
    /// Graph with a single relation.
    pub fn new<K, V, I>(local_table: &str, keys: I, foreign_table: &str, join_type: JoinType) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::from_relations(vec![Relation::new(local_table, keys, foreign_table, join_type)])
    }

    /// Graph from explicit relations; duplicates are dropped.
    pub fn from_relations(relations: Vec<Relation>) -> Self {
        let mut unique: Vec<Relation> = Vec::with_capacity(relations.len());
        for relation in relations {
            if !unique.contains(&relation) {
                unique.push(relation);
            }
        }
        Self {
            relations: unique,
            compiled: OnceLock::new(),
        }
    }

    /// Union of several graphs.
    pub fn merge<'a>(graphs: impl IntoIterator<Item = &'a RelationGraph>) -> Self {
        Self::from_relations(
            graphs
                .into_iter()
                .flat_map(|g| g.relations.iter().cloned())
                .collect(),
        )
    }

    /// Declared relations.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Whether compilation already ran.
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Compile the graph. The result, success or failure, is memoized.
    pub fn compile(&self) -> OrmResult<&CompiledGraph> {
        self.compiled
            .get_or_init(|| compile(&self.relations))
            .as_ref()
            .map_err(|e| OrmError::Graph(e.clone()))
    }

    /// The root table.
    pub fn root_table(&self) -> OrmResult<&str> {
        Ok(self.compile()?.root())
    }

    /// Relations at 1-based join depth `depth`.
    pub fn level(&self, depth: usize) -> OrmResult<Option<&[Relation]>> {
        Ok(self.compile()?.level(depth))
    }

    /// All relation levels.
    pub fn levels(&self) -> OrmResult<&[Vec<Relation>]> {
        Ok(self.compile()?.levels())
    }

    /// Residual relations.
    pub fn residual(&self) -> OrmResult<&[Relation]> {
        Ok(self.compile()?.residual())
    }
}

fn compile(relations: &[Relation]) -> Result<CompiledGraph, GraphError> {
    if relations.is_empty() {
        return Err(GraphError::Empty);
    }

    let local: IndexSet<&str> = relations.iter().map(|r| r.local_table.as_str()).collect();
    let foreign: IndexSet<&str> = relations.iter().map(|r| r.foreign_table.as_str()).collect();
    let roots: Vec<&str> = foreign.iter().copied().filter(|t| !local.contains(t)).collect();
    let root = match roots.as_slice() {
        [] => return Err(GraphError::NoRoot),
        [root] => *root,
        many => {
            let mut names: Vec<String> = many.iter().map(|t| t.to_string()).collect();
            names.sort();
            return Err(GraphError::AmbiguousRoot(names));
        }
    };

    let mut by_foreign: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (i, relation) in relations.iter().enumerate() {
        by_foreign
            .entry(relation.foreign_table.as_str())
            .or_default()
            .push(i);
    }

    let cap = relations.len() + 1;
    let mut placed: IndexSet<&str> = IndexSet::from([root]);
    let mut used = vec![false; relations.len()];
    let mut frontier: Vec<&str> = vec![root];
    let mut levels: Vec<Vec<Relation>> = Vec::new();
    let mut iterations = 0;

    loop {
        iterations += 1;
        if iterations > cap {
            return Err(GraphError::Cycle(cap));
        }

        let mut level = Vec::new();
        let mut next: IndexSet<&str> = IndexSet::new();
        for table in &frontier {
            let Some(indices) = by_foreign.get(table) else {
                continue;
            };
            for &i in indices {
                let relation = &relations[i];
                let target = relation.local_table.as_str();
                if used[i] || placed.contains(target) || next.contains(target) {
                    continue;
                }
                used[i] = true;
                next.insert(target);
                level.push(relation.clone());
            }
        }

        if level.is_empty() {
            break;
        }
        levels.push(level);
        placed.extend(next.iter().copied());
        frontier = next.into_iter().collect();
    }

    let unreachable: IndexSet<&str> = local
        .iter()
        .chain(foreign.iter())
        .copied()
        .filter(|t| !placed.contains(t))
        .collect();
    if !unreachable.is_empty() {
        return Err(GraphError::Disconnected(
            unreachable.into_iter().map(str::to_string).collect(),
        ));
    }

    let residual = relations
        .iter()
        .zip(&used)
        .filter(|(_, used)| !**used)
        .map(|(r, _)| r.clone())
        .collect();

    tracing::trace!(target: "tabula.graph", root, levels = levels.len(), "relation graph compiled");

    Ok(CompiledGraph {
        root: root.to_string(),
        levels,
        residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rel(local: &str, foreign: &str) -> Relation {
        Relation::new(local, [("id", "id")], foreign, JoinType::Inner)
    }

    #[test]
    fn chain_levels_from_root() {
        let graph = RelationGraph::from_relations(vec![rel("a", "b"), rel("b", "c")]);
        assert_eq!(graph.root_table().unwrap(), "c");
        assert_eq!(graph.level(1).unwrap().unwrap()[0].local_table, "b");
        assert_eq!(graph.level(2).unwrap().unwrap()[0].local_table, "a");
        assert!(graph.level(3).unwrap().is_none());
        assert_eq!(graph.compile().unwrap().tables(), vec!["c", "b", "a"]);
    }

    #[test]
    fn compile_is_idempotent() {
        let graph = RelationGraph::from_relations(vec![rel("a", "b"), rel("b", "c"), rel("d", "b")]);
        let first = graph.compile().unwrap();
        let second = graph.compile().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.levels(), second.levels());

        // recompiling from scratch levels the same way
        assert_eq!(&compile(graph.relations()).unwrap(), first);
        let fresh = RelationGraph::from_relations(graph.relations().to_vec());
        assert_eq!(fresh.compile().unwrap(), first);
        assert_eq!(fresh.level(2).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn cycle_has_no_root() {
        let graph = RelationGraph::from_relations(vec![rel("a", "b"), rel("b", "a")]);
        let err = graph.compile().unwrap_err();
        assert!(matches!(err, OrmError::Graph(GraphError::NoRoot)));
        // memoized
        assert!(graph.is_compiled());
        assert!(graph.root_table().unwrap_err().is_config());
    }

    #[test]
    fn two_roots_are_ambiguous() {
        let graph = RelationGraph::from_relations(vec![rel("link", "user"), rel("link", "item")]);
        match graph.compile().unwrap_err() {
            OrmError::Graph(GraphError::AmbiguousRoot(roots)) => {
                assert_eq!(roots, vec!["item".to_string(), "user".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_graph_is_an_error() {
        let graph = RelationGraph::default();
        assert!(matches!(
            graph.compile().unwrap_err(),
            OrmError::Graph(GraphError::Empty)
        ));
    }

    #[test]
    fn already_placed_tables_become_residual() {
        // c is root; b and a join on c; a also links to b.
        let graph = RelationGraph::from_relations(vec![rel("b", "c"), rel("a", "c"), rel("a", "b")]);
        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.levels().len(), 1);
        assert_eq!(compiled.residual(), &[rel("a", "b")]);
    }

    #[test]
    fn unreachable_cycle_is_disconnected() {
        let graph = RelationGraph::from_relations(vec![rel("a", "root"), rel("x", "y"), rel("y", "x")]);
        assert!(matches!(
            graph.compile().unwrap_err(),
            OrmError::Graph(GraphError::Disconnected(_))
        ));
    }

    #[test]
    fn merge_deduplicates() {
        let g1 = RelationGraph::new("a", [("b_id", "id")], "b", JoinType::Inner);
        let g2 = RelationGraph::new("a", [("b_id", "id")], "b", JoinType::Inner);
        let g3 = RelationGraph::new("b", [("c_id", "id")], "c", JoinType::Left);
        let merged = RelationGraph::merge([&g1, &g2, &g3]);
        assert_eq!(merged.relations().len(), 2);
        assert_eq!(merged.root_table().unwrap(), "c");
    }

    #[test]
    fn condition_lists_every_key() {
        let r = Relation::new("t", [("a", "x"), ("b", "y")], "u", JoinType::Inner);
        assert_eq!(r.condition(), "t.a = u.x AND t.b = u.y");
    }
}
