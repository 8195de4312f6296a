//! Abstract ground graphs.
//!
//! An abstract ground graph (AGG) unrolls a set of relational dependencies into
//! a directed graph over the relational variables reachable from one
//! perspective item within a hop threshold. Variables that can reach the same
//! attribute along different routes additionally get an intersection node,
//! which inherits the edges of both of its sources.
//!
//! Edge weights are the ids of the dependencies that justify the edge. An edge
//! exists exactly while its tag set is non-empty.

use crate::error::DSeparationError;
use crate::table::{DepId, DependencyTable};
use itertools::Itertools;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{Dfs, EdgeRef, Reversed};
use rcd_core::space::relational_variables;
use rcd_core::validity::is_valid_relational_path;
use rcd_core::{Model, RelationalDependency, RelationalVariable, RelationalVariableIntersection, Schema};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Set of dependencies justifying one AGG edge.
pub type DependencyTags = BTreeSet<DepId>;

/// A node of an abstract ground graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AggNode {
    Variable(RelationalVariable),
    Intersection(RelationalVariableIntersection),
}

impl AggNode {
    pub fn as_variable(&self) -> Option<&RelationalVariable> {
        match self {
            AggNode::Variable(v) => Some(v),
            AggNode::Intersection(_) => None,
        }
    }

    pub fn as_intersection(&self) -> Option<&RelationalVariableIntersection> {
        match self {
            AggNode::Variable(_) => None,
            AggNode::Intersection(i) => Some(i),
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, AggNode::Variable(_))
    }
}

impl fmt::Display for AggNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggNode::Variable(v) => v.fmt(f),
            AggNode::Intersection(i) => i.fmt(f),
        }
    }
}

impl From<RelationalVariable> for AggNode {
    fn from(v: RelationalVariable) -> Self {
        AggNode::Variable(v)
    }
}

impl From<RelationalVariableIntersection> for AggNode {
    fn from(i: RelationalVariableIntersection) -> Self {
        AggNode::Intersection(i)
    }
}

pub struct AbstractGroundGraph {
    perspective: String,
    hop_threshold: usize,
    graph: StableDiGraph<AggNode, DependencyTags>,
    node_index: HashMap<AggNode, NodeIndex>,
    /// Variable node -> itself plus the intersections built from it.
    subsumed: HashMap<NodeIndex, BTreeSet<NodeIndex>>,
    ancestors_cache: HashMap<NodeIndex, HashSet<NodeIndex>>,
    /// Dependency -> edges currently tagged with it.
    dep_edges: HashMap<DepId, HashSet<EdgeIndex>>,
}

impl AbstractGroundGraph {
    /// Build the AGG of `dependencies` from `perspective`, covering variables
    /// whose paths have at most `hop_threshold + 1` items.
    ///
    /// Dependencies are interned into `table`; graphs that must stay consistent
    /// with each other have to share it.
    pub fn build(
        schema: &Schema,
        dependencies: &[RelationalDependency],
        perspective: &str,
        hop_threshold: usize,
        table: &mut DependencyTable,
    ) -> Result<Self, DSeparationError> {
        if !schema.has_schema_item(perspective) {
            return Err(DSeparationError::UnknownPerspective(perspective.to_string()));
        }
        let mut agg = Self {
            perspective: perspective.to_string(),
            hop_threshold,
            graph: StableDiGraph::new(),
            node_index: HashMap::new(),
            subsumed: HashMap::new(),
            ancestors_cache: HashMap::new(),
            dep_edges: HashMap::new(),
        };

        let mut var_nodes: Vec<(NodeIndex, RelationalVariable)> = Vec::new();
        for var in relational_variables(schema, hop_threshold, false) {
            if var.base_item() != perspective {
                continue;
            }
            let node = AggNode::Variable(var.clone());
            if agg.node_index.contains_key(&node) {
                continue;
            }
            let idx = agg.graph.add_node(node.clone());
            agg.node_index.insert(node, idx);
            agg.subsumed.insert(idx, BTreeSet::from([idx]));
            var_nodes.push((idx, var));
        }

        let mut by_effect: HashMap<&RelationalVariable, Vec<DepId>> = HashMap::new();
        for dep in dependencies {
            by_effect.entry(&dep.effect).or_default().push(table.intern(dep));
        }

        for (effect_idx, var) in &var_nodes {
            let Some(dep_ids) = by_effect.get(&var.canonical()) else {
                continue;
            };
            for &id in dep_ids {
                let Some(cause) = table.resolve(id).map(|dep| &dep.cause) else {
                    continue;
                };
                for path in extend_path(schema, var.path(), cause.path()) {
                    let cause_node = AggNode::Variable(RelationalVariable::new(path, cause.attr_name()));
                    if let Some(&cause_idx) = agg.node_index.get(&cause_node) {
                        agg.add_tag(cause_idx, *effect_idx, id);
                    }
                }
            }
        }

        let mut intersections: Vec<(NodeIndex, [NodeIndex; 2])> = Vec::new();
        for ((a_idx, a), (b_idx, b)) in var_nodes.iter().tuple_combinations() {
            if !a.intersects(b) {
                continue;
            }
            let node = AggNode::Intersection(RelationalVariableIntersection::new(a.clone(), b.clone()));
            if agg.node_index.contains_key(&node) {
                continue;
            }
            let idx = agg.graph.add_node(node.clone());
            agg.node_index.insert(node, idx);
            for source in [*a_idx, *b_idx] {
                agg.subsumed.entry(source).or_default().insert(idx);
            }
            intersections.push((idx, [*a_idx, *b_idx]));
        }

        // Intersections inherit the edges of both sources, pooling tags per endpoint pair.
        let mut inherited: BTreeMap<(NodeIndex, NodeIndex), DependencyTags> = BTreeMap::new();
        for (idx, sources) in &intersections {
            for &source in sources {
                for edge in agg.graph.edges_directed(source, Direction::Incoming) {
                    inherited
                        .entry((edge.source(), *idx))
                        .or_default()
                        .extend(edge.weight().iter().copied());
                }
                for edge in agg.graph.edges_directed(source, Direction::Outgoing) {
                    inherited
                        .entry((*idx, edge.target()))
                        .or_default()
                        .extend(edge.weight().iter().copied());
                }
            }
        }
        for ((from, to), tags) in inherited {
            for id in tags {
                agg.add_tag(from, to, id);
            }
        }

        debug!(
            perspective,
            hop_threshold,
            nodes = agg.node_count(),
            intersections = intersections.len(),
            edges = agg.edge_count(),
            "built abstract ground graph"
        );
        Ok(agg)
    }

    /// Build from a model's dependencies with a private dependency table.
    pub fn from_model(model: &Model, perspective: &str, hop_threshold: usize) -> Result<Self, DSeparationError> {
        let mut table = DependencyTable::new();
        Self::build(
            model.schema(),
            model.dependencies(),
            perspective,
            hop_threshold,
            &mut table,
        )
    }

    fn add_tag(&mut self, from: NodeIndex, to: NodeIndex, id: DepId) {
        let edge = match self.graph.find_edge(from, to) {
            Some(edge) => edge,
            None => self.graph.add_edge(from, to, DependencyTags::new()),
        };
        if let Some(tags) = self.graph.edge_weight_mut(edge) {
            tags.insert(id);
        }
        self.dep_edges.entry(id).or_default().insert(edge);
    }

    pub fn perspective(&self) -> &str {
        &self.perspective
    }

    pub fn hop_threshold(&self) -> usize {
        self.hop_threshold
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The node at `idx`. Indices come from this graph, whose nodes are never removed.
    pub fn node(&self, idx: NodeIndex) -> &AggNode {
        &self.graph[idx]
    }

    pub fn index_of(&self, node: &AggNode) -> Option<NodeIndex> {
        self.node_index.get(node).copied()
    }

    pub fn variable_index(&self, var: &RelationalVariable) -> Option<NodeIndex> {
        self.index_of(&AggNode::Variable(var.clone()))
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn variable_nodes(&self) -> impl Iterator<Item = (NodeIndex, &RelationalVariable)> + '_ {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph[idx].as_variable().map(|v| (idx, v)))
    }

    pub fn intersection_nodes(&self) -> impl Iterator<Item = (NodeIndex, &RelationalVariableIntersection)> + '_ {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph[idx].as_intersection().map(|i| (idx, i)))
    }

    pub fn has_edge(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.graph.find_edge(from, to).is_some()
    }

    pub fn predecessors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Incoming)
    }

    pub fn successors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Outgoing)
    }

    /// Nodes joined to `idx` by an edge in either direction.
    pub fn adjacent(&self, idx: NodeIndex) -> BTreeSet<NodeIndex> {
        self.predecessors(idx).chain(self.successors(idx)).collect()
    }

    pub fn underlying_dependencies(&self, from: NodeIndex, to: NodeIndex) -> Option<&DependencyTags> {
        self.graph
            .find_edge(from, to)
            .and_then(|edge| self.graph.edge_weight(edge))
    }

    /// All edges as `(from, to, tags)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &DependencyTags)> + '_ {
        self.graph.edge_indices().filter_map(|edge| {
            let (from, to) = self.graph.edge_endpoints(edge)?;
            Some((from, to, &self.graph[edge]))
        })
    }

    /// Union of the tags of every edge.
    pub fn dependency_ids(&self) -> BTreeSet<DepId> {
        self.edges().flat_map(|(_, _, tags)| tags.iter().copied()).collect()
    }

    pub fn contains_dependency(&self, id: DepId) -> bool {
        self.dep_edges.get(&id).is_some_and(|edges| !edges.is_empty())
    }

    /// `var` itself plus every intersection node built from it.
    pub fn subsumed_variables(&self, var: &RelationalVariable) -> Result<&BTreeSet<NodeIndex>, DSeparationError> {
        self.variable_index(var)
            .and_then(|idx| self.subsumed.get(&idx))
            .ok_or_else(|| DSeparationError::NotANode(var.to_string()))
    }

    /// `idx` and every node with a directed path into it. Memoized until the
    /// next edge removal.
    pub fn ancestors(&mut self, idx: NodeIndex) -> &HashSet<NodeIndex> {
        let graph = &self.graph;
        self.ancestors_cache.entry(idx).or_insert_with(|| {
            let reversed = Reversed(graph);
            let mut dfs = Dfs::new(reversed, idx);
            let mut found = HashSet::new();
            while let Some(node) = dfs.next(reversed) {
                found.insert(node);
            }
            found
        })
    }

    /// Drop `id` from every edge, deleting edges left without tags.
    ///
    /// Returns the other dependencies that shared an edge with `id`.
    pub fn remove_edges_for_dependency(&mut self, id: DepId) -> BTreeSet<DepId> {
        let mut others = BTreeSet::new();
        let Some(edges) = self.dep_edges.remove(&id) else {
            return others;
        };
        let mut removed_edge = false;
        for edge in edges {
            let Some(tags) = self.graph.edge_weight_mut(edge) else {
                continue;
            };
            tags.remove(&id);
            others.extend(tags.iter().copied());
            if tags.is_empty() {
                self.graph.remove_edge(edge);
                removed_edge = true;
            }
        }
        if removed_edge {
            self.ancestors_cache.clear();
        }
        others
    }
}

/// Extend `orig` with `ext` at every pivot where the reversed `orig` and `ext`
/// agree, keeping only the results that are valid relational paths.
///
/// For pivot `p` the candidate is `orig[..len - p + 1] ++ ext[p..]`.
pub fn extend_path(schema: &Schema, orig: &[String], ext: &[String]) -> Vec<Vec<String>> {
    find_pivots(orig.iter().rev(), ext.iter())
        .into_iter()
        .filter_map(|pivot| {
            let mut path = orig[..orig.len() - pivot + 1].to_vec();
            path.extend_from_slice(&ext[pivot..]);
            is_valid_relational_path(schema, &path).then_some(path)
        })
        .collect()
}

/// Lengths `1..=k` of the common prefix of two sequences.
pub fn find_pivots<T: PartialEq>(a: impl IntoIterator<Item = T>, b: impl IntoIterator<Item = T>) -> Vec<usize> {
    a.into_iter()
        .zip(b)
        .take_while(|(x, y)| x == y)
        .enumerate()
        .map(|(i, _)| i + 1)
        .collect()
}
