//! Edge orientation patterns over partially directed abstract ground graphs.
//!
//! An undirected AGG edge is a pair of opposite directed edges; orienting
//! `a -> b` removes the dependencies behind `b -> a`. The finders here only
//! read the graph. Applying an orientation is up to [`crate::Rcd`], which has
//! to keep every perspective consistent.

use itertools::Itertools;
use rcd_dsep::{AbstractGroundGraph, NodeIndex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// The five orientation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Collider detection.
    ColliderDetection,
    /// Known non-colliders.
    KnownNonColliders,
    /// Cycle avoidance.
    CycleAvoidance,
    /// Meek rule 3.
    Mr3,
    /// Relational bivariate orientation.
    Rbo,
}

impl Rule {
    pub const ALL: [Rule; 5] = [
        Rule::ColliderDetection,
        Rule::KnownNonColliders,
        Rule::CycleAvoidance,
        Rule::Mr3,
        Rule::Rbo,
    ];

    pub fn abbreviation(self) -> &'static str {
        match self {
            Rule::ColliderDetection => "CD",
            Rule::KnownNonColliders => "KNC",
            Rule::CycleAvoidance => "CA",
            Rule::Mr3 => "MR3",
            Rule::Rbo => "RBO",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// How many edges each rule oriented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrientationUsage {
    pub cd: usize,
    pub knc: usize,
    pub ca: usize,
    pub mr3: usize,
    pub rbo: usize,
}

impl OrientationUsage {
    pub fn record(&mut self, rule: Rule) {
        *self.slot(rule) += 1;
    }

    pub fn get(&self, rule: Rule) -> usize {
        match rule {
            Rule::ColliderDetection => self.cd,
            Rule::KnownNonColliders => self.knc,
            Rule::CycleAvoidance => self.ca,
            Rule::Mr3 => self.mr3,
            Rule::Rbo => self.rbo,
        }
    }

    pub fn total(&self) -> usize {
        Rule::ALL.iter().map(|&r| self.get(r)).sum()
    }

    fn slot(&mut self, rule: Rule) -> &mut usize {
        match rule {
            Rule::ColliderDetection => &mut self.cd,
            Rule::KnownNonColliders => &mut self.knc,
            Rule::CycleAvoidance => &mut self.ca,
            Rule::Mr3 => &mut self.mr3,
            Rule::Rbo => &mut self.rbo,
        }
    }
}

pub fn is_undirected(agg: &AbstractGroundGraph, a: NodeIndex, b: NodeIndex) -> bool {
    agg.has_edge(a, b) && agg.has_edge(b, a)
}

/// Nodes `n` points to without an edge back.
pub fn directed_successors(agg: &AbstractGroundGraph, node: NodeIndex) -> BTreeSet<NodeIndex> {
    let preds: BTreeSet<NodeIndex> = agg.predecessors(node).collect();
    agg.successors(node).filter(|s| !preds.contains(s)).collect()
}

/// Nodes pointing to `n` without an edge back.
pub fn directed_predecessors(agg: &AbstractGroundGraph, node: NodeIndex) -> BTreeSet<NodeIndex> {
    let succs: BTreeSet<NodeIndex> = agg.successors(node).collect();
    agg.predecessors(node).filter(|p| !succs.contains(p)).collect()
}

pub fn undirected_neighbors(agg: &AbstractGroundGraph, node: NodeIndex) -> BTreeSet<NodeIndex> {
    let succs: BTreeSet<NodeIndex> = agg.successors(node).collect();
    agg.predecessors(node).filter(|p| succs.contains(p)).collect()
}

/// Pairs `(b, c)` such that `a - b - c` with `a` and `c` non-adjacent, read
/// from the graph as it is now.
pub fn unshielded_triples_at(agg: &AbstractGroundGraph, a: NodeIndex) -> Vec<(NodeIndex, NodeIndex)> {
    let neighbors_a = agg.adjacent(a);
    let mut pairs = Vec::new();
    for &b in &neighbors_a {
        for c in agg.adjacent(b) {
            if c != a && !neighbors_a.contains(&c) {
                pairs.push((b, c));
            }
        }
    }
    pairs
}

/// Every unshielded triple `(a, b, c)` of the graph.
pub fn unshielded_triples(agg: &AbstractGroundGraph) -> Vec<(NodeIndex, NodeIndex, NodeIndex)> {
    agg.node_indices()
        .flat_map(|a| unshielded_triples_at(agg, a).into_iter().map(move |(b, c)| (a, b, c)))
        .collect()
}

/// Triples `a -> b - c` with `a` and `c` non-adjacent.
pub fn known_non_collider_candidates(agg: &AbstractGroundGraph) -> BTreeSet<(NodeIndex, NodeIndex, NodeIndex)> {
    let mut candidates = BTreeSet::new();
    for a in agg.node_indices() {
        let neighbors_a = agg.adjacent(a);
        for b in directed_successors(agg, a) {
            for c in undirected_neighbors(agg, b) {
                if c != a && !neighbors_a.contains(&c) {
                    candidates.insert((a, b, c));
                }
            }
        }
    }
    candidates
}

/// Triples `a -> b -> c` with `a - c` undirected.
pub fn cycle_avoidance_candidates(agg: &AbstractGroundGraph) -> BTreeSet<(NodeIndex, NodeIndex, NodeIndex)> {
    let mut candidates = BTreeSet::new();
    for a in agg.node_indices() {
        let undirected_a = undirected_neighbors(agg, a);
        for b in directed_successors(agg, a) {
            for c in directed_successors(agg, b) {
                if undirected_a.contains(&c) {
                    candidates.insert((a, b, c));
                }
            }
        }
    }
    candidates
}

/// Quartets `(a, b, c, d)`: `a - b`, `a - c`, `a - d` undirected, `c -> b`
/// and `d -> b` directed, `c` and `d` non-adjacent. At most one quartet per
/// `(a, b)`.
pub fn mr3_candidates(agg: &AbstractGroundGraph) -> BTreeSet<(NodeIndex, NodeIndex, NodeIndex, NodeIndex)> {
    let mut candidates = BTreeSet::new();
    for a in agg.node_indices() {
        let undirected_a = undirected_neighbors(agg, a);
        if undirected_a.len() < 3 {
            continue;
        }
        for &b in &undirected_a {
            let into_b: Vec<NodeIndex> = directed_predecessors(agg, b)
                .intersection(&undirected_a)
                .copied()
                .collect();
            if let Some((c, d)) = into_b
                .iter()
                .tuple_combinations()
                .find(|&(&c, &d)| !agg.adjacent(c).contains(&d))
            {
                candidates.insert((a, b, *c, *d));
            }
        }
    }
    candidates
}
