//! Relational d-separation.
//!
//! Queries are answered on the abstract ground graph of the query's
//! perspective, using the illegal-link-pair reachability search of Geiger,
//! Verma and Pearl: a set X is d-connected to Y given Z exactly when a legal
//! trail leaves X and reaches Y.

use crate::agg::AbstractGroundGraph;
use crate::error::DSeparationError;
use crate::table::DependencyTable;
use petgraph::stable_graph::NodeIndex;
use rcd_core::validity::check_relational_variable_set;
use rcd_core::{Model, RelationalVariable};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::trace;

/// One end of a labelled link. `Source` is the synthetic node linked to every member of X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LinkEnd {
    Source,
    Node(NodeIndex),
}

type Link = (LinkEnd, NodeIndex);

/// D-separation oracle over one model, caching one AGG per `(perspective, hop)`.
pub struct DSeparation {
    model: Model,
    table: DependencyTable,
    aggs: HashMap<(String, usize), AbstractGroundGraph>,
}

impl DSeparation {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            table: DependencyTable::new(),
            aggs: HashMap::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Number of abstract ground graphs built so far.
    pub fn cached_graphs(&self) -> usize {
        self.aggs.len()
    }

    /// The cached AGG for `(perspective, hop)`, building it on first use.
    pub fn abstract_ground_graph(
        &mut self,
        perspective: &str,
        hop: usize,
    ) -> Result<&mut AbstractGroundGraph, DSeparationError> {
        match self.aggs.entry((perspective.to_string(), hop)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let agg = AbstractGroundGraph::build(
                    self.model.schema(),
                    self.model.dependencies(),
                    perspective,
                    hop,
                    &mut self.table,
                )?;
                Ok(entry.insert(agg))
            }
        }
    }

    /// Whether `xs` and `ys` are d-separated given `zs` in the model's AGG
    /// from the shared perspective of the three sets, bounded by `hop`.
    pub fn d_separated(
        &mut self,
        hop: usize,
        xs: &[RelationalVariable],
        ys: &[RelationalVariable],
        zs: &[RelationalVariable],
    ) -> Result<bool, DSeparationError> {
        let first = xs.first().ok_or(DSeparationError::EmptyVariableSet("x"))?;
        if ys.is_empty() {
            return Err(DSeparationError::EmptyVariableSet("y"));
        }
        check_relational_variable_set(self.model.schema(), hop, xs.iter().chain(ys).chain(zs))?;

        let perspective = first.base_item().to_string();
        let agg = self.abstract_ground_graph(&perspective, hop)?;

        let expand = |vars: &[RelationalVariable]| -> Result<BTreeSet<NodeIndex>, DSeparationError> {
            let mut nodes = BTreeSet::new();
            for var in vars {
                nodes.extend(agg.subsumed_variables(var)?.iter().copied());
            }
            Ok(nodes)
        };
        let conditioning = expand(zs)?;
        let sources: BTreeSet<NodeIndex> = expand(xs)?.difference(&conditioning).copied().collect();
        let targets: BTreeSet<NodeIndex> = expand(ys)?.difference(&conditioning).copied().collect();

        if !sources.is_disjoint(&targets) {
            return Ok(false);
        }
        if sources.is_empty() || targets.is_empty() {
            return Ok(true);
        }
        Ok(!reachable(agg, &sources, &targets, &conditioning))
    }

    /// [`DSeparation::d_separated`] over variables in their textual form.
    pub fn d_separated_str(
        &mut self,
        hop: usize,
        xs: &[&str],
        ys: &[&str],
        zs: &[&str],
    ) -> Result<bool, DSeparationError> {
        let parse = |strs: &[&str]| -> Result<Vec<RelationalVariable>, DSeparationError> {
            strs.iter().map(|s| s.parse().map_err(DSeparationError::from)).collect()
        };
        self.d_separated(hop, &parse(xs)?, &parse(ys)?, &parse(zs)?)
    }
}

/// Level-by-level labelling of legal links from a synthetic source attached to
/// `sources`. Returns true as soon as a legal move lands in `targets`.
fn reachable(
    agg: &mut AbstractGroundGraph,
    sources: &BTreeSet<NodeIndex>,
    targets: &BTreeSet<NodeIndex>,
    conditioning: &BTreeSet<NodeIndex>,
) -> bool {
    let mut descendant: HashSet<NodeIndex> = HashSet::new();
    for &z in conditioning {
        descendant.extend(agg.ancestors(z).iter().copied());
    }
    let agg = &*agg;

    let mut level: Vec<Link> = sources.iter().map(|&x| (LinkEnd::Source, x)).collect();
    let mut labelled: HashSet<Link> = level.iter().copied().collect();
    let mut depth = 1usize;

    while !level.is_empty() {
        let mut next = Vec::new();
        for &(from, via) in &level {
            for to in agg.adjacent(via) {
                if from == LinkEnd::Node(to) || labelled.contains(&(LinkEnd::Node(via), to)) {
                    continue;
                }
                let head_to_head = match from {
                    LinkEnd::Node(f) => agg.has_edge(f, via) && agg.has_edge(to, via),
                    LinkEnd::Source => false,
                };
                let legal = if head_to_head {
                    descendant.contains(&via)
                } else {
                    !conditioning.contains(&via)
                };
                if !legal {
                    continue;
                }
                if targets.contains(&to) {
                    trace!(depth, "d-connecting trail found");
                    return true;
                }
                let link = (LinkEnd::Node(via), to);
                labelled.insert(link);
                next.push(link);
            }
        }
        level = next;
        depth += 1;
    }
    false
}
