//! PC: causal discovery over the attributes of a single entity.
//!
//! [`Pc`] runs [`Rcd`] at hop threshold zero and presents the skeleton and the
//! learned pattern as graphs over `[E].attr` variables, where `E` is the
//! schema's entity.

use crate::citest::CiTest;
use crate::error::RcdError;
use crate::rcd::Rcd;
use crate::sepset::SepsetMap;
use petgraph::graph::{DiGraph, NodeIndex};
use rcd_core::config::RboOrder;
use rcd_core::{RelationalDependency, RelationalVariable, Schema};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Graph over entity attributes. An undirected edge is a pair of opposing arcs.
pub type VariableGraph = DiGraph<RelationalVariable, ()>;

pub struct Pc<C: CiTest> {
    rcd: Rcd<C>,
    skeleton: Option<VariableGraph>,
    pattern: Option<VariableGraph>,
}

impl<C: CiTest> Pc<C> {
    pub fn new(schema: Schema, citest: C) -> Self {
        Self {
            rcd: Rcd::new(schema, citest, 0, None),
            skeleton: None,
            pattern: None,
        }
    }

    pub fn schema(&self) -> &Schema {
        self.rcd.schema()
    }

    /// The underlying learner, for test counts and rule usage.
    pub fn rcd(&self) -> &Rcd<C> {
        &self.rcd
    }

    pub fn undirected_skeleton(&self) -> Option<&VariableGraph> {
        self.skeleton.as_ref()
    }

    pub fn partially_directed_graph(&self) -> Option<&VariableGraph> {
        self.pattern.as_ref()
    }

    pub fn sepsets(&self) -> Option<&SepsetMap> {
        self.rcd.sepsets()
    }

    /// Both phases; returns the partially directed graph.
    pub fn learn_model(&mut self) -> Result<&VariableGraph, RcdError> {
        info!(entities = self.schema().entities().count(), "running PC");
        self.phase_one()?;
        self.phase_two()
    }

    pub fn phase_one(&mut self) -> Result<&VariableGraph, RcdError> {
        let deps = self.rcd.identify_undirected_dependencies()?.to_vec();
        let skeleton = self.attribute_graph(&deps);
        Ok(&*self.skeleton.insert(skeleton))
    }

    pub fn phase_two(&mut self) -> Result<&VariableGraph, RcdError> {
        if self.skeleton.is_none() {
            return Err(RcdError::PrerequisiteMissing(
                "No undirected skeleton found. Try running Phase I first.",
            ));
        }
        if self.rcd.sepsets().is_none() {
            return Err(RcdError::PrerequisiteMissing("No sepsets found. Try running Phase I first."));
        }
        let deps: Vec<RelationalDependency> = self
            .rcd
            .orient_dependencies(RboOrder::Normal)?
            .iter()
            .cloned()
            .collect();
        let pattern = self.attribute_graph(&deps);
        info!(edges = pattern.edge_count(), "PC pattern");
        Ok(&*self.pattern.insert(pattern))
    }

    /// Replace the skeleton. Its nodes must be exactly the entity's attribute
    /// variables, each once.
    pub fn set_undirected_skeleton(&mut self, skeleton: VariableGraph) -> Result<(), RcdError> {
        let expected: BTreeSet<RelationalVariable> = self.attribute_variables().into_iter().collect();
        let found: BTreeSet<RelationalVariable> = skeleton.node_weights().cloned().collect();
        if expected.len() != skeleton.node_count() || expected != found {
            return Err(RcdError::SkeletonNodeMismatch);
        }
        let deps = skeleton
            .raw_edges()
            .iter()
            .map(|e| RelationalDependency::new(skeleton[e.source()].clone(), skeleton[e.target()].clone()))
            .collect();
        self.rcd.replace_undirected_dependencies(deps)?;
        self.skeleton = Some(skeleton);
        Ok(())
    }

    pub fn set_sepsets(&mut self, sepsets: SepsetMap) -> Result<(), RcdError> {
        self.rcd.set_sepsets(sepsets)
    }

    /// `[E].attr` for every attribute of the first entity, in declaration order.
    fn attribute_variables(&self) -> Vec<RelationalVariable> {
        self.schema()
            .entities()
            .next()
            .map(|entity| {
                entity
                    .attributes
                    .iter()
                    .map(|attr| RelationalVariable::new([entity.name.as_str()], attr.name.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn attribute_graph(&self, deps: &[RelationalDependency]) -> VariableGraph {
        let mut graph = VariableGraph::new();
        let mut index: HashMap<RelationalVariable, NodeIndex> = HashMap::new();
        for var in self.attribute_variables() {
            let n = graph.add_node(var.clone());
            index.insert(var, n);
        }
        for dep in deps {
            let from = *index
                .entry(dep.cause.clone())
                .or_insert_with(|| graph.add_node(dep.cause.clone()));
            let to = *index
                .entry(dep.effect.clone())
                .or_insert_with(|| graph.add_node(dep.effect.clone()));
            graph.update_edge(from, to, ());
        }
        graph
    }
}
