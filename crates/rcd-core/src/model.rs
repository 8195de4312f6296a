//! A generative relational model: a schema plus a set of canonical dependencies
//! whose class-level graph is acyclic.

use crate::error::ModelError;
use crate::schema::{EXISTS_ATTR_NAME, Schema};
use crate::validity::check_relational_dependency;
use crate::variable::{RelationalDependency, RelationalVariable};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct Model {
    schema: Schema,
    dependencies: Vec<RelationalDependency>,
    /// Class-level variables (singleton paths) in topological order.
    order: Vec<RelationalVariable>,
}

/// Class-level precedence graph over singleton-path variables.
#[derive(Default)]
struct ClassDag {
    graph: DiGraph<RelationalVariable, ()>,
    index: HashMap<RelationalVariable, NodeIndex>,
}

impl ClassDag {
    fn ensure(&mut self, var: RelationalVariable) -> NodeIndex {
        if let Some(&idx) = self.index.get(&var) {
            return idx;
        }
        let idx = self.graph.add_node(var.clone());
        self.index.insert(var, idx);
        idx
    }

    fn add_edge(&mut self, from: RelationalVariable, to: RelationalVariable) {
        let a = self.ensure(from);
        let b = self.ensure(to);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }
}

fn exists(item: &str) -> RelationalVariable {
    RelationalVariable::new([item], EXISTS_ATTR_NAME)
}

impl Model {
    /// Validate `dependencies` against `schema` and reject cyclic models.
    ///
    /// Besides the dependencies themselves the class-level graph orders entity
    /// existence before relationship existence, item existence before the item's
    /// attributes, and the existence of every item on a cause path before the effect.
    pub fn new(schema: Schema, dependencies: Vec<RelationalDependency>) -> Result<Self, ModelError> {
        let mut seen = HashSet::new();
        for dep in &dependencies {
            if !seen.insert(dep) {
                return Err(ModelError::DuplicateDependency(dep.to_string()));
            }
            check_relational_dependency(&schema, dep)?;
        }

        let mut attr_vars: BTreeSet<RelationalVariable> =
            dependencies.iter().map(|d| d.effect.clone()).collect();
        for item in schema.schema_items() {
            for attr in item.attributes() {
                attr_vars.insert(RelationalVariable::new([item.name()], attr.name.as_str()));
            }
        }

        let mut dag = ClassDag::default();
        for entity in schema.entities() {
            dag.ensure(exists(&entity.name));
        }
        for rel in schema.relationships() {
            dag.add_edge(exists(&rel.entity1), exists(&rel.name));
            dag.add_edge(exists(&rel.entity2), exists(&rel.name));
        }
        for var in &attr_vars {
            dag.ensure(var.clone());
            if !var.is_existence() {
                dag.add_edge(exists(var.base_item()), var.clone());
            }
        }
        for dep in &dependencies {
            dag.add_edge(dep.cause.canonical(), dep.effect.clone());
            for item in dep.cause.path().iter().skip(1) {
                dag.add_edge(exists(item), dep.effect.clone());
            }
        }

        let order = toposort(&dag.graph, None)
            .map_err(|_| ModelError::Cycle)?
            .into_iter()
            .map(|idx| dag.graph[idx].clone())
            .collect();

        Ok(Self {
            schema,
            dependencies,
            order,
        })
    }

    /// Parse textual dependencies such as `"[A, AB, B].Y -> [A].X"` and build the model.
    pub fn parse(schema: Schema, dependencies: &[&str]) -> Result<Self, ModelError> {
        let deps = dependencies
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<RelationalDependency>, _>>()?;
        Self::new(schema, deps)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn dependencies(&self) -> &[RelationalDependency] {
        &self.dependencies
    }

    /// Class-level variables ordered so every variable follows its causes.
    pub fn topological_order(&self) -> &[RelationalVariable] {
        &self.order
    }

    pub fn attribute_variables(&self) -> impl Iterator<Item = &RelationalVariable> {
        self.order.iter().filter(|v| !v.is_existence())
    }

    pub fn item_variables(&self) -> impl Iterator<Item = &RelationalVariable> {
        self.order.iter().filter(|v| v.is_existence())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cardinality;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.add_entity("A").unwrap();
        schema.add_entity("B").unwrap();
        schema
            .add_relationship("AB", ("A", Cardinality::Many), ("B", Cardinality::Many))
            .unwrap();
        schema.add_attribute("A", "X", None).unwrap();
        schema.add_attribute("B", "Y", None).unwrap();
        schema.add_attribute("AB", "XY", None).unwrap();
        schema
    }

    fn position(model: &Model, var: &str) -> usize {
        let var: RelationalVariable = var.parse().unwrap();
        model
            .topological_order()
            .iter()
            .position(|v| *v == var)
            .unwrap()
    }

    #[test]
    fn test_model_orders_causes_first() {
        let model = Model::parse(schema(), &["[A, AB, B].Y -> [A].X", "[AB, A].X -> [AB].XY"]).unwrap();
        assert_eq!(model.dependencies().len(), 2);
        assert!(position(&model, "[B].Y") < position(&model, "[A].X"));
        assert!(position(&model, "[A].X") < position(&model, "[AB].XY"));
        assert!(position(&model, "[AB].exists") < position(&model, "[A].X"));
        assert!(position(&model, "[A].exists") < position(&model, "[AB].exists"));
        assert_eq!(model.attribute_variables().count(), 3);
        assert_eq!(model.item_variables().count(), 3);
    }

    #[test]
    fn test_model_rejects_cycles() {
        let err = Model::parse(schema(), &["[A, AB, B].Y -> [A].X", "[B, AB, A].X -> [B].Y"]).unwrap_err();
        assert!(matches!(err, ModelError::Cycle));
        assert_eq!(
            err.to_string(),
            "dependencies encodes a cycle among relational variables"
        );
    }

    #[test]
    fn test_model_rejects_duplicates_and_invalid() {
        assert!(matches!(
            Model::parse(schema(), &["[A, AB].XY -> [A].X", "[A, AB].XY -> [A].X"]),
            Err(ModelError::DuplicateDependency(_))
        ));
        assert!(matches!(
            Model::parse(schema(), &["[A].X -> [A, AB].XY"]),
            Err(ModelError::NonCanonicalDependency(_))
        ));
        assert!(Model::parse(schema(), &["[A].Q -> [A].X"]).is_err());
    }
}
